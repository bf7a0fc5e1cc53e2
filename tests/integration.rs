//! Integration tests driving a real connection against a scripted peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use eventsock::{
    connect, connect_with_config, listen_and_serve, ConnectionConfig, EventField, EventSockError,
    Msg,
};

const PASSWORD: &str = "ClueCon";

/// Route read-loop diagnostics through the test harness's captured output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Bind a one-connection scripted peer. Returns its address and the
/// script task's handle so tests can assert the script ran to completion.
async fn scripted_peer<F, Fut>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(stream).await;
    });
    (addr, handle)
}

/// Peer side of the auth handshake.
async fn auth_handshake(stream: &mut TcpStream) {
    stream
        .write_all(b"Content-Type: auth/request\n\n")
        .await
        .unwrap();
    let request = read_request(stream).await;
    assert_eq!(request, format!("auth {PASSWORD}"));
    stream
        .write_all(b"Content-Type: command/reply\nReply-Text: +OK accepted\n\n")
        .await
        .unwrap();
}

/// Read one blank-line terminated request off the socket, returning it
/// without the terminator.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "peer closed mid-request");
        data.push(byte[0]);
        if data.ends_with(b"\r\n\r\n") || data.ends_with(b"\n\n") {
            break;
        }
    }
    String::from_utf8(data).unwrap().trim_end().to_string()
}

async fn read_exact_string(stream: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_auth_and_command_reply() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        let request = read_request(&mut s).await;
        assert_eq!(request, "events plain ALL");
        s.write_all(
            b"Content-Type: command/reply\nReply-Text: +OK event listener enabled plain\n\n",
        )
        .await
        .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();
    assert_eq!(conn.remote_addr(), addr);

    let reply = conn.send("events plain ALL").await.unwrap();
    assert_eq!(
        reply.get(EventField::ReplyText),
        Some("+OK event listener enabled plain")
    );

    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_rejected_password() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        s.write_all(b"Content-Type: auth/request\n\n")
            .await
            .unwrap();
        let request = read_request(&mut s).await;
        assert_eq!(request, "auth wrong");
        s.write_all(b"Content-Type: command/reply\nReply-Text: -ERR invalid\n\n")
            .await
            .unwrap();
    })
    .await;

    let err = connect(addr, "wrong").await.unwrap_err();
    assert!(matches!(err, EventSockError::InvalidPassword));
    peer.await.unwrap();
}

#[tokio::test]
async fn test_missing_auth_request() {
    let (addr, _peer) = scripted_peer(|mut s| async move {
        // Greets with the wrong frame type.
        s.write_all(b"Content-Type: command/reply\nReply-Text: +OK\n\n")
            .await
            .unwrap();
        let _ = read_request(&mut s).await;
    })
    .await;

    let err = connect(addr, PASSWORD).await.unwrap_err();
    assert!(matches!(err, EventSockError::MissingAuthRequest));
}

#[tokio::test]
async fn test_execute_wire_encoding() {
    let expected = "sendmsg\n\
                    call-command: execute\n\
                    execute-app-name: playback\n\
                    execute-app-arg: /tmp/a.wav\n\
                    event-lock: true\n\
                    \n";
    let (addr, peer) = scripted_peer(move |mut s| async move {
        auth_handshake(&mut s).await;
        let request = read_exact_string(&mut s, expected.len()).await;
        assert_eq!(request, expected);
        s.write_all(b"Content-Type: command/reply\nReply-Text: +OK\n\n")
            .await
            .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();
    let reply = conn.execute("playback", "/tmp/a.wav", true).await.unwrap();
    assert_eq!(reply.get(EventField::ReplyText), Some("+OK"));
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_sendmsg_payload_encoding() {
    let expected = "sendmsg session-1\n\
                    call-command: unicast\n\
                    content-type: text/plain\n\
                    content-length: 5\n\
                    \n\
                    hello";
    let (addr, peer) = scripted_peer(move |mut s| async move {
        auth_handshake(&mut s).await;
        let request = read_exact_string(&mut s, expected.len()).await;
        assert_eq!(request, expected);
        s.write_all(b"Content-Type: command/reply\nReply-Text: +OK\n\n")
            .await
            .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();
    let msg = Msg::new()
        .field("call-command", "unicast")
        .field("content-type", "text/plain")
        .field("content-length", "5");
    conn.send_msg(&msg, "session-1", "hello").await.unwrap();
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_field_validation_writes_nothing() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        // The very next bytes on the wire must be the valid follow-up
        // command, proving the rejected request never hit the socket.
        let request = read_request(&mut s).await;
        assert_eq!(request, "api status");
        s.write_all(b"Content-Type: api/response\nContent-Length: 9\n\n+OK alive")
            .await
            .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();

    let msg = Msg::new().field("call-command", "execute\r\nbreakout");
    let err = conn.send_msg(&msg, "", "").await.unwrap_err();
    assert!(matches!(err, EventSockError::InvalidCommand));

    let reply = conn.send("api status").await.unwrap();
    assert_eq!(reply.body(), Some("+OK alive"));
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_api_error_keeps_connection_usable() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        let first = read_request(&mut s).await;
        assert_eq!(first, "api uuid_kill deadbeef");
        let body = "-ERR no such channel";
        s.write_all(
            format!(
                "Content-Type: api/response\nContent-Length: {}\n\n{}",
                body.len(),
                body
            )
            .as_bytes(),
        )
        .await
        .unwrap();

        let second = read_request(&mut s).await;
        assert_eq!(second, "api status");
        s.write_all(b"Content-Type: api/response\nContent-Length: 9\n\n+OK alive")
            .await
            .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();

    let err = conn.send("api uuid_kill deadbeef").await.unwrap_err();
    match err {
        EventSockError::Command(message) => assert_eq!(message, "no such channel"),
        other => panic!("unexpected error: {other:?}"),
    }

    let reply = conn.send("api status").await.unwrap();
    assert_eq!(reply.body(), Some("+OK alive"));
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_event_stream_and_disconnect() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;

        let nested = "Event-Name: CHANNEL_ANSWER\nUnique-ID: call%2D7\n\n";
        s.write_all(
            format!(
                "Content-Type: text/event-plain\nContent-Length: {}\n\n{}",
                nested.len(),
                nested
            )
            .as_bytes(),
        )
        .await
        .unwrap();
        s.write_all(b"Content-Type: text/disconnect-notice\nContent-Disposition: disconnect\n\n")
            .await
            .unwrap();
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();

    let event = conn.read_event().await.unwrap();
    assert_eq!(event.get(EventField::EventName), Some("CHANNEL_ANSWER"));
    assert_eq!(event.get(EventField::UniqueId), Some("call-7"));
    assert!(!event.is_disconnect());

    let notice = conn.read_event().await.unwrap();
    assert!(notice.is_disconnect());
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_concurrent_requests_get_their_own_replies() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        for _ in 0..2 {
            let request = read_request(&mut s).await;
            s.write_all(
                format!("Content-Type: command/reply\nReply-Text: +OK {request}\n\n").as_bytes(),
            )
            .await
            .unwrap();
        }
    })
    .await;

    let conn = Arc::new(connect(addr, PASSWORD).await.unwrap());

    let a = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.send("one").await.unwrap() })
    };
    let b = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.send("two").await.unwrap() })
    };

    let reply_a = a.await.unwrap();
    let reply_b = b.await.unwrap();
    assert_eq!(reply_a.get(EventField::ReplyText), Some("+OK one"));
    assert_eq!(reply_b.get(EventField::ReplyText), Some("+OK two"));
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_late_reply_after_timeout_is_discarded() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;

        let first = read_request(&mut s).await;
        assert_eq!(first, "first");
        // Reply long after the caller's wait budget expired.
        tokio::time::sleep(Duration::from_millis(300)).await;
        s.write_all(b"Content-Type: command/reply\nReply-Text: +OK first\n\n")
            .await
            .unwrap();

        let second = read_request(&mut s).await;
        assert_eq!(second, "second");
        s.write_all(b"Content-Type: command/reply\nReply-Text: +OK second\n\n")
            .await
            .unwrap();
    })
    .await;

    let config = ConnectionConfig::new().command_timeout(Duration::from_millis(100));
    let conn = connect_with_config(addr, PASSWORD, config).await.unwrap();

    let err = conn.send("first").await.unwrap_err();
    assert!(matches!(err, EventSockError::Timeout));

    // The stale reply to "first" must not answer this request.
    let reply = conn.send("second").await.unwrap();
    assert_eq!(reply.get(EventField::ReplyText), Some("+OK second"));
    peer.await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_fatal_error_reaches_blocked_sender_and_reader() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        let _ = read_request(&mut s).await;
        // Malformed frame: kills the read loop.
        s.write_all(b"garbage without a colon\n\n").await.unwrap();
        // Hold the socket open so EOF is not the failure being tested.
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    let conn = Arc::new(connect(addr, PASSWORD).await.unwrap());

    let reader = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.read_event().await })
    };

    let send_err = conn.send("api status").await.unwrap_err();
    assert!(matches!(send_err, EventSockError::Framing(_)));

    let read_err = reader.await.unwrap().unwrap_err();
    assert!(matches!(read_err, EventSockError::Framing(_)));

    // Each path reports the failure once; afterwards the connection is
    // just closed.
    let again = conn.read_event().await.unwrap_err();
    assert!(matches!(again, EventSockError::ConnectionClosed));
    peer.abort();
}

#[tokio::test]
async fn test_buffered_events_drain_before_error() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        for name in ["CHANNEL_CREATE", "CHANNEL_ANSWER"] {
            let nested = format!("Event-Name: {name}\n\n");
            s.write_all(
                format!(
                    "Content-Type: text/event-plain\nContent-Length: {}\n\n{}",
                    nested.len(),
                    nested
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        }
        s.write_all(b"broken\n\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    let conn = connect(addr, PASSWORD).await.unwrap();

    let first = conn.read_event().await.unwrap();
    assert_eq!(first.get(EventField::EventName), Some("CHANNEL_CREATE"));
    let second = conn.read_event().await.unwrap();
    assert_eq!(second.get(EventField::EventName), Some("CHANNEL_ANSWER"));

    let err = conn.read_event().await.unwrap_err();
    assert!(matches!(err, EventSockError::Framing(_)));
    peer.abort();
}

#[tokio::test]
async fn test_full_event_queue_stalls_reply_delivery() {
    let (addr, peer) = scripted_peer(|mut s| async move {
        auth_handshake(&mut s).await;
        let request = read_request(&mut s).await;
        assert_eq!(request, "api status");
        for name in ["E1", "E2", "E3"] {
            let nested = format!("Event-Name: {name}\n\n");
            s.write_all(
                format!(
                    "Content-Type: text/event-plain\nContent-Length: {}\n\n{}",
                    nested.len(),
                    nested
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        }
        s.write_all(b"Content-Type: api/response\nContent-Length: 9\n\n+OK alive")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    let config = ConnectionConfig::new().event_queue_capacity(1);
    let conn = Arc::new(connect_with_config(addr, PASSWORD, config).await.unwrap());

    let sender = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.send("api status").await })
    };

    // With capacity 1 the read loop stalls on the second event, so the
    // reply sitting behind the events cannot be delivered yet.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!sender.is_finished());

    for name in ["E1", "E2", "E3"] {
        let event = conn.read_event().await.unwrap();
        assert_eq!(event.get(EventField::EventName), Some(name));
    }

    let reply = sender.await.unwrap().unwrap();
    assert_eq!(reply.body(), Some("+OK alive"));
    peer.abort();
}

#[tokio::test]
async fn test_outbound_server_handles_switch_connection() {
    init_tracing();
    // Find a free port for the accept loop; listen_and_serve binds
    // internally so the test cannot ask it for the bound address.
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(1);
    tokio::spawn(listen_and_serve(addr, move |conn| {
        let tx = tx.clone();
        async move {
            let info = conn.send("connect").await.unwrap();
            let uuid = info.get(EventField::UniqueId).unwrap().to_string();
            tx.send(uuid).await.unwrap();
            conn.close().await;
        }
    }));

    // The switch side dials in; retry until the accept loop is up.
    let mut switch = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    };

    let request = read_request(&mut switch).await;
    assert_eq!(request, "connect");
    switch
        .write_all(
            b"Content-Type: command/reply\nReply-Text: +OK\nUnique-ID: sess-42\n\n",
        )
        .await
        .unwrap();

    let uuid = rx.recv().await.unwrap();
    assert_eq!(uuid, "sess-42");
}
