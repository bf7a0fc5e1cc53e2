//! Connection lifecycle, read loop, and the request/reply correlation
//! engine.
//!
//! One dedicated task per connection runs the read loop; it is the sole
//! producer into three delivery paths (command replies, api replies, the
//! bounded event queue) and two one-shot error signals. Callers never share
//! mutable state with the loop beyond those channels.
//!
//! The wire protocol carries no request identifier, so correlation relies
//! on requests never overlapping: an internal async mutex serializes them,
//! and the next synchronous reply of either kind answers the request that
//! holds the lock. Each request additionally takes a sequence number that
//! is compared against a per-reply arrival stamp, so a reply landing after
//! its requester timed out is discarded instead of being misdelivered to
//! the next request.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::{EventSockError, Result};
use crate::event::Event;
use crate::fields::FieldTable;
use crate::protocol::{classify, Classified, FrameBuffer};

/// Field set for a structured (`sendmsg`) request.
///
/// Insertion order is preserved on the wire. Fields with empty values are
/// skipped during encoding, which is how optional directives like
/// `event-lock` are omitted.
#[derive(Debug, Clone, Default)]
pub struct Msg {
    fields: Vec<(String, String)>,
}

impl Msg {
    /// Empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// First value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Encode the request: `sendmsg[ <uuid>]`, one line per non-empty
    /// field, blank-line terminator, then the payload only when a
    /// `content-length` field was supplied.
    ///
    /// Fails before producing any output if the uuid or any field contains
    /// a line terminator, which would let a field break out of its frame.
    pub(crate) fn encode(&self, uuid: &str, app_data: &str) -> Result<String> {
        if contains_line_terminator(uuid) {
            return Err(EventSockError::InvalidCommand);
        }
        for (key, value) in &self.fields {
            if contains_line_terminator(key) || contains_line_terminator(value) {
                return Err(EventSockError::InvalidCommand);
            }
        }

        let mut request = String::from("sendmsg");
        if !uuid.is_empty() {
            request.push(' ');
            request.push_str(uuid);
        }
        request.push('\n');
        for (key, value) in &self.fields {
            if value.is_empty() {
                continue;
            }
            request.push_str(key);
            request.push_str(": ");
            request.push_str(value);
            request.push('\n');
        }
        request.push('\n');
        if self.get("content-length").is_some_and(|v| !v.is_empty()) && !app_data.is_empty() {
            request.push_str(app_data);
        }
        Ok(request)
    }
}

fn contains_line_terminator(s: &str) -> bool {
    s.contains('\r') || s.contains('\n')
}

/// A synchronous delivery that failed: either the peer rejected the
/// request (stamped with the reply's arrival sequence) or the read loop
/// died (unstamped, matches any waiter).
#[derive(Debug)]
struct ReplyFailure {
    seq: Option<u64>,
    error: EventSockError,
}

/// Caller-side state for the synchronous request path. Holding the lock
/// *is* the one-outstanding-request contract.
struct RequestLane {
    writer: OwnedWriteHalf,
    cmd_rx: mpsc::Receiver<(u64, Event)>,
    api_rx: mpsc::Receiver<(u64, Event)>,
    err_rx: mpsc::Receiver<ReplyFailure>,
    next_seq: u64,
}

/// Caller-side state for the asynchronous event stream.
struct EventLane {
    evt_rx: mpsc::Receiver<Event>,
    err_rx: mpsc::Receiver<EventSockError>,
}

/// Read-loop side of every delivery path.
struct LoopChannels {
    cmd_tx: mpsc::Sender<(u64, Event)>,
    api_tx: mpsc::Sender<(u64, Event)>,
    evt_tx: mpsc::Sender<Event>,
    reply_err_tx: mpsc::Sender<ReplyFailure>,
    event_err_tx: mpsc::Sender<EventSockError>,
}

/// An event socket connection, either dialed out (inbound mode) or
/// accepted from the switch (outbound mode).
///
/// Requests are serialized internally; concurrent `send` calls queue on
/// the request lock rather than corrupting correlation. The connection is
/// not reusable after a fatal error or [`close`](Connection::close).
pub struct Connection {
    request: Mutex<RequestLane>,
    events: Mutex<EventLane>,
    peer_addr: SocketAddr,
    command_timeout: Duration,
    read_task: JoinHandle<()>,
}

impl Connection {
    /// Wrap a connected socket and start its read loop.
    ///
    /// `frame_buffer` may already hold bytes read during the auth
    /// handshake; they are processed before any new socket data.
    pub(crate) fn new(
        stream: TcpStream,
        frame_buffer: FrameBuffer,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (api_tx, api_rx) = mpsc::channel(1);
        let (evt_tx, evt_rx) = mpsc::channel(config.event_queue_capacity);
        let (reply_err_tx, reply_err_rx) = mpsc::channel(1);
        let (event_err_tx, event_err_rx) = mpsc::channel(1);

        let channels = LoopChannels {
            cmd_tx,
            api_tx,
            evt_tx,
            reply_err_tx,
            event_err_tx,
        };
        let table = config.field_table.clone();
        let read_buffer_size = config.read_buffer_size;
        let read_task = tokio::spawn(read_loop(
            read_half,
            frame_buffer,
            table,
            read_buffer_size,
            channels,
        ));

        Ok(Self {
            request: Mutex::new(RequestLane {
                writer: write_half,
                cmd_rx,
                api_rx,
                err_rx: reply_err_rx,
                next_seq: 0,
            }),
            events: Mutex::new(EventLane {
                evt_rx,
                err_rx: event_err_rx,
            }),
            peer_addr,
            command_timeout: config.command_timeout,
            read_task,
        })
    }

    /// Send a single command and wait for its reply.
    ///
    /// Returns the reply event, the peer's error for a rejected command,
    /// a timeout after the configured wait budget, or a fatal connection
    /// error.
    pub async fn send(&self, command: &str) -> Result<Event> {
        let mut lane = self.request.lock().await;
        lane.next_seq += 1;
        let seq = lane.next_seq;

        let line = format!("{command}\r\n\r\n");
        lane.writer.write_all(line.as_bytes()).await?;

        self.wait_reply(&mut lane, seq).await
    }

    /// Send a structured `sendmsg` request and wait for its reply.
    ///
    /// `uuid` names the session the request applies to (empty for the
    /// connection's own session on outbound sockets). `app_data` is only
    /// written when the field set carries a `content-length` field.
    /// Validation failures are reported before any byte reaches the wire.
    pub async fn send_msg(&self, msg: &Msg, uuid: &str, app_data: &str) -> Result<Event> {
        let request = msg.encode(uuid, app_data)?;

        let mut lane = self.request.lock().await;
        lane.next_seq += 1;
        let seq = lane.next_seq;

        lane.writer.write_all(request.as_bytes()).await?;

        self.wait_reply(&mut lane, seq).await
    }

    /// Run a dialplan application on the connection's own session.
    /// Shorthand for the `call-command: execute` request shape used on
    /// outbound (server-accepted) connections.
    pub async fn execute(&self, app_name: &str, app_arg: &str, lock: bool) -> Result<Event> {
        let msg = Msg::new()
            .field("call-command", "execute")
            .field("execute-app-name", app_name)
            .field("execute-app-arg", app_arg)
            .field("event-lock", if lock { "true" } else { "" });
        self.send_msg(&msg, "", "").await
    }

    /// Run a dialplan application on an explicit session. Suitable for
    /// inbound (dialed) connections controlling many calls.
    pub async fn execute_uuid(
        &self,
        uuid: &str,
        app_name: &str,
        app_arg: &str,
        app_uuid: &str,
    ) -> Result<Event> {
        let msg = Msg::new()
            .field("call-command", "execute")
            .field("execute-app-name", app_name)
            .field("execute-app-arg", app_arg)
            .field("event-uuid", app_uuid);
        self.send_msg(&msg, uuid, "").await
    }

    /// Block until the next unsolicited event arrives.
    ///
    /// Buffered events are always drained before a fatal error is
    /// reported; the error itself is observed by exactly one caller, and
    /// every call after that gets [`EventSockError::ConnectionClosed`].
    pub async fn read_event(&self) -> Result<Event> {
        let mut lane = self.events.lock().await;
        match lane.evt_rx.recv().await {
            Some(event) => Ok(event),
            None => Err(lane
                .err_rx
                .try_recv()
                .unwrap_or(EventSockError::ConnectionClosed)),
        }
    }

    /// Remote address of the peer.
    pub fn remote_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Terminate the connection: stop the read loop and shut the socket
    /// down. Unblocks pending callers with a connection-closed error.
    pub async fn close(&self) {
        self.read_task.abort();
        let mut lane = self.request.lock().await;
        let _ = lane.writer.shutdown().await;
    }

    /// Wait for the reply correlated to `seq`.
    ///
    /// Stamped deliveries older than `seq` belong to a request whose
    /// caller already timed out; they are logged and dropped. Unstamped
    /// failures are fatal and match any waiter.
    async fn wait_reply(&self, lane: &mut RequestLane, seq: u64) -> Result<Event> {
        let deadline = tokio::time::sleep(self.command_timeout);
        tokio::pin!(deadline);

        loop {
            // Biased so a buffered failure is observed before the closed
            // reply channels report ConnectionClosed.
            tokio::select! {
                biased;

                failure = lane.err_rx.recv() => match failure {
                    Some(ReplyFailure { seq: Some(stamp), error }) if stamp >= seq => {
                        return Err(error);
                    }
                    Some(ReplyFailure { seq: Some(stamp), .. }) => {
                        tracing::debug!(stamp, seq, "discarding stale reply error");
                    }
                    Some(ReplyFailure { seq: None, error }) => return Err(error),
                    None => return Err(EventSockError::ConnectionClosed),
                },
                reply = lane.cmd_rx.recv() => match reply {
                    Some((stamp, event)) if stamp >= seq => return Ok(event),
                    Some((stamp, _)) => {
                        tracing::debug!(stamp, seq, "discarding stale command reply");
                    }
                    None => return Err(EventSockError::ConnectionClosed),
                },
                reply = lane.api_rx.recv() => match reply {
                    Some((stamp, event)) if stamp >= seq => return Ok(event),
                    Some((stamp, _)) => {
                        tracing::debug!(stamp, seq, "discarding stale api reply");
                    }
                    None => return Err(EventSockError::ConnectionClosed),
                },
                _ = &mut deadline => return Err(EventSockError::Timeout),
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

/// Read frames until a fatal condition, then signal each delivery path
/// once and exit. Runs as a dedicated task; exiting drops the channel
/// senders, which surfaces as `ConnectionClosed` to later callers.
async fn read_loop(
    reader: OwnedReadHalf,
    frame_buffer: FrameBuffer,
    table: FieldTable,
    read_buffer_size: usize,
    channels: LoopChannels,
) {
    let fatal = match run_read_loop(reader, frame_buffer, &table, read_buffer_size, &channels).await
    {
        Ok(()) => {
            // All consumers dropped their receivers; nobody is left to
            // signal.
            tracing::debug!("read loop stopping: connection dropped");
            return;
        }
        Err(error) => error,
    };

    tracing::error!(error = %fatal, "read loop stopping");
    let _ = channels.reply_err_tx.try_send(ReplyFailure {
        seq: None,
        error: fatal.clone(),
    });
    let _ = channels.event_err_tx.try_send(fatal);
}

/// The loop proper. `Ok(())` means a consumer went away; `Err` is the
/// fatal protocol or transport condition that ended the connection.
async fn run_read_loop(
    mut reader: OwnedReadHalf,
    mut frame_buffer: FrameBuffer,
    table: &FieldTable,
    read_buffer_size: usize,
    channels: &LoopChannels,
) -> std::result::Result<(), EventSockError> {
    let mut buf = vec![0u8; read_buffer_size];
    let mut reply_seq: u64 = 0;

    // The handshake may have buffered frames past the auth reply.
    let mut pending = frame_buffer.push(&[])?;

    loop {
        for frame in pending.drain(..) {
            match classify(frame, table)? {
                Classified::CommandReply(event) => {
                    reply_seq += 1;
                    tracing::debug!(seq = reply_seq, "command reply");
                    if channels.cmd_tx.send((reply_seq, event)).await.is_err() {
                        return Ok(());
                    }
                }
                Classified::ApiReply(event) => {
                    reply_seq += 1;
                    tracing::debug!(seq = reply_seq, "api reply");
                    if channels.api_tx.send((reply_seq, event)).await.is_err() {
                        return Ok(());
                    }
                }
                Classified::ReplyError(message) => {
                    reply_seq += 1;
                    tracing::debug!(seq = reply_seq, %message, "reply error");
                    let failure = ReplyFailure {
                        seq: Some(reply_seq),
                        error: EventSockError::Command(message),
                    };
                    if channels.reply_err_tx.send(failure).await.is_err() {
                        return Ok(());
                    }
                }
                Classified::Event(event) => {
                    // Blocks when the event queue is full: deliberate
                    // backpressure shared with reply delivery.
                    if channels.evt_tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Classified::Disconnect(event) => {
                    tracing::debug!("disconnect notice");
                    if channels.evt_tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(EventSockError::ConnectionClosed);
        }
        pending = frame_buffer.push(&buf[..n])?;
    }
}
