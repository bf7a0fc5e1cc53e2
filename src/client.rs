//! Inbound-mode client: dial the switch and authenticate.

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{EventSockError, Result};
use crate::protocol::{Frame, FrameBuffer};

/// Dial the switch and run the auth handshake with default settings.
///
/// The peer must open with an `auth/request` frame; anything else fails
/// the handshake. A rejected password surfaces as
/// [`EventSockError::InvalidPassword`].
///
/// # Example
///
/// ```no_run
/// use eventsock::connect;
///
/// # async fn run() -> eventsock::Result<()> {
/// let conn = connect("127.0.0.1:8021", "ClueCon").await?;
/// let reply = conn.send("api status").await?;
/// println!("{:?}", reply.body());
/// # Ok(())
/// # }
/// ```
pub async fn connect(addr: impl ToSocketAddrs, password: &str) -> Result<Connection> {
    connect_with_config(addr, password, ConnectionConfig::default()).await
}

/// Dial the switch with explicit connection settings.
pub async fn connect_with_config(
    addr: impl ToSocketAddrs,
    password: &str,
    config: ConnectionConfig,
) -> Result<Connection> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut frame_buffer = FrameBuffer::with_max_frame_size(config.max_frame_size);

    let greeting = read_one_frame(&mut stream, &mut frame_buffer, config.read_buffer_size).await?;
    if greeting.content_type() != Some("auth/request") {
        return Err(EventSockError::MissingAuthRequest);
    }

    let line = format!("auth {password}\r\n\r\n");
    stream.write_all(line.as_bytes()).await?;

    let reply = read_one_frame(&mut stream, &mut frame_buffer, config.read_buffer_size).await?;
    let reply_text = reply.header("Reply-Text").unwrap_or("");
    if !reply_text.starts_with("+OK") {
        return Err(EventSockError::InvalidPassword);
    }

    tracing::debug!(peer = %stream.peer_addr()?, "authenticated");
    // Bytes past the auth reply stay buffered and carry into the read loop.
    Connection::new(stream, frame_buffer, &config)
}

/// Read exactly one frame, leaving any trailing bytes in the buffer.
async fn read_one_frame(
    stream: &mut TcpStream,
    frame_buffer: &mut FrameBuffer,
    read_buffer_size: usize,
) -> Result<Frame> {
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; read_buffer_size];
    loop {
        if let Some(frame) = frame_buffer.try_extract()? {
            return Ok(frame);
        }
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(EventSockError::ConnectionClosed);
        }
        frame_buffer.extend(&buf[..n]);
    }
}
