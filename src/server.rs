//! Outbound-mode server: accept connections initiated by the switch.
//!
//! The switch dials in with a session already attached; there is no auth
//! handshake on this side. Handlers usually open with `send("connect")`
//! to pull the session's variables, then drive it with
//! [`execute`](crate::Connection::execute).

use std::future::Future;

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::FrameBuffer;

/// Accept switch-initiated connections and run `handler` for each, with
/// default settings.
///
/// Runs until the listener itself fails. Each accepted connection gets
/// its own task; a handler panic takes down that task only.
///
/// # Example
///
/// ```no_run
/// use eventsock::listen_and_serve;
///
/// # async fn run() -> eventsock::Result<()> {
/// listen_and_serve("127.0.0.1:8084", |conn| async move {
///     if let Ok(info) = conn.send("connect").await {
///         tracing::info!(caller = ?info.body(), "new session");
///     }
///     let _ = conn.execute("playback", "/tmp/greeting.wav", true).await;
///     conn.close().await;
/// })
/// .await
/// # }
/// ```
pub async fn listen_and_serve<H, Fut>(addr: impl ToSocketAddrs, handler: H) -> Result<()>
where
    H: Fn(Connection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    listen_and_serve_with_config(addr, handler, ConnectionConfig::default()).await
}

/// Accept switch-initiated connections with explicit connection settings.
pub async fn listen_and_serve_with_config<H, Fut>(
    addr: impl ToSocketAddrs,
    handler: H,
    config: ConnectionConfig,
) -> Result<()>
where
    H: Fn(Connection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let frame_buffer = FrameBuffer::with_max_frame_size(config.max_frame_size);
        match Connection::new(stream, frame_buffer, &config) {
            Ok(conn) => {
                tracing::debug!(%peer, "accepted");
                tokio::spawn(handler(conn));
            }
            Err(error) => {
                // The socket died between accept and setup. Not fatal for
                // the listener.
                tracing::warn!(%peer, %error, "dropping connection");
            }
        }
    }
}
