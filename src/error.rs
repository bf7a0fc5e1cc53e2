//! Error types for eventsock.

use std::sync::Arc;

use thiserror::Error;

/// Main error type for all event socket operations.
///
/// Fatal variants (`Io`, `Framing`, `UnsupportedContentType`,
/// `ConnectionClosed`) close the connection as a side effect. Non-fatal
/// variants (`Command`, `InvalidCommand`, `Timeout`) are returned to the
/// caller and leave the connection usable.
///
/// The enum is `Clone` because a fatal read-loop failure is signalled on
/// both the reply path and the event path, each of which delivers it once.
#[derive(Debug, Error, Clone)]
pub enum EventSockError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Malformed header block, bad Content-Length, or truncated body.
    #[error("framing error: {0}")]
    Framing(String),

    /// The expected auth/request challenge never arrived.
    #[error("missing auth request")]
    MissingAuthRequest,

    /// The switch rejected the credential.
    #[error("invalid password")]
    InvalidPassword,

    /// The peer answered a request with an error reply (`-ERR ...`).
    #[error("command failed: {0}")]
    Command(String),

    /// A request field contains `\r` or `\n`; rejected before any write.
    #[error("invalid command contains \\r or \\n")]
    InvalidCommand,

    /// No reply arrived within the configured wait budget.
    #[error("timeout")]
    Timeout,

    /// The peer sent a frame with a content type this engine does not speak.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Connection closed (peer hangup, explicit close, or read loop exit).
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for EventSockError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result type alias using EventSockError.
pub type Result<T> = std::result::Result<T, EventSockError>;
