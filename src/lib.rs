//! Event socket client and server for switch control planes.
//!
//! Speaks the line-oriented event socket protocol: MIME-style framed
//! messages over TCP, with synchronous command replies interleaved with an
//! asynchronous event stream on the same connection.
//!
//! # Modes
//!
//! - **Inbound**: dial the switch with [`connect`], authenticate, then
//!   issue commands and subscribe to events.
//! - **Outbound**: the switch dials you per call; [`listen_and_serve`]
//!   accepts those connections and hands each to your handler with the
//!   session already attached.
//!
//! # Architecture
//!
//! Each connection runs one read-loop task that parses frames off the
//! socket and routes them: command and api replies go to whichever caller
//! holds the internal request lock, unsolicited events go to a bounded
//! queue drained by [`Connection::read_event`]. Requests are serialized,
//! so concurrent callers queue instead of racing for replies, and a reply
//! arriving after its request timed out is discarded rather than
//! misdelivered.
//!
//! # Example
//!
//! ```no_run
//! use eventsock::connect;
//!
//! # async fn run() -> eventsock::Result<()> {
//! let conn = connect("127.0.0.1:8021", "ClueCon").await?;
//! conn.send("events plain ALL").await?;
//! loop {
//!     let event = conn.read_event().await?;
//!     if event.is_disconnect() {
//!         break;
//!     }
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod fields;
pub mod protocol;
pub mod server;

pub use client::{connect, connect_with_config};
pub use config::ConnectionConfig;
pub use connection::{Connection, Msg};
pub use error::{EventSockError, Result};
pub use event::Event;
pub use fields::{EventField, FieldTable};
pub use server::{listen_and_serve, listen_and_serve_with_config};
