//! Frame classification.
//!
//! One fully-read frame goes in; exactly one routing outcome comes out.
//! The read loop maps outcomes onto its delivery paths: the command queue,
//! the api queue, the event queue, the reply-error signal, or a fatal
//! connection error.

use super::frame::Frame;
use super::headers::normalize;
use crate::error::{EventSockError, Result};
use crate::event::Event;
use crate::fields::FieldTable;

/// Marker prefix on a reply the peer flags as failed.
const ERROR_MARKER: &str = "-E";

/// Length of the full error marker (`-ERR `); the message follows it.
const ERROR_MARKER_LEN: usize = 5;

/// Routing outcome for one classified frame.
#[derive(Debug)]
pub enum Classified {
    /// A `command/reply` frame answering an outstanding request.
    CommandReply(Event),
    /// An `api/response` frame answering an outstanding request.
    ApiReply(Event),
    /// A decoded unsolicited event.
    Event(Event),
    /// The peer's disconnect notice; terminal for the event stream.
    Disconnect(Event),
    /// The peer rejected the outstanding request. Non-fatal: the
    /// connection stays alive.
    ReplyError(String),
}

/// Classify one frame by its type tag.
///
/// An unrecognized or missing `Content-Type` is a connection-fatal error:
/// the caller must stop reading, since protocol drift leaves no safe
/// resynchronization point.
pub fn classify(frame: Frame, table: &FieldTable) -> Result<Classified> {
    let content_type = frame
        .content_type()
        .ok_or_else(|| EventSockError::Framing("frame without Content-Type".into()))?;

    match content_type {
        "command/reply" => {
            let reply = frame.header("Reply-Text").unwrap_or("");
            if reply.starts_with(ERROR_MARKER) {
                return Ok(Classified::ReplyError(error_message(reply)));
            }
            // The switch percent-encodes reply headers when the reply text
            // itself is escaped.
            let decode = reply.starts_with('%');
            let mut event = normalize(&frame.headers, table, decode);
            if let Some(body) = frame.body {
                event.set_body(body);
            }
            Ok(Classified::CommandReply(event))
        }

        "api/response" => {
            let body = frame.body.as_deref().unwrap_or("");
            if body.starts_with(ERROR_MARKER) {
                return Ok(Classified::ReplyError(error_message(body)));
            }
            let mut event = normalize(&frame.headers, table, false);
            if let Some(body) = frame.body {
                event.set_body(body);
            }
            Ok(Classified::ApiReply(event))
        }

        "text/event-plain" => {
            let body = frame.body.as_deref().unwrap_or("");
            let nested = Frame::parse_nested(body)?;
            let mut event = normalize(&nested.headers, table, true);
            if let Some(inner) = nested.body {
                event.set_body(inner);
            }
            Ok(Classified::Event(event))
        }

        "text/disconnect-notice" => {
            let mut event = normalize(&frame.headers, table, false);
            if let Some(body) = frame.body {
                event.set_body(body);
            }
            event.mark_disconnect();
            Ok(Classified::Disconnect(event))
        }

        other => Err(EventSockError::UnsupportedContentType(other.to_string())),
    }
}

/// Text after the `-ERR ` marker, or empty if the reply is only the marker.
fn error_message(reply: &str) -> String {
    reply.get(ERROR_MARKER_LEN..).unwrap_or("").to_string()
}
