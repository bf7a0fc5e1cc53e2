//! Decoded event representation.
//!
//! An [`Event`] is the unit handed to consumers: canonical headers stored in
//! fixed slots addressed by [`EventField`], an aggregated custom-headers
//! slot, and an optional raw body. Command and api replies reuse the same
//! representation since they are normalized through the same table.

use std::fmt;

use crate::error::{EventSockError, Result};
use crate::fields::EventField;

/// A fully decoded frame: normalized headers plus optional body.
///
/// Header access is O(1) by semantic field. Headers not present in the
/// field table were either aggregated into [`Event::custom_headers`] (when
/// they carried the table's custom prefix) or dropped during normalization.
#[derive(Debug, Clone)]
pub struct Event {
    slots: Box<[Option<String>]>,
    body: Option<String>,
    disconnect: bool,
}

impl Event {
    /// Create an empty event with all slots vacant.
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![None; EventField::COUNT].into_boxed_slice(),
            body: None,
            disconnect: false,
        }
    }

    /// Store a value in a field slot. First occurrence wins; later
    /// duplicates of the same header are ignored.
    pub(crate) fn set(&mut self, field: EventField, value: String) {
        let slot = &mut self.slots[field.index()];
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Append a `key:value|` segment to the custom-headers slot.
    pub(crate) fn push_custom_header(&mut self, key: &str, value: &str) {
        let slot = &mut self.slots[EventField::CustomHeaders.index()];
        let aggregated = slot.get_or_insert_with(String::new);
        aggregated.push_str(key);
        aggregated.push(':');
        aggregated.push_str(value);
        aggregated.push('|');
    }

    pub(crate) fn set_body(&mut self, body: String) {
        self.body = Some(body);
    }

    pub(crate) fn mark_disconnect(&mut self) {
        self.disconnect = true;
    }

    /// Get a field value, or `None` if the header was absent.
    pub fn get(&self, field: EventField) -> Option<&str> {
        self.slots[field.index()].as_deref()
    }

    /// Get a field value converted to an integer.
    ///
    /// Returns a framing error if the field is absent or not numeric.
    pub fn get_int(&self, field: EventField) -> Result<i64> {
        let value = self
            .get(field)
            .ok_or_else(|| EventSockError::Framing(format!("missing field {:?}", field)))?;
        value
            .parse()
            .map_err(|_| EventSockError::Framing(format!("field {:?} is not an integer", field)))
    }

    /// The aggregated custom headers, encoded as repeated `key:value|`
    /// segments, or `None` if no custom header was seen.
    pub fn custom_headers(&self) -> Option<&str> {
        self.get(EventField::CustomHeaders)
    }

    /// Raw body carried by the frame, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// True when this event is the peer's disconnect notice: the stream is
    /// ending and no further events will follow.
    pub fn is_disconnect(&self) -> bool {
        self.disconnect
    }

    /// Iterate populated fields in slot order.
    pub fn fields(&self) -> impl Iterator<Item = (EventField, &str)> {
        self.slots.iter().enumerate().filter_map(|(i, v)| {
            v.as_deref()
                .and_then(|s| EventField::from_index(i).map(|field| (field, s)))
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, value) in self.fields() {
            writeln!(f, "{field:?}: {value}")?;
        }
        if let Some(body) = &self.body {
            writeln!(f, "BODY: {body}")?;
        }
        Ok(())
    }
}
