//! Header-key normalization and field resolution.
//!
//! Raw wire keys arrive in whatever case the switch emits. Normalization
//! canonicalizes them into display form, resolves them against the field
//! table, and percent-decodes values for the frame types whose wire
//! encoding escapes them (the nested event format and `%`-marked command
//! replies).

use percent_encoding::percent_decode_str;

use crate::event::Event;
use crate::fields::FieldTable;

/// Canonicalize a raw header key into display form.
///
/// Rules, in order:
/// - keys starting with `_` pass through unchanged;
/// - keys whose bytes 1..9 read `ariable_` are lowercased wholesale with
///   only the first character uppercased (channel-variable headers keep
///   their embedded underscores un-capitalized);
/// - everything else is lowercased, then the first character and each
///   character following a `-` or `_` is uppercased.
///
/// Idempotent: applying it to its own output is a no-op.
pub fn canonical_key(raw: &str) -> String {
    if raw.is_empty() || raw.starts_with('_') {
        return raw.to_string();
    }

    let bytes = raw.as_bytes();
    if bytes.len() > 9 && &bytes[1..9] == b"ariable_" {
        let mut out = String::with_capacity(raw.len());
        for (i, c) in raw.chars().enumerate() {
            if i == 0 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
        }
        return out;
    }

    let mut out = String::with_capacity(raw.len());
    let mut upper_next = true;
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            if c == '-' || c == '_' {
                upper_next = true;
            }
            out.push(c);
        }
    }
    out
}

/// Percent-decode a header value, falling back to the raw text when the
/// escape sequences are not valid UTF-8.
pub fn decode_value(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Normalize raw header lines into an [`Event`].
///
/// Keys resolving through the table land in their field slot (first
/// occurrence wins). Unresolved keys carrying the table's custom prefix are
/// aggregated as `key:value|` segments; all other keys are dropped. Values
/// are percent-decoded only when `decode` is set.
pub fn normalize(headers: &[(String, String)], table: &FieldTable, decode: bool) -> Event {
    let mut event = Event::new();
    for (raw_key, raw_value) in headers {
        let key = canonical_key(raw_key);
        let value = if decode {
            decode_value(raw_value)
        } else {
            raw_value.clone()
        };

        if let Some(field) = table.resolve(&key) {
            event.set(field, value);
        } else if key.starts_with(table.custom_prefix()) {
            event.push_custom_header(&key, &value);
        } else {
            tracing::trace!(key = %key, "dropping header with no field table entry");
        }
    }
    event
}
