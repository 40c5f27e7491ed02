//! Receive-side protocol dispatch.
//!
//! Engines in this family answer in whichever dialect they were built
//! with, so the client decodes defensively: the magic byte `0x4D`
//! selects the binary decoder, anything else is treated as a CSV line.
//! No CSV event record starts with `0x4D` (`'M'`), so one byte is
//! enough to disambiguate.

use crate::binary;
use crate::csv;
use crate::error::CodecError;
use crate::messages::Event;
use crate::wire_types::MAGIC;

/// Decode one received payload as an [`Event`], choosing the dialect
/// from the first byte.
pub fn decode_event_auto(buf: &[u8]) -> Result<Event, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Truncated);
    }

    if buf[0] == MAGIC {
        return binary::decode_event(buf);
    }

    let text = std::str::from_utf8(buf).map_err(|_| CodecError::ParseField("utf8"))?;
    // One trailing LF is part of the framing, not the record.
    csv::decode_event(text.strip_suffix('\n').unwrap_or(text))
}
