//! Codec error type.
//!
//! Every failure mode of the binary and CSV decoders maps onto one of
//! these variants. None of them is fatal to a session: callers surface
//! them as a malformed-payload report and keep reading.

use std::fmt;

/// Errors that can arise when encoding or decoding a wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Binary payload did not start with the magic byte.
    BadMagic(u8),

    /// Unknown or unsupported message type byte / record tag.
    UnknownType(u8),

    /// Buffer or record too short for the expected fields.
    Truncated,

    /// A field failed to parse (non-decimal CSV field, bad symbol, ...).
    ParseField(&'static str),

    /// Side byte was neither `'B'` nor `'S'`.
    UnknownSide(u8),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BadMagic(b) => write!(f, "bad magic byte: 0x{b:02X}"),
            CodecError::UnknownType(t) => write!(f, "unknown message type: 0x{t:02X}"),
            CodecError::Truncated => write!(f, "buffer truncated"),
            CodecError::ParseField(field) => write!(f, "invalid field: {field}"),
            CodecError::UnknownSide(b) => write!(f, "unknown side byte: 0x{b:02X}"),
        }
    }
}

impl std::error::Error for CodecError {}
