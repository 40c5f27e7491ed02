//! engine-codec
//!
//! Wire-level encoding/decoding for the matching-engine client toolkit.
//!
//! This crate is responsible for turning logical engine messages
//! ([`Request`] / [`Event`]) into bytes and back again, in both wire
//! dialects the engine family speaks:
//!
//! - [`binary`] : compact binary protocol (magic byte `0x4D`, big-endian)
//! - [`csv`]    : line-oriented CSV compatibility protocol
//! - [`auto`]   : receive-side dispatch between the two, keyed on the
//!   first byte of the payload
//!
//! The codec is transport-agnostic: it sees exactly one message per
//! buffer. Stream framing (length prefixes) is the transport's job.

pub mod auto;
pub mod binary;
pub mod csv;
pub mod error;
pub mod messages;
pub mod wire_types;

pub use auto::decode_event_auto;
pub use error::CodecError;
pub use messages::{
    Ack, Cancel, CancelAck, CancelReject, Event, EventKind, NewOrder, Reject, Request, Side,
    TopOfBook, Trade,
};
