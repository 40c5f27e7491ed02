//! engine-transport
//!
//! Moves opaque byte payloads between the toolkit and a matching
//! engine. Three concrete transports:
//!
//! - [`stream::TcpTransport`]: connection-oriented, with a 4-byte
//!   big-endian length prefix framing each payload.
//! - [`datagram::UdpTransport`]: one datagram per payload, no prefix.
//! - [`multicast::MulticastTransport`]: receive-only group membership.
//!
//! The codec never sees framing; a transport's `recv` always yields
//! exactly one whole payload.

pub mod datagram;
pub mod error;
pub mod multicast;
pub mod stream;

use std::time::Duration;

use async_trait::async_trait;

pub use datagram::UdpTransport;
pub use error::TransportError;
pub use multicast::MulticastTransport;
pub use stream::TcpTransport;

/// Ceiling on a single payload, shared by all transports.
pub const MAX_PAYLOAD: usize = 65535;

/// Receive buffer size for datagram transports (MTU ceiling).
pub const DATAGRAM_BUF: usize = 65536;

/// A bidirectional (or receive-only) byte-payload capability.
///
/// Contract:
/// - `recv` returns `Ok(Some(bytes))` when a whole payload arrived
///   before the deadline, `Ok(None)` on deadline, `Err` on transport
///   death.
/// - `close` is idempotent.
/// - `connected` may be conservative (false negatives under a race are
///   fine) but is never true after `close`.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    async fn recv(&mut self, deadline: Duration) -> Result<Option<Vec<u8>>, TransportError>;

    async fn close(&mut self);

    fn connected(&self) -> bool;
}
