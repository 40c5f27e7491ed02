//! Transport error taxonomy.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the transport layer.
///
/// `ConnectRefused` / `ConnectTimeout` only reach the caller that
/// initiated the connect. Everything else can occur mid-session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectRefused(#[source] io::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("read error: {0}")]
    ReadError(#[source] io::Error),

    #[error("write error: {0}")]
    WriteError(#[source] io::Error),

    /// Peer closed the connection, or the transport was closed locally.
    #[error("transport closed")]
    Closed,

    /// Stream frame length outside the accepted 1..=65535 range.
    #[error("frame length {0} outside accepted range 1..=65535")]
    FrameTooLarge(usize),

    /// `send` called on a receive-only (multicast) transport.
    #[error("send on receive-only transport")]
    SendOnReadOnly,
}
