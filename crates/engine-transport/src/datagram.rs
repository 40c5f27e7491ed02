//! Connectionless UDP transport.
//!
//! Each `send` emits exactly one datagram whose payload is the encoded
//! message, with no length prefix. Each `recv` yields at most one
//! datagram. Loss is tolerated at this layer; reconciliation is a
//! higher-layer concern.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::error::TransportError;
use crate::{Transport, DATAGRAM_BUF, MAX_PAYLOAD};

pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Bind an ephemeral local port and direct all traffic at `addr`.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(TransportError::ConnectRefused)?;
        socket
            .connect(addr)
            .await
            .map_err(TransportError::ConnectRefused)?;

        debug!("datagram peer set to {addr}");
        Ok(Self {
            socket: Some(socket),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        socket
            .send(payload)
            .await
            .map_err(TransportError::WriteError)?;
        Ok(())
    }

    async fn recv(&mut self, deadline: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;

        let mut buf = vec![0u8; DATAGRAM_BUF];
        match timeout(deadline, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Ok(Err(e)) => Err(TransportError::ReadError(e)),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.socket = None;
    }

    fn connected(&self) -> bool {
        self.socket.is_some()
    }
}
