//! Receive-only multicast transport.
//!
//! Joins an IPv4 multicast group, optionally on a specific interface
//! address, and yields whole datagrams. Sending is forbidden.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::info;

use crate::error::TransportError;
use crate::{Transport, DATAGRAM_BUF};

pub struct MulticastTransport {
    socket: Option<UdpSocket>,
}

impl MulticastTransport {
    /// Join `group:port`, receiving on `interface` (the interface's
    /// IPv4 address; `None` lets the OS pick).
    pub async fn join(
        group: Ipv4Addr,
        port: u16,
        interface: Option<Ipv4Addr>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(TransportError::ConnectRefused)?;

        let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .join_multicast_v4(group, iface)
            .map_err(TransportError::ConnectRefused)?;

        info!("joined multicast group {group}:{port} on {iface}");
        Ok(Self {
            socket: Some(socket),
        })
    }
}

#[async_trait]
impl Transport for MulticastTransport {
    async fn send(&mut self, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::SendOnReadOnly)
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
