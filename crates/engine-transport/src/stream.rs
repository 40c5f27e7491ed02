//! Length-prefixed TCP transport.
//!
//! Every payload is preceded on the wire by a 4-byte big-endian
//! length. The receiver reads that prefix, then exactly that many
//! bytes, yielding one payload. Payload lengths outside 1..=65535 are
//! a protocol violation: the connection is closed and the caller gets
//! [`TransportError::FrameTooLarge`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::TransportError;
use crate::{Transport, MAX_PAYLOAD};

const LEN_PREFIX: usize = 4;

pub struct TcpTransport {
    stream: Option<TcpStream>,
    read_buffer: BytesMut,
}

impl TcpTransport {
    /// Connect to `addr`, bounded by `connect_timeout`.
    ///
    /// Orders are latency-sensitive, so `TCP_NODELAY` is always on.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::ConnectRefused(e)),
            Err(_) => return Err(TransportError::ConnectTimeout(connect_timeout)),
        };
        stream
            .set_nodelay(true)
            .map_err(TransportError::ConnectRefused)?;

        debug!("connected to {addr}");
        Ok(Self {
            stream: Some(stream),
            read_buffer: BytesMut::with_capacity(64 * 1024),
        })
    }

    /// Wrap an already-connected stream (used by in-process test
    /// engines).
    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self {
            stream: Some(stream),
            read_buffer: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Read one length-prefixed frame, buffering partial reads across
    /// calls so a deadline mid-frame loses nothing.
    async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if self.read_buffer.len() >= LEN_PREFIX {
                let len = u32::from_be_bytes([
                    self.read_buffer[0],
                    self.read_buffer[1],
                    self.read_buffer[2],
                    self.read_buffer[3],
                ]) as usize;

                if len == 0 || len > MAX_PAYLOAD {
                    self.close_inner();
                    return Err(TransportError::FrameTooLarge(len));
                }

                if self.read_buffer.len() >= LEN_PREFIX + len {
                    self.read_buffer.advance(LEN_PREFIX);
                    let payload = self.read_buffer.split_to(len);
                    return Ok(payload.to_vec());
                }
            }

            let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
            let n = stream
                .read_buf(&mut self.read_buffer)
                .await
                .map_err(TransportError::ReadError)?;
            if n == 0 {
                self.close_inner();
                return Err(TransportError::Closed);
            }
        }
    }

    fn close_inner(&mut self) {
        self.stream = None;
        self.read_buffer.clear();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }

        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        let len = (payload.len() as u32).to_be_bytes();
        stream
            .write_all(&len)
            .await
            .map_err(TransportError::WriteError)?;
        stream
            .write_all(payload)
            .await
            .map_err(TransportError::WriteError)?;
        stream.flush().await.map_err(TransportError::WriteError)?;

        Ok(())
    }

    async fn recv(&mut self, deadline: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::Closed);
        }
        match timeout(deadline, self.read_frame()).await {
            Ok(Ok(payload)) => Ok(Some(payload)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.read_buffer.clear();
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }
}
