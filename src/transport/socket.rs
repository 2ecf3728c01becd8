//! Async UDP socket wrapper for sonar datagrams.
//!
//! Provides a receive-only interface that hands out each datagram as an owned
//! [`Bytes`] frame, so the receive buffer is free again before the frame is
//! captured, decoded and dispatched.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::core::MAX_DATAGRAM_SIZE;

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = MAX_DATAGRAM_SIZE;

/// Async UDP socket receiving sonar datagrams.
#[derive(Debug)]
pub struct SonarSocket {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// Receive buffer.
    recv_buffer: Vec<u8>,
}

impl SonarSocket {
    /// Create a socket bound to the given address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        SonarSocketBuilder::new().bind(addr).await
    }

    /// Create a socket from an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        SonarSocketBuilder::new().from_socket(socket)
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Size of the receive buffer. Longer datagrams are truncated.
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer.len()
    }

    /// Receive one datagram and return it with the sender's address.
    ///
    /// A zero-length datagram yields an empty frame.
    pub async fn recv_frame(&mut self) -> io::Result<(Bytes, SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((Bytes::copy_from_slice(&self.recv_buffer[..len]), addr))
    }

    /// Try to receive a datagram without blocking.
    ///
    /// Returns `Ok(None)` if no data is available.
    pub fn try_recv_frame(&mut self) -> io::Result<Option<(Bytes, SocketAddr)>> {
        match self.socket.try_recv_from(&mut self.recv_buffer) {
            Ok((len, addr)) => Ok(Some((
                Bytes::copy_from_slice(&self.recv_buffer[..len]),
                addr,
            ))),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Builder for creating sonar sockets with custom options.
#[derive(Debug, Clone)]
pub struct SonarSocketBuilder {
    recv_buffer_size: usize,
}

impl Default for SonarSocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SonarSocketBuilder {
    /// Create a new socket builder with default options.
    pub fn new() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Bind to the given address and create a socket.
    pub async fn bind(self, addr: SocketAddr) -> io::Result<SonarSocket> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(self.from_socket(socket))
    }

    /// Create a socket from an existing UDP socket.
    pub fn from_socket(self, socket: UdpSocket) -> SonarSocket {
        SonarSocket {
            socket,
            recv_buffer: vec![0u8; self.recv_buffer_size.max(1)],
        }
    }
}
