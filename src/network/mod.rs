//! Datagram transport and peer bookkeeping
//!
//! The engine and the reader only see the [`Transport`] and
//! [`DatagramSocket`] capabilities. [`SystemTransport`] binds real UDP
//! sockets, [`MemoryTransport`] is an in-process bus for simulations, and
//! [`monitor`] offers an async view of the same traffic.

mod connection;
mod discovery;
mod memory;
pub mod monitor;

pub use self::connection::{SystemSocket, SystemTransport};
pub use self::discovery::{Peer, PeerTable, PeerUpdate};
pub use self::memory::{MemorySocket, MemoryTransport, SentDatagram};

use std::net::SocketAddr;

use crate::core::Result;

/// Bound, non-blocking datagram endpoint
///
/// Dropping the socket releases the port.
pub trait DatagramSocket {
    /// Sends one datagram
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize>;

    /// Receives one pending datagram, `None` when nothing is queued
    fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    /// Port the socket is bound to
    fn local_port(&self) -> u16;
}

/// Factory for datagram endpoints
pub trait Transport {
    type Socket: DatagramSocket;

    /// Binds a non-blocking, broadcast-capable endpoint on `port`
    fn bind(&self, port: u16) -> Result<Self::Socket>;
}

impl<T: Transport + ?Sized> Transport for &T {
    type Socket = T::Socket;

    fn bind(&self, port: u16) -> Result<Self::Socket> {
        (**self).bind(port)
    }
}
