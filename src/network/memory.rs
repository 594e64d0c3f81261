use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::Result;
use super::{DatagramSocket, Transport};

/// Datagram recorded by a [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub from_port: u16,
    pub to: SocketAddr,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Bus {
    inboxes: HashMap<u16, VecDeque<(Vec<u8>, SocketAddr)>>,
    sent: Vec<SentDatagram>,
    blocked: HashSet<u16>,
}

/// In-process transport for simulations
///
/// Sent datagrams are recorded and never delivered; incoming traffic is
/// queued with [`MemoryTransport::inject`]. Clones share the same bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    bus: Arc<Mutex<Bus>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> MutexGuard<'_, Bus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every later bind of `port` fail
    pub fn block_port(&self, port: u16) {
        self.bus().blocked.insert(port);
    }

    pub fn is_bound(&self, port: u16) -> bool {
        self.bus().inboxes.contains_key(&port)
    }

    /// Queues a datagram for the socket bound on `port`
    ///
    /// Returns false when nothing is bound there.
    pub fn inject(&self, port: u16, from: SocketAddr, payload: &[u8]) -> bool {
        match self.bus().inboxes.get_mut(&port) {
            Some(inbox) => {
                inbox.push_back((payload.to_vec(), from));
                true
            }
            None => false,
        }
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.bus().sent.clone()
    }

    /// Drains the sent log
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.bus().sent)
    }
}

impl Transport for MemoryTransport {
    type Socket = MemorySocket;

    fn bind(&self, port: u16) -> Result<MemorySocket> {
        let mut bus = self.bus();
        if bus.blocked.contains(&port) || bus.inboxes.contains_key(&port) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, format!("port {} unavailable", port)).into());
        }
        bus.inboxes.insert(port, VecDeque::new());

        Ok(MemorySocket {
            bus: Arc::clone(&self.bus),
            port,
        })
    }
}

/// Endpoint on a [`MemoryTransport`] bus
#[derive(Debug)]
pub struct MemorySocket {
    bus: Arc<Mutex<Bus>>,
    port: u16,
}

impl MemorySocket {
    fn bus(&self) -> MutexGuard<'_, Bus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatagramSocket for MemorySocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.bus().sent.push(SentDatagram {
            from_port: self.port,
            to: addr,
            payload: buf.to_vec(),
        });
        Ok(buf.len())
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        let mut bus = self.bus();
        let Some((payload, from)) = bus.inboxes.get_mut(&self.port).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        // Oversized datagrams are cut like a real UDP receive
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(Some((len, from)))
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}

impl Drop for MemorySocket {
    fn drop(&mut self) {
        let port = self.port;
        self.bus().inboxes.remove(&port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn local_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn test_inject_and_receive() {
        let transport = MemoryTransport::new();
        let socket = transport.bind(2762).unwrap();
        let from = local_addr(5000);

        assert!(transport.inject(2762, from, b"?tc"));
        assert!(!transport.inject(2763, from, b"?tc"));

        let mut buf = [0u8; 2];
        assert_eq!(socket.try_recv_from(&mut buf).unwrap(), Some((2, from)));
        assert_eq!(&buf, b"?t");
        assert_eq!(socket.try_recv_from(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_drop_releases_port() {
        let transport = MemoryTransport::new();
        let socket = transport.bind(60000).unwrap();
        assert!(transport.bind(60000).is_err());
        assert!(transport.is_bound(60000));

        drop(socket);
        assert!(!transport.is_bound(60000));
        assert!(transport.bind(60000).is_ok());
    }

    #[test]
    fn test_blocked_port() {
        let transport = MemoryTransport::new();
        transport.block_port(65023);
        let err = transport.bind(65023).unwrap_err();
        assert!(matches!(err, crate::core::Error::Io(_)));
    }

    #[test]
    fn test_sent_log() {
        let transport = MemoryTransport::new();
        let socket = transport.bind(60001).unwrap();
        let to = local_addr(60001);
        socket.send_to(&[1, 2, 3], to).unwrap();

        assert_eq!(
            transport.take_sent(),
            vec![SentDatagram { from_port: 60001, to, payload: vec![1, 2, 3] }]
        );
        assert!(transport.sent().is_empty());
    }
}
