use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use crate::core::{Error, Result};
use super::{DatagramSocket, Transport};

/// UDP transport backed by the operating system
#[derive(Debug, Clone, Copy)]
pub struct SystemTransport {
    bind_ip: IpAddr,
}

impl SystemTransport {
    /// Creates a transport binding on all interfaces
    pub fn new() -> Self {
        Self::with_bind_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Creates a transport binding on one interface address
    pub fn with_bind_ip(bind_ip: IpAddr) -> Self {
        SystemTransport { bind_ip }
    }
}

impl Default for SystemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SystemTransport {
    type Socket = SystemSocket;

    fn bind(&self, port: u16) -> Result<SystemSocket> {
        let addr = SocketAddr::new(self.bind_ip, port);
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket
            .bind(&addr.into())
            .map_err(|e| Error::network(format!("Failed to bind UDP port {}: {}", port, e)))?;

        let socket: UdpSocket = socket.into();
        let port = socket.local_addr()?.port();
        debug!(port, "UDP endpoint bound");
        Ok(SystemSocket { socket, port })
    }
}

/// Non-blocking UDP socket
#[derive(Debug)]
pub struct SystemSocket {
    socket: UdpSocket,
    port: u16,
}

impl DatagramSocket for SystemSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        trace!(port = self.port, %addr, len = buf.len(), "send");
        Ok(self.socket.send_to(buf, addr)?)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> SystemTransport {
        SystemTransport::with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let socket = loopback().bind(0).unwrap();
        assert_ne!(socket.local_port(), 0);

        let mut buf = [0u8; 16];
        assert!(socket.try_recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_datagram_exchange() {
        let transport = loopback();
        let receiver = transport.bind(0).unwrap();
        let sender = transport.bind(0).unwrap();
        let to = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), receiver.local_port());

        assert_eq!(sender.send_to(b"?tc", to).unwrap(), 3);

        let mut buf = [0u8; 16];
        let mut received = None;
        for _ in 0..100 {
            if let Some(datagram) = receiver.try_recv_from(&mut buf).unwrap() {
                received = Some(datagram);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let (len, from) = received.expect("datagram not delivered");
        assert_eq!(&buf[..len], b"?tc");
        assert_eq!(from.port(), sender.local_port());
    }
}
