//! Async TCNet traffic monitor
//!
//! Tooling view of the same wire format the poll-loop engine speaks: a
//! `UdpFramed` stream of decoded packets, usable from any tokio runtime.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio_util::udp::UdpFramed;
use tracing::{debug, info};

use crate::core::{Error, Result};
use crate::protocol::{Message, TcNetCodec};

/// Decoded TCNet traffic on one UDP port
pub struct Monitor {
    framed: UdpFramed<TcNetCodec>,
    local_addr: SocketAddr,
}

impl Monitor {
    /// Binds a broadcast-capable socket on `addr`
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::network(format!("Failed to bind monitor on {}: {}", addr, e)))?;
        socket.set_broadcast(true)?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "TCNet monitor listening");

        Ok(Monitor {
            framed: UdpFramed::new(socket, TcNetCodec::new()),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next valid packet; malformed datagrams are skipped
    pub async fn next_message(&mut self) -> Option<Result<(Message, SocketAddr)>> {
        loop {
            match self.framed.next().await? {
                Ok(received) => return Some(Ok(received)),
                Err(e) if e.is_malformed_input() => {
                    debug!(error = %e, "Skipping malformed datagram");
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Sends one packet
    pub async fn send(&mut self, message: Message, addr: SocketAddr) -> Result<()> {
        self.framed.send((message, addr)).await
    }
}
