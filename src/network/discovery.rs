use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::{debug, info};

use crate::core::{Layer, NodeId, NodeName, NodeType};
use crate::protocol::message::OptIn;
use crate::protocol::LABEL_LENGTH;
use crate::util::elapsed_ms;

/// Remote node observed through its opt-in announcements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub node_id: NodeId,
    pub node_name: NodeName,
    pub node_type: NodeType,
    pub layer: Layer,
    pub listener_port: u16,
    /// Seconds since the peer started, as last announced
    pub uptime: u16,
    vendor: [u8; LABEL_LENGTH],
    seq: u8,
    last_seen: u32,
}

impl Peer {
    fn from_opt_in(addr: SocketAddr, opt_in: &OptIn, now: u32) -> Self {
        Peer {
            addr,
            node_id: opt_in.header.node_id,
            node_name: opt_in.header.node_name,
            node_type: opt_in.header.node_type,
            layer: opt_in.layer,
            listener_port: opt_in.listener_port,
            uptime: opt_in.uptime,
            vendor: opt_in.vendor,
            seq: opt_in.header.seq,
            last_seen: now,
        }
    }

    /// Vendor label up to the first padding byte
    pub fn vendor(&self) -> &str {
        let end = self.vendor.iter().position(|&b| b == 0).unwrap_or(LABEL_LENGTH);
        std::str::from_utf8(&self.vendor[..end]).unwrap_or("")
    }

    pub fn last_seen(&self) -> u32 {
        self.last_seen
    }
}

/// Outcome of feeding an opt-in to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    /// New peer, or a peer back after timing out
    Joined,
    /// Known peer announced again
    Refreshed,
    /// Repeated or out-of-order sequence number
    Stale,
    /// Table at capacity
    Full,
}

/// Bounded table of peers keyed by source address
#[derive(Debug)]
pub struct PeerTable {
    peers: HashMap<SocketAddr, Peer>,
    max_peers: usize,
    timeout_ms: u32,
}

impl PeerTable {
    pub fn new(max_peers: usize, timeout_ms: u32) -> Self {
        PeerTable {
            peers: HashMap::with_capacity(max_peers),
            max_peers,
            timeout_ms,
        }
    }

    /// Records an opt-in received from `addr` at `now`
    ///
    /// Sequence numbers must move forward (wrapping) unless the peer had
    /// already timed out.
    pub fn observe(&mut self, addr: SocketAddr, opt_in: &OptIn, now: u32) -> PeerUpdate {
        let timeout_ms = self.timeout_ms;
        if let Some(peer) = self.peers.get_mut(&addr) {
            let timed_out = elapsed_ms(now, peer.last_seen) > timeout_ms;
            let advance = opt_in.header.seq.wrapping_sub(peer.seq);
            if !timed_out && (advance == 0 || advance >= 0x80) {
                debug!(%addr, seq = opt_in.header.seq, last = peer.seq, "Stale opt-in ignored");
                return PeerUpdate::Stale;
            }

            *peer = Peer::from_opt_in(addr, opt_in, now);
            return if timed_out {
                info!(%addr, name = %peer.node_name, "Peer rejoined");
                PeerUpdate::Joined
            } else {
                PeerUpdate::Refreshed
            };
        }

        if self.peers.len() >= self.max_peers {
            debug!(%addr, max = self.max_peers, "Peer table full");
            return PeerUpdate::Full;
        }

        let peer = Peer::from_opt_in(addr, opt_in, now);
        info!(%addr, name = %peer.node_name, node_type = ?peer.node_type, layer = %peer.layer, "Peer joined");
        self.peers.insert(addr, peer);
        PeerUpdate::Joined
    }

    /// Removes a peer that opted out
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Peer> {
        let peer = self.peers.remove(addr)?;
        info!(%addr, name = %peer.node_name, "Peer left");
        Some(peer)
    }

    /// Drops peers silent for longer than the timeout; returns how many
    pub fn expire(&mut self, now: u32) -> usize {
        let timeout_ms = self.timeout_ms;
        let before = self.peers.len();
        self.peers.retain(|addr, peer| {
            let alive = elapsed_ms(now, peer.last_seen) <= timeout_ms;
            if !alive {
                info!(%addr, name = %peer.node_name, "Peer timed out");
            }
            alive
        });
        before - self.peers.len()
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Peer> {
        self.peers.get(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Peer announcing itself as master; the lowest node id wins a tie
    pub fn master(&self) -> Option<&Peer> {
        self.peers
            .values()
            .filter(|peer| peer.node_type == NodeType::Master)
            .min_by_key(|peer| peer.node_id.0)
    }
}
