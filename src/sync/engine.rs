use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::core::{
    EngineConfig, Layer, NodeId, NodeName, NodeType, Result, DEVICE_NAME, MAX_PACKET_SIZE, PORT_DATA,
    PORT_MANAGEMENT, PORT_TIME, PORT_UNICAST, VENDOR_NAME,
};
use crate::network::{DatagramSocket, PeerTable, PeerUpdate, Transport};
use crate::protocol::message::label;
use crate::protocol::{self, EngineState, ManagementHeader, Message, MessageType, OptIn, OptOut, TimePacket};
use crate::time::{Clock, TimeCode, TimeCodeType};
use crate::util::{duration_to_ms, elapsed_ms, interval_elapsed};
use super::TimeCodeHandler;

/// Counters kept by the engine since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Datagrams received on the management port
    pub management: u64,
    /// Datagrams received on the time port
    pub time: u64,
    /// Datagrams received on the request/reply port
    pub data: u64,
    /// Datagrams received on the unicast port
    pub unicast: u64,
    /// Datagrams that failed to decode or validate
    pub dropped: u64,
    /// Valid time messages for another layer, or while timecode is disabled
    pub ignored: u64,
    /// Time messages handed to the handler
    pub timecodes: u64,
    pub announces: u64,
    pub replies: u64,
    pub send_errors: u64,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Management,
    Time,
    Data,
    Unicast,
}

struct Endpoints<S> {
    management: S,
    time: S,
    data: S,
    unicast: S,
}

impl<S: DatagramSocket> Endpoints<S> {
    /// Binds all four ports; sockets bound before a failure are dropped
    fn bind<T: Transport<Socket = S>>(transport: &T) -> Result<Self> {
        Ok(Endpoints {
            management: transport.bind(PORT_MANAGEMENT)?,
            time: transport.bind(PORT_TIME)?,
            data: transport.bind(PORT_DATA)?,
            unicast: transport.bind(PORT_UNICAST)?,
        })
    }
}

/// TCNet node engine
///
/// Driven by repeated calls to [`Engine::run`] from a single poll loop. All
/// sockets are non-blocking; a poll step drains what is queued and returns.
pub struct Engine<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: EngineConfig,
    node_id: NodeId,
    state: EngineState,
    endpoints: Option<Endpoints<T::Socket>>,
    seq: u8,
    started_at: u32,
    last_announce: u32,
    peers: PeerTable,
    handler: Option<Weak<RefCell<dyn TimeCodeHandler>>>,
    last_timecode: Option<TimeCode>,
    stats: EngineStats,
}

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Creates a stopped engine with a random node id
    pub fn new(config: EngineConfig, transport: T, clock: C) -> Self {
        let peers = PeerTable::new(config.max_peers, duration_to_ms(config.peer_timeout));
        Engine {
            transport,
            clock,
            config,
            node_id: NodeId::random(),
            state: EngineState::Stopped,
            endpoints: None,
            seq: 0,
            started_at: 0,
            last_announce: 0,
            peers,
            handler: None,
            last_timecode: None,
            stats: EngineStats::default(),
        }
    }

    /// Binds the four TCNet endpoints
    ///
    /// On failure every endpoint bound so far is released and the engine
    /// stays stopped.
    pub fn start(&mut self) -> Result<()> {
        let next = self.state.on_start()?;
        let endpoints = Endpoints::bind(&self.transport)?;

        let now = self.clock.millis();
        self.endpoints = Some(endpoints);
        self.started_at = now;
        self.last_announce = now;
        self.state = next;

        info!(
            node_id = self.node_id.0,
            name = %self.config.node_name,
            layer = %self.config.layer,
            "TCNet engine started"
        );
        Ok(())
    }

    /// Announces the departure and releases all endpoints
    pub fn stop(&mut self) {
        let Some(endpoints) = self.endpoints.take() else {
            return;
        };

        let opt_out = OptOut {
            header: self.header(MessageType::OptOut, self.clock.millis()),
            node_count: self.node_count(),
            listener_port: PORT_UNICAST,
        };
        let broadcast = SocketAddr::new(self.config.broadcast_addr, PORT_MANAGEMENT);
        self.send(&endpoints.management, &Message::OptOut(opt_out), broadcast);

        drop(endpoints);
        self.peers.clear();
        self.state = self.state.on_stop();
        info!(node_id = self.node_id.0, "TCNet engine stopped");
    }

    /// One poll step; a no-op while stopped
    pub fn run(&mut self) {
        let Some(endpoints) = self.endpoints.take() else {
            return;
        };
        self.state = self.state.on_run();
        let now = self.clock.millis();

        self.drain(&endpoints.management, Endpoint::Management, now);
        self.drain(&endpoints.time, Endpoint::Time, now);
        self.drain(&endpoints.data, Endpoint::Data, now);
        self.drain(&endpoints.unicast, Endpoint::Unicast, now);

        let interval = duration_to_ms(self.config.announce_interval);
        if interval_elapsed(now, self.last_announce, interval) {
            self.last_announce = now;
            self.seq = self.seq.wrapping_add(1);

            let opt_in = self.opt_in(now);
            let broadcast = SocketAddr::new(self.config.broadcast_addr, PORT_MANAGEMENT);
            if self.send(&endpoints.management, &Message::OptIn(opt_in), broadcast) {
                self.stats.announces += 1;
            }
            self.peers.expire(now);
        }

        self.endpoints = Some(endpoints);
    }

    fn drain(&mut self, socket: &T::Socket, endpoint: Endpoint, now: u32) {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        loop {
            let (len, from) = match socket.try_recv_from(&mut buf) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    warn!(port = socket.local_port(), error = %e, "Receive failed");
                    break;
                }
            };
            trace!(?endpoint, %from, len, "datagram");

            match endpoint {
                Endpoint::Management => self.stats.management += 1,
                Endpoint::Time => self.stats.time += 1,
                Endpoint::Data => self.stats.data += 1,
                Endpoint::Unicast => self.stats.unicast += 1,
            }

            let message = match protocol::decode(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    self.stats.dropped += 1;
                    debug!(?endpoint, %from, error = %e, "Dropping datagram");
                    continue;
                }
            };

            if message.header().is_same_node(&self.header(MessageType::OptIn, now)) {
                continue;
            }

            match endpoint {
                Endpoint::Management => self.handle_management(&message, from, now),
                Endpoint::Time => self.handle_time(&message),
                Endpoint::Data => trace!(%from, message_type = ?message.message_type(), "Request/reply traffic"),
                Endpoint::Unicast => self.handle_unicast(socket, &message, from, now),
            }
        }
    }

    fn handle_management(&mut self, message: &Message, from: SocketAddr, now: u32) {
        match message {
            Message::OptIn(opt_in) => {
                if self.peers.observe(from, opt_in, now) == PeerUpdate::Full {
                    self.stats.ignored += 1;
                }
            }
            Message::OptOut(_) => {
                self.peers.remove(&from);
            }
            other => trace!(%from, message_type = ?other.message_type(), "Management traffic"),
        }
    }

    fn handle_time(&mut self, message: &Message) {
        let Message::Time(packet) = message else {
            return;
        };
        if packet.layer == Layer::Undefined {
            self.stats.dropped += 1;
            debug!("Dropping time message with unknown layer");
            return;
        }
        if !self.config.use_timecode || packet.layer != self.config.layer {
            self.stats.ignored += 1;
            return;
        }

        match packet.timecode(self.config.timecode_type) {
            Ok(timecode) => {
                self.stats.timecodes += 1;
                self.last_timecode = Some(timecode);
                self.notify(&timecode);
            }
            Err(e) => {
                self.stats.dropped += 1;
                debug!(layer = %packet.layer, error = %e, "Dropping time message");
            }
        }
    }

    fn handle_unicast(&mut self, socket: &T::Socket, message: &Message, from: SocketAddr, now: u32) {
        if let Message::Request(request) = message {
            debug!(%from, data_type = request.data_type, layer = %request.layer, "Request");
            let reply = self.opt_in(now);
            if self.send(socket, &Message::OptIn(reply), from) {
                self.stats.replies += 1;
            }
        }
    }

    fn notify(&mut self, timecode: &TimeCode) {
        let handler = self.handler.as_ref().and_then(Weak::upgrade);
        let Some(handler) = handler else {
            if self.handler.take().is_some() {
                debug!("Timecode handler dropped");
            }
            return;
        };

        match handler.try_borrow_mut() {
            Ok(mut handler) => handler.handle_timecode(timecode),
            Err(_) => warn!("Timecode handler busy, frame skipped"),
        };
    }

    fn send(&mut self, socket: &T::Socket, message: &Message, to: SocketAddr) -> bool {
        let mut packet = [0u8; MAX_PACKET_SIZE];
        let result = protocol::encode(message, &mut packet).and_then(|len| socket.send_to(&packet[..len], to));
        match result {
            Ok(_) => true,
            Err(e) => {
                self.stats.send_errors += 1;
                warn!(%to, message_type = ?message.message_type(), error = %e, "Send failed");
                false
            }
        }
    }

    fn header(&self, message_type: MessageType, now: u32) -> ManagementHeader {
        let mut header = ManagementHeader::new(self.node_id, message_type, self.config.node_name, self.config.node_type);
        header.seq = self.seq;
        header.timestamp = now.wrapping_mul(1000);
        header
    }

    fn node_count(&self) -> u16 {
        u16::try_from(self.peers.len() + 1).unwrap_or(u16::MAX)
    }

    fn opt_in(&self, now: u32) -> OptIn {
        let uptime = elapsed_ms(now, self.started_at) / 1000;
        OptIn {
            header: self.header(MessageType::OptIn, now),
            node_count: self.node_count(),
            listener_port: PORT_UNICAST,
            uptime: u16::try_from(uptime).unwrap_or(u16::MAX),
            layer: self.config.layer,
            vendor: label(VENDOR_NAME),
            device: label(DEVICE_NAME),
            device_version: device_version(),
        }
    }

    /// Registers the receiver of accepted timecodes without taking ownership
    pub fn set_timecode_handler<H: TimeCodeHandler + 'static>(&mut self, handler: &Rc<RefCell<H>>) {
        let handler: Rc<RefCell<dyn TimeCodeHandler>> = handler.clone();
        self.handler = Some(Rc::downgrade(&handler));
    }

    pub fn clear_timecode_handler(&mut self) {
        self.handler = None;
    }

    pub fn set_layer(&mut self, layer: Layer) {
        if self.config.layer != layer {
            debug!(from = %self.config.layer, to = %layer, "Layer changed");
            self.config.layer = layer;
        }
    }

    pub fn layer(&self) -> Layer {
        self.config.layer
    }

    pub fn set_node_name(&mut self, name: &str) {
        self.config.node_name = NodeName::new(name);
        debug!(name = %self.config.node_name, "Node name changed");
    }

    pub fn node_name(&self) -> NodeName {
        self.config.node_name
    }

    /// Frame rate applied to time messages without SMPTE fields
    pub fn set_timecode_type(&mut self, tc_type: TimeCodeType) {
        if self.config.timecode_type != tc_type {
            debug!(from = ?self.config.timecode_type, to = ?tc_type, "Timecode type changed");
            self.config.timecode_type = tc_type;
        }
    }

    pub fn timecode_type(&self) -> TimeCodeType {
        self.config.timecode_type
    }

    pub fn set_use_timecode(&mut self, use_timecode: bool) {
        self.config.use_timecode = use_timecode;
    }

    pub fn use_timecode(&self) -> bool {
        self.config.use_timecode
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.config.node_type = node_type;
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Sequence number of the last announcement
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Most recent accepted timecode
    pub fn last_timecode(&self) -> Option<TimeCode> {
        self.last_timecode
    }

    /// Broadcasts `timecode` on the time port, as a master node would
    pub fn send_time(&mut self, timecode: &TimeCode) -> Result<()> {
        let Some(endpoints) = self.endpoints.take() else {
            return Err(crate::core::Error::invalid_state("Engine not started"));
        };

        let now = self.clock.millis();
        let packet = TimePacket::from_timecode(self.header(MessageType::Time, now), self.config.layer, timecode);
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let result = protocol::encode(&Message::Time(packet), &mut buf).and_then(|len| {
            endpoints
                .time
                .send_to(&buf[..len], SocketAddr::new(self.config.broadcast_addr, PORT_TIME))
        });

        self.endpoints = Some(endpoints);
        result.map(|_| ())
    }
}

fn device_version() -> [u8; 3] {
    [
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    ]
}
