use crate::core::{Error, Layer, NodeId, NodeName, NodeType, Result, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};
use crate::time::{TimeCode, TimeCodeType};
use super::{MessageType, LABEL_LENGTH};

/// Header leading every TCNet packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagementHeader {
    pub node_id: NodeId,
    pub version_major: u8,
    pub version_minor: u8,
    pub message_type: MessageType,
    pub node_name: NodeName,
    /// Wrapping per-sender sequence number
    pub seq: u8,
    pub node_type: NodeType,
    pub node_options: u16,
    /// Sender clock in microseconds
    pub timestamp: u32,
}

impl ManagementHeader {
    /// Creates a header with the current protocol version and zeroed counters
    pub fn new(node_id: NodeId, message_type: MessageType, node_name: NodeName, node_type: NodeType) -> Self {
        ManagementHeader {
            node_id,
            version_major: PROTOCOL_VERSION_MAJOR,
            version_minor: PROTOCOL_VERSION_MINOR,
            message_type,
            node_name,
            seq: 0,
            node_type,
            node_options: 0,
            timestamp: 0,
        }
    }

    /// Whether both headers were sent by the same node
    pub fn is_same_node(&self, other: &ManagementHeader) -> bool {
        self.node_id == other.node_id && self.node_name == other.node_name
    }
}

/// Periodic announcement of a node's presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptIn {
    pub header: ManagementHeader,
    pub node_count: u16,
    pub listener_port: u16,
    /// Seconds since the node started
    pub uptime: u16,
    pub layer: Layer,
    pub vendor: [u8; LABEL_LENGTH],
    pub device: [u8; LABEL_LENGTH],
    /// Major, minor and bug-fix release
    pub device_version: [u8; 3],
}

/// Announcement that a node leaves the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptOut {
    pub header: ManagementHeader,
    pub node_count: u16,
    pub listener_port: u16,
}

/// Layer time broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePacket {
    pub header: ManagementHeader,
    pub layer: Layer,
    pub layer_state: u8,
    /// 0 when the packet carries no SMPTE fields, otherwise 24, 25, 29 or 30
    pub smpte_mode: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub layer_time_ms: u32,
    pub total_time_ms: u32,
}

impl TimePacket {
    /// Builds a time packet carrying `timecode` as SMPTE fields
    pub fn from_timecode(header: ManagementHeader, layer: Layer, timecode: &TimeCode) -> Self {
        TimePacket {
            header,
            layer,
            layer_state: 0,
            smpte_mode: timecode.tc_type().tcnet_code(),
            hours: timecode.hours(),
            minutes: timecode.minutes(),
            seconds: timecode.seconds(),
            frames: timecode.frames(),
            layer_time_ms: timecode.to_millis() as u32,
            total_time_ms: 0,
        }
    }

    /// Validates the carried time into a timecode
    ///
    /// Without SMPTE fields the layer time is converted with `fallback`.
    pub fn timecode(&self, fallback: TimeCodeType) -> Result<TimeCode> {
        if self.smpte_mode == 0 {
            return TimeCode::from_millis(u64::from(self.layer_time_ms), fallback);
        }

        let tc_type = TimeCodeType::from_tcnet_code(self.smpte_mode).ok_or(Error::Malformed("smpte mode"))?;
        TimeCode::new(self.hours, self.minutes, self.seconds, self.frames, tc_type)
    }
}

/// Data request addressed to a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub header: ManagementHeader,
    pub data_type: u8,
    pub layer: Layer,
}

/// Decoded TCNet packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    OptIn(OptIn),
    OptOut(OptOut),
    Time(TimePacket),
    Request(Request),
    /// Valid header with a body this node does not interpret
    Other(ManagementHeader),
}

impl Message {
    pub fn header(&self) -> &ManagementHeader {
        match self {
            Message::OptIn(packet) => &packet.header,
            Message::OptOut(packet) => &packet.header,
            Message::Time(packet) => &packet.header,
            Message::Request(packet) => &packet.header,
            Message::Other(header) => header,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.header().message_type
    }
}

/// Zero padded fixed-width label
pub fn label(text: &str) -> [u8; LABEL_LENGTH] {
    let mut bytes = [0u8; LABEL_LENGTH];
    for (slot, byte) in bytes.iter_mut().zip(text.bytes()) {
        *slot = byte;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(message_type: MessageType) -> ManagementHeader {
        ManagementHeader::new(NodeId(7), message_type, NodeName::new("Remote"), NodeType::Master)
    }

    #[test]
    fn test_time_packet_smpte_fields() {
        let packet = TimePacket {
            header: header(MessageType::Time),
            layer: Layer::LayerA,
            layer_state: 0,
            smpte_mode: 25,
            hours: 1,
            minutes: 2,
            seconds: 3,
            frames: 24,
            layer_time_ms: 0,
            total_time_ms: 0,
        };
        let tc = packet.timecode(TimeCodeType::Smpte).unwrap();
        assert_eq!(tc, TimeCode::new(1, 2, 3, 24, TimeCodeType::Ebu).unwrap());

        let bad_frames = TimePacket { frames: 25, ..packet };
        assert!(bad_frames.timecode(TimeCodeType::Smpte).is_err());

        let bad_mode = TimePacket { smpte_mode: 12, ..packet };
        assert!(matches!(bad_mode.timecode(TimeCodeType::Smpte), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_time_packet_without_smpte_uses_fallback() {
        let tc = TimeCode::new(0, 0, 2, 10, TimeCodeType::Film).unwrap();
        let mut packet = TimePacket::from_timecode(header(MessageType::Time), Layer::Layer1, &tc);
        assert_eq!(packet.smpte_mode, 24);

        packet.smpte_mode = 0;
        assert_eq!(packet.timecode(TimeCodeType::Film).unwrap(), tc);
        let ebu = packet.timecode(TimeCodeType::Ebu).unwrap();
        assert_eq!(ebu.tc_type(), TimeCodeType::Ebu);
        assert_eq!(ebu.seconds(), 2);
    }

    #[test]
    fn test_same_node() {
        let a = header(MessageType::OptIn);
        let mut b = header(MessageType::Time);
        assert!(a.is_same_node(&b));
        b.node_name = NodeName::new("Other");
        assert!(!a.is_same_node(&b));
    }

    #[test]
    fn test_label_truncates() {
        assert_eq!(&label("abc")[..4], b"abc\0");
        assert_eq!(label("0123456789abcdefXYZ"), *b"0123456789abcdef");
    }
}
