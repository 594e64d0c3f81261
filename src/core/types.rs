use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::TimeCodeType;

/// Logical TCNet channel a node contributes to or listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Layer1,
    Layer2,
    Layer3,
    Layer4,
    LayerA,
    LayerB,
    LayerM,
    LayerC,
    Undefined,
}

impl Layer {
    /// All defined layers in wire order
    pub const ALL: [Layer; 8] = [
        Layer::Layer1,
        Layer::Layer2,
        Layer::Layer3,
        Layer::Layer4,
        Layer::LayerA,
        Layer::LayerB,
        Layer::LayerM,
        Layer::LayerC,
    ];

    /// Returns the printable character for this layer
    ///
    /// `Undefined` renders as `'S'`, the SMPTE selection of the configuration UI.
    pub const fn name(self) -> char {
        match self {
            Layer::Layer1 => '1',
            Layer::Layer2 => '2',
            Layer::Layer3 => '3',
            Layer::Layer4 => '4',
            Layer::LayerA => 'A',
            Layer::LayerB => 'B',
            Layer::LayerM => 'M',
            Layer::LayerC => 'C',
            Layer::Undefined => 'S',
        }
    }

    /// Maps a character back to a layer; anything unrecognised is `Undefined`
    pub const fn from_char(c: char) -> Layer {
        match c {
            '1' => Layer::Layer1,
            '2' => Layer::Layer2,
            '3' => Layer::Layer3,
            '4' => Layer::Layer4,
            'A' | 'a' => Layer::LayerA,
            'B' | 'b' => Layer::LayerB,
            'M' | 'm' => Layer::LayerM,
            'C' | 'c' => Layer::LayerC,
            _ => Layer::Undefined,
        }
    }

    /// Wire form of the layer: its character as a single byte
    pub const fn to_byte(self) -> u8 {
        self.name() as u8
    }

    /// Decodes the wire byte; non-ASCII bytes are `Undefined`
    pub const fn from_byte(byte: u8) -> Layer {
        if byte.is_ascii() {
            Layer::from_char(byte as char)
        } else {
            Layer::Undefined
        }
    }
}

impl Default for Layer {
    fn default() -> Self {
        Layer::LayerM
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Role a node announces in its management header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Auto,
    Master,
    Slave,
    Repeater,
    Undefined,
}

impl NodeType {
    /// Returns the wire code
    pub const fn code(self) -> u8 {
        match self {
            NodeType::Auto => 1,
            NodeType::Master => 2,
            NodeType::Slave => 4,
            NodeType::Repeater => 8,
            NodeType::Undefined => 0,
        }
    }

    /// Decodes a wire code, unknown codes are `Undefined`
    pub const fn from_code(code: u8) -> NodeType {
        match code {
            1 => NodeType::Auto,
            2 => NodeType::Master,
            4 => NodeType::Slave,
            8 => NodeType::Repeater,
            _ => NodeType::Undefined,
        }
    }
}

impl Default for NodeType {
    fn default() -> Self {
        NodeType::Slave
    }
}

/// Width of the node name field on the wire
pub const NODE_NAME_LENGTH: usize = 8;

/// Fixed-width, zero padded node name
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeName([u8; NODE_NAME_LENGTH]);

impl NodeName {
    /// Creates a name from text, truncating to the wire width
    ///
    /// Non-ASCII characters are replaced by `'?'` so the name stays printable.
    pub fn new(text: &str) -> Self {
        let mut bytes = [0u8; NODE_NAME_LENGTH];
        for (slot, c) in bytes.iter_mut().zip(text.chars()) {
            *slot = if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' };
        }
        NodeName(bytes)
    }

    /// Takes the raw wire bytes as-is
    pub const fn from_bytes(bytes: [u8; NODE_NAME_LENGTH]) -> Self {
        NodeName(bytes)
    }

    /// Returns the raw zero padded bytes
    pub const fn as_bytes(&self) -> &[u8; NODE_NAME_LENGTH] {
        &self.0
    }

    /// Returns the name up to the first padding byte
    pub fn as_str(&self) -> &str {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0 || b == b' ')
            .unwrap_or(NODE_NAME_LENGTH);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Debug for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeName({:?})", self.as_str())
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node identifier carried in every management header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Generates a new random node ID
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        NodeId(rng.gen_range(1..=u16::MAX))
    }
}

/// Configuration for the TCNet engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name announced in the management header
    #[serde(serialize_with = "super::serde::serialize_node_name")]
    #[serde(deserialize_with = "super::serde::deserialize_node_name")]
    pub node_name: NodeName,
    /// Role announced in the management header
    pub node_type: NodeType,
    /// Layer of interest for time messages
    pub layer: Layer,
    /// Frame rate applied when a time message carries no SMPTE mode
    pub timecode_type: TimeCodeType,
    /// Accept time messages at all
    pub use_timecode: bool,
    /// Destination of broadcast packets
    pub broadcast_addr: IpAddr,
    /// Interval between opt-in announcements
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub announce_interval: Duration,
    /// Peers silent for this long are dropped
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub peer_timeout: Duration,
    /// Maximum number of observed peers kept
    pub max_peers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            node_name: NodeName::new(super::DEFAULT_NODE_NAME),
            node_type: NodeType::Slave,
            layer: Layer::LayerM,
            timecode_type: TimeCodeType::Smpte,
            use_timecode: true,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            announce_interval: Duration::from_millis(super::ANNOUNCE_INTERVAL_MS as u64),
            peer_timeout: Duration::from_secs(5),
            max_peers: 32,
        }
    }
}

/// Configuration for the reader's query/command endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// UDP port answering timecode queries
    pub port: u16,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig { port: super::READER_PORT }
    }
}

/// Complete node configuration as loaded at start-up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub engine: EngineConfig,
    pub reader: ReaderConfig,
}

impl NodeConfig {
    /// Parses a JSON configuration document; missing keys take defaults
    pub fn from_json(text: &str) -> super::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| super::Error::config(format!("Invalid node configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_name_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_char(layer.name()), layer);
        }
        assert_eq!(Layer::from_char(Layer::Undefined.name()), Layer::Undefined);
    }

    #[test]
    fn test_layer_unknown_characters() {
        for c in ['0', '5', 'S', 'x', ' ', '\0', 'é'] {
            assert_eq!(Layer::from_char(c), Layer::Undefined, "char {:?}", c);
        }
        assert_eq!(Layer::from_char('m'), Layer::LayerM);
        assert_eq!(Layer::from_byte(0xC3), Layer::Undefined);
    }

    #[test]
    fn test_node_type_codes() {
        for node_type in [NodeType::Auto, NodeType::Master, NodeType::Slave, NodeType::Repeater] {
            assert_eq!(NodeType::from_code(node_type.code()), node_type);
        }
        assert_eq!(NodeType::from_code(3), NodeType::Undefined);
    }

    #[test]
    fn test_node_name_padding() {
        let name = NodeName::new("AvV");
        assert_eq!(name.as_bytes(), b"AvV\0\0\0\0\0");
        assert_eq!(name.as_str(), "AvV");

        let long = NodeName::new("0123456789");
        assert_eq!(long.as_str(), "01234567");

        let spaced = NodeName::from_bytes(*b"LTC     ");
        assert_eq!(spaced.to_string(), "LTC");
    }

    #[test]
    fn test_node_id_random() {
        let id = NodeId::random();
        assert_ne!(id.0, 0);
    }

    #[test]
    fn test_node_config_defaults() {
        let config = NodeConfig::from_json(r#"{"engine":{"layer":"LayerA","announce_interval":250}}"#)
            .unwrap();
        assert_eq!(config.engine.layer, Layer::LayerA);
        assert_eq!(config.engine.announce_interval, Duration::from_millis(250));
        assert_eq!(config.engine.node_type, NodeType::Slave);
        assert_eq!(config.reader.port, super::super::READER_PORT);

        assert!(NodeConfig::from_json("{").is_err());
    }
}
