//! Core types and traits for the TCNet/LTC core
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    EngineConfig,
    Layer,
    NodeConfig,
    NodeId,
    NodeName,
    NodeType,
    ReaderConfig,
    NODE_NAME_LENGTH,
};

/// TCNet protocol version announced in every header
pub const PROTOCOL_VERSION_MAJOR: u8 = 3;
pub const PROTOCOL_VERSION_MINOR: u8 = 3;

/// Broadcast port for management and opt-in packets
pub const PORT_MANAGEMENT: u16 = 60000;

/// Broadcast port for time messages
pub const PORT_TIME: u16 = 60001;

/// Broadcast port for request/reply traffic
pub const PORT_DATA: u16 = 60002;

/// Unicast port for direct peer queries
pub const PORT_UNICAST: u16 = 65023;

/// Port answering timecode queries and configuration commands
pub const READER_PORT: u16 = 2762;

/// Maximum datagram size handled by any endpoint
pub const MAX_PACKET_SIZE: usize = 512;

/// Default interval between opt-in announcements
pub const ANNOUNCE_INTERVAL_MS: u32 = 1000;

/// Name announced when none is configured
pub const DEFAULT_NODE_NAME: &str = "LTCNode";

/// Vendor and device strings carried in the opt-in body
pub const VENDOR_NAME: &str = "tcnet-ltc";
pub const DEVICE_NAME: &str = "LTC SMPTE Node";
