//! TCNet wire format
//!
//! This module defines the TCNet packets exchanged by the engine, their
//! explicit little-endian field codec, and the engine state machine.

pub mod codec;
pub mod message;
pub mod state;

pub use self::codec::{decode, encode, TcNetCodec};
pub use self::message::{ManagementHeader, Message, OptIn, OptOut, Request, TimePacket};
pub use self::state::EngineState;

/// Magic carried in every management header
pub const MAGIC: &[u8; 3] = b"TCN";

/// Size of the management header
pub const HEADER_SIZE: usize = 24;

/// Size of an opt-in packet
pub const OPT_IN_SIZE: usize = 68;

/// Size of an opt-out packet
pub const OPT_OUT_SIZE: usize = 28;

/// Size of a time packet
pub const TIME_SIZE: usize = 40;

/// Size of a request packet
pub const REQUEST_SIZE: usize = 26;

/// Width of the vendor and device name fields of an opt-in
pub const LABEL_LENGTH: usize = 16;

/// TCNet message type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    OptIn,
    OptOut,
    Status,
    TimeSync,
    Error,
    Request,
    ApplicationData,
    Control,
    Text,
    Keyboard,
    Data,
    File,
    Time,
    Unknown(u8),
}

impl MessageType {
    pub const fn code(self) -> u8 {
        match self {
            MessageType::OptIn => 2,
            MessageType::OptOut => 3,
            MessageType::Status => 5,
            MessageType::TimeSync => 10,
            MessageType::Error => 13,
            MessageType::Request => 20,
            MessageType::ApplicationData => 30,
            MessageType::Control => 101,
            MessageType::Text => 128,
            MessageType::Keyboard => 132,
            MessageType::Data => 200,
            MessageType::File => 204,
            MessageType::Time => 254,
            MessageType::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u8) -> MessageType {
        match code {
            2 => MessageType::OptIn,
            3 => MessageType::OptOut,
            5 => MessageType::Status,
            10 => MessageType::TimeSync,
            13 => MessageType::Error,
            20 => MessageType::Request,
            30 => MessageType::ApplicationData,
            101 => MessageType::Control,
            128 => MessageType::Text,
            132 => MessageType::Keyboard,
            200 => MessageType::Data,
            204 => MessageType::File,
            254 => MessageType::Time,
            other => MessageType::Unknown(other),
        }
    }
}
