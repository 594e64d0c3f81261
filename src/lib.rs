//! TCNet/LTC: timecode distribution for show-control nodes
//!
//! This library implements a TCNet node that discovers peers and accepts
//! layer timecode, the SMPTE timecode model shared with an LTC decoder, a
//! persisted upstream-source selection, and a reader that bridges network
//! timecode to MIDI timecode outputs. Everything runs from a single
//! cooperative poll loop over non-blocking sockets.
pub mod core;
pub mod network;
pub mod protocol;
pub mod store;
pub mod sync;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
