//! Persisted parameter blocks with partial-field updates
//!
//! Every domain owns one fixed-size block. The first word of a block is the
//! set-list: a bitmask of fields that were explicitly written. A field is
//! addressed by a [`FieldDescriptor`] looked up from its name, so callers
//! never depend on the in-memory layout of a parameter struct.

mod memory;

pub use self::memory::{FileConfigStore, MemoryConfigStore};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Error, Result};
use crate::time::TimeCodeType;

/// Size of every parameter block in bytes
pub const BLOCK_SIZE: usize = 64;

/// Parameter block owners
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoreDomain {
    Network,
    ArtNet,
    DisplayUdf,
    RdmDevice,
    RemoteConfig,
    Ltc,
    TcNet,
}

/// Location of one field inside a parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub offset: usize,
    pub size: usize,
    /// Bit set in the block's set-list when the field is written
    pub mask: u32,
}

impl FieldDescriptor {
    pub const fn new(offset: usize, size: usize, mask: u32) -> Self {
        FieldDescriptor { offset, size, mask }
    }

    /// The set-list word itself
    pub const SET_LIST: FieldDescriptor = FieldDescriptor::new(0, 4, 0);

    /// Checks the descriptor against the block and the value length
    pub fn check(&self, len: usize) -> Result<std::ops::Range<usize>> {
        let end = self
            .offset
            .checked_add(self.size)
            .filter(|&end| end <= BLOCK_SIZE)
            .ok_or_else(|| Error::store(format!("Field {}+{} outside block", self.offset, self.size)))?;
        if len != self.size {
            return Err(Error::store(format!(
                "Field size {} does not match value size {}",
                self.size, len
            )));
        }
        Ok(self.offset..end)
    }
}

/// Configuration store capability
///
/// `update` writes exactly the bytes named by `field` and ORs its mask into
/// the block's set-list. Physical writes may be deferred by the store.
pub trait ConfigStore {
    fn update(&mut self, domain: StoreDomain, field: FieldDescriptor, value: &[u8]) -> Result<()>;

    fn read(&self, domain: StoreDomain, field: FieldDescriptor, out: &mut [u8]) -> Result<()>;

    /// Returns the block's set-list
    fn set_list(&self, domain: StoreDomain) -> Result<u32> {
        let mut word = [0u8; 4];
        self.read(domain, FieldDescriptor::SET_LIST, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }
}

/// Named fields of the LTC parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtcField {
    Source,
    TimeCodeType,
    DisabledOutputs,
    AutoStart,
}

impl LtcField {
    pub const fn descriptor(self) -> FieldDescriptor {
        match self {
            LtcField::Source => FieldDescriptor::new(4, 1, 1 << 0),
            LtcField::TimeCodeType => FieldDescriptor::new(5, 1, 1 << 1),
            LtcField::DisabledOutputs => FieldDescriptor::new(6, 2, 1 << 2),
            LtcField::AutoStart => FieldDescriptor::new(8, 1, 1 << 3),
        }
    }
}

/// Upstream timecode source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LtcSource {
    Ltc,
    ArtNet,
    Midi,
    TcNet,
    Internal,
    AppleMidi,
    Systime,
    Etc,
}

impl LtcSource {
    pub const fn code(self) -> u8 {
        match self {
            LtcSource::Ltc => 0,
            LtcSource::ArtNet => 1,
            LtcSource::Midi => 2,
            LtcSource::TcNet => 3,
            LtcSource::Internal => 4,
            LtcSource::AppleMidi => 5,
            LtcSource::Systime => 6,
            LtcSource::Etc => 7,
        }
    }

    pub const fn from_code(code: u8) -> Option<LtcSource> {
        match code {
            0 => Some(LtcSource::Ltc),
            1 => Some(LtcSource::ArtNet),
            2 => Some(LtcSource::Midi),
            3 => Some(LtcSource::TcNet),
            4 => Some(LtcSource::Internal),
            5 => Some(LtcSource::AppleMidi),
            6 => Some(LtcSource::Systime),
            7 => Some(LtcSource::Etc),
            _ => None,
        }
    }
}

impl fmt::Display for LtcSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LtcSource::Ltc => "LTC",
            LtcSource::ArtNet => "Art-Net",
            LtcSource::Midi => "MIDI",
            LtcSource::TcNet => "TCNet",
            LtcSource::Internal => "Internal",
            LtcSource::AppleMidi => "AppleMIDI",
            LtcSource::Systime => "System time",
            LtcSource::Etc => "ETC",
        };
        f.write_str(name)
    }
}

/// Field-level accessors for the LTC parameter block
pub struct LtcStore;

impl LtcStore {
    /// Persists the active source, touching only the source byte and its mask
    pub fn save_source<S: ConfigStore + ?Sized>(store: &mut S, source: LtcSource) -> Result<()> {
        debug!(%source, "Saving LTC source");
        store.update(StoreDomain::Ltc, LtcField::Source.descriptor(), &[source.code()])
    }

    /// Returns the persisted source, `None` when it was never written
    pub fn load_source<S: ConfigStore + ?Sized>(store: &S) -> Result<Option<LtcSource>> {
        let field = LtcField::Source.descriptor();
        if store.set_list(StoreDomain::Ltc)? & field.mask == 0 {
            return Ok(None);
        }

        let mut value = [0u8; 1];
        store.read(StoreDomain::Ltc, field, &mut value)?;
        Ok(LtcSource::from_code(value[0]))
    }

    pub fn save_timecode_type<S: ConfigStore + ?Sized>(store: &mut S, tc_type: TimeCodeType) -> Result<()> {
        store.update(StoreDomain::Ltc, LtcField::TimeCodeType.descriptor(), &[tc_type.index()])
    }

    pub fn load_timecode_type<S: ConfigStore + ?Sized>(store: &S) -> Result<Option<TimeCodeType>> {
        let field = LtcField::TimeCodeType.descriptor();
        if store.set_list(StoreDomain::Ltc)? & field.mask == 0 {
            return Ok(None);
        }

        let mut value = [0u8; 1];
        store.read(StoreDomain::Ltc, field, &mut value)?;
        Ok(TimeCodeType::from_index(value[0]))
    }
}
