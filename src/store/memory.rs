use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::{Error, Result};
use super::{ConfigStore, FieldDescriptor, StoreDomain, BLOCK_SIZE};

/// RAM-backed store with deferred, one-block-per-call commits
///
/// `update` only touches the working copy and marks the block dirty;
/// `flush` commits one dirty block per call, like a flash controller that
/// erases and programs a single sector per poll step.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blocks: BTreeMap<StoreDomain, Vec<u8>>,
    committed: BTreeMap<StoreDomain, Vec<u8>>,
    dirty: BTreeSet<StoreDomain>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_blocks(blocks: BTreeMap<StoreDomain, Vec<u8>>) -> Self {
        MemoryConfigStore {
            committed: blocks.clone(),
            blocks,
            dirty: BTreeSet::new(),
        }
    }

    /// Working copy of a block
    pub fn block(&self, domain: StoreDomain) -> Option<&[u8]> {
        self.blocks.get(&domain).map(Vec::as_slice)
    }

    /// Last committed copy of a block
    pub fn committed_block(&self, domain: StoreDomain) -> Option<&[u8]> {
        self.committed.get(&domain).map(Vec::as_slice)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Commits one dirty block; returns true while more work is pending
    pub fn flush(&mut self) -> bool {
        if let Some(domain) = self.dirty.pop_first() {
            if let Some(block) = self.blocks.get(&domain) {
                debug!(?domain, "Committing parameter block");
                self.committed.insert(domain, block.clone());
            }
        }
        self.is_dirty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn update(&mut self, domain: StoreDomain, field: FieldDescriptor, value: &[u8]) -> Result<()> {
        let range = field.check(value.len())?;
        let block = self.blocks.entry(domain).or_insert_with(|| vec![0u8; BLOCK_SIZE]);

        if block[range.clone()] == *value && set_list(block) & field.mask == field.mask {
            return Ok(());
        }

        block[range].copy_from_slice(value);
        let list = set_list(block) | field.mask;
        block[..4].copy_from_slice(&list.to_le_bytes());
        self.dirty.insert(domain);
        Ok(())
    }

    fn read(&self, domain: StoreDomain, field: FieldDescriptor, out: &mut [u8]) -> Result<()> {
        let range = field.check(out.len())?;
        match self.blocks.get(&domain) {
            Some(block) => out.copy_from_slice(&block[range]),
            None => out.fill(0),
        }
        Ok(())
    }
}

fn set_list(block: &[u8]) -> u32 {
    u32::from_le_bytes([block[0], block[1], block[2], block[3]])
}

/// File-backed store; committed blocks are written with bincode
#[derive(Debug)]
pub struct FileConfigStore {
    inner: MemoryConfigStore,
    path: PathBuf,
}

impl FileConfigStore {
    /// Opens the store, loading previously flushed blocks if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let blocks = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let blocks: BTreeMap<StoreDomain, Vec<u8>> = bincode::deserialize_from(reader)
                .map_err(|e| Error::store(format!("Failed to load {}: {}", path.display(), e)))?;
            if let Some((domain, block)) = blocks.iter().find(|(_, block)| block.len() != BLOCK_SIZE) {
                return Err(Error::store(format!(
                    "Block {:?} has {} bytes, expected {}",
                    domain,
                    block.len(),
                    BLOCK_SIZE
                )));
            }
            info!(path = %path.display(), blocks = blocks.len(), "Loaded parameter store");
            blocks
        } else {
            BTreeMap::new()
        };

        Ok(FileConfigStore {
            inner: MemoryConfigStore::with_blocks(blocks),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    /// Commits one dirty block and rewrites the file once nothing is left
    ///
    /// The last block stays dirty until the file is written, so a failed
    /// write is retried by the next call.
    pub fn flush(&mut self) -> Result<bool> {
        let Some(&last) = self.inner.dirty.first() else {
            return Ok(false);
        };
        if self.inner.dirty.len() > 1 {
            return Ok(self.inner.flush());
        }

        let mut blocks = self.inner.committed.clone();
        if let Some(block) = self.inner.blocks.get(&last) {
            blocks.insert(last, block.clone());
        }
        self.write(&blocks)?;
        Ok(self.inner.flush())
    }

    fn write(&self, blocks: &BTreeMap<StoreDomain, Vec<u8>>) -> Result<()> {
        let writer = BufWriter::new(File::create(&self.path)?);
        bincode::serialize_into(writer, blocks)
            .map_err(|e| Error::store(format!("Failed to write {}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Parameter store written");
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn update(&mut self, domain: StoreDomain, field: FieldDescriptor, value: &[u8]) -> Result<()> {
        self.inner.update(domain, field, value)
    }

    fn read(&self, domain: StoreDomain, field: FieldDescriptor, out: &mut [u8]) -> Result<()> {
        self.inner.read(domain, field, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LtcField, LtcSource, LtcStore};

    #[test]
    fn test_flush_commits_one_block_per_call() {
        let mut store = MemoryConfigStore::new();
        LtcStore::save_source(&mut store, LtcSource::Midi).unwrap();
        store
            .update(StoreDomain::TcNet, FieldDescriptor::new(4, 1, 1), &[7])
            .unwrap();

        assert!(store.committed_block(StoreDomain::Ltc).is_none());
        assert!(store.flush());
        assert!(!store.flush());
        assert!(!store.is_dirty());
        assert_eq!(store.committed_block(StoreDomain::Ltc), store.block(StoreDomain::Ltc));
        assert_eq!(store.committed_block(StoreDomain::TcNet).unwrap()[4], 7);
    }

    #[test]
    fn test_unchanged_value_does_not_dirty() {
        let mut store = MemoryConfigStore::new();
        LtcStore::save_source(&mut store, LtcSource::Ltc).unwrap();
        while store.flush() {}

        LtcStore::save_source(&mut store, LtcSource::Ltc).unwrap();
        assert!(!store.is_dirty());
        LtcStore::save_source(&mut store, LtcSource::Internal).unwrap();
        assert!(store.is_dirty());
    }

    #[test]
    fn test_read_unwritten_block_is_zero() {
        let store = MemoryConfigStore::new();
        let mut out = [0xFFu8; 2];
        store
            .read(StoreDomain::Ltc, LtcField::DisabledOutputs.descriptor(), &mut out)
            .unwrap();
        assert_eq!(out, [0, 0]);
        assert!(store
            .read(StoreDomain::Ltc, LtcField::DisabledOutputs.descriptor(), &mut [0u8; 1])
            .is_err());
    }

    #[test]
    fn test_file_store_reloads_flushed_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.bin");

        let mut store = FileConfigStore::open(&path).unwrap();
        LtcStore::save_source(&mut store, LtcSource::TcNet).unwrap();
        assert!(!store.flush().unwrap());
        assert!(path.exists());

        let reopened = FileConfigStore::open(&path).unwrap();
        assert_eq!(LtcStore::load_source(&reopened).unwrap(), Some(LtcSource::TcNet));
    }

    #[test]
    fn test_file_store_keeps_unflushed_changes_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.bin");

        let mut store = FileConfigStore::open(&path).unwrap();
        LtcStore::save_source(&mut store, LtcSource::Systime).unwrap();
        while store.flush().unwrap() {}
        LtcStore::save_source(&mut store, LtcSource::ArtNet).unwrap();

        let reopened = FileConfigStore::open(&path).unwrap();
        assert_eq!(LtcStore::load_source(&reopened).unwrap(), Some(LtcSource::Systime));
    }

    #[test]
    fn test_file_store_retries_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("missing_dir");
        let path = parent.join("params.bin");

        let mut store = FileConfigStore::open(&path).unwrap();
        LtcStore::save_source(&mut store, LtcSource::TcNet).unwrap();
        assert!(store.flush().is_err());
        assert!(store.is_dirty());

        std::fs::create_dir(&parent).unwrap();
        assert!(!store.flush().unwrap());
        assert!(!store.is_dirty());
        assert!(path.exists());

        let reopened = FileConfigStore::open(&path).unwrap();
        assert_eq!(LtcStore::load_source(&reopened).unwrap(), Some(LtcSource::TcNet));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.bin");
        std::fs::write(&path, [0xFFu8; 3]).unwrap();
        assert!(FileConfigStore::open(&path).is_err());
    }
}
