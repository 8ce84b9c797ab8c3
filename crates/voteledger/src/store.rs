//! Persistence behind the ledger.
//!
//! The ledger only ever sees [`ChainStore`]; the JSON file layout and the
//! in-memory store used by tests live here.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::block::Block;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no chain stored under key {0}")]
    NotFound(String),

    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub trait ChainStore {
    /// Returns the blocks saved under `key`, in chain order.
    fn load(&self, key: &str) -> Result<Vec<Block>, StoreError>;

    /// Replaces whatever is saved under `key` with `blocks`.
    fn save(&self, key: &str, blocks: &[Block]) -> Result<(), StoreError>;
}

/// Accepts both a bare list of blocks and the `{"chain": [...]}` wrapper.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredChain {
    Plain(Vec<Block>),
    Wrapped { chain: Vec<Block> },
}

impl From<StoredChain> for Vec<Block> {
    fn from(stored: StoredChain) -> Self {
        match stored {
            StoredChain::Plain(blocks) => blocks,
            StoredChain::Wrapped { chain } => chain,
        }
    }
}

pub fn chain_from_json(text: &str) -> Result<Vec<Block>, StoreError> {
    let stored: StoredChain = serde_json::from_str(text)?;
    Ok(stored.into())
}

pub fn chain_to_json(blocks: &[Block]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(blocks)?)
}

/// Reads a JSON document, `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse {}; error = {}", path.display(), e);
            e
        })?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            error!("Failed to read {}; error = {}", path.display(), e);
            Err(e.into())
        }
    }
}

/// Writes a JSON document next to `path` and renames it into place.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents.as_bytes())?;
    fs::rename(&tmp, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// One pretty-printed `<key>.json` file per chain inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Vec<Block>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => chain_from_json(&text).map_err(|e| {
                error!("Failed to parse chain at {}; error = {}", path.display(), e);
                e
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(key.into())),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, blocks: &[Block]) -> Result<(), StoreError> {
        write_json(&self.path_for(key), blocks)
    }
}

/// Keeps chains in process memory. Clones share the same storage, so a test
/// can hand one clone to a ledger and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    chains: Arc<Mutex<HashMap<String, Vec<Block>>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `save` fail with an I/O error until switched off.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self, key: &str) -> Option<Vec<Block>> {
        self.chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl ChainStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Vec<Block>, StoreError> {
        self.saved(key)
            .ok_or_else(|| StoreError::NotFound(key.into()))
    }

    fn save(&self, key: &str, blocks: &[Block]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected save failure").into());
        }
        self.chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), blocks.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::block::BlockTemplate;
    use crate::miner::Miner;

    fn scratch_dir(name: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("voteledger_{}_{}", name, unique))
    }

    fn genesis() -> Block {
        Miner::new(1).mine(BlockTemplate::genesis(1_700_000_000_000)).unwrap()
    }

    #[test]
    fn test_json_file_store_round_trip() {
        let dir = scratch_dir("store");
        let store = JsonFileStore::new(&dir);
        assert!(matches!(store.load("chain"), Err(StoreError::NotFound(_))));

        let blocks = vec![genesis()];
        store.save("chain", &blocks).unwrap();
        assert_eq!(store.load("chain").unwrap(), blocks);
        assert!(!store.path_for("chain").with_extension("json.tmp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = scratch_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        let store = JsonFileStore::new(&dir);
        fs::write(store.path_for("chain"), "{not json").unwrap();
        assert!(matches!(store.load("chain"), Err(StoreError::Corrupt(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wrapped_chain_is_accepted() {
        let blocks = vec![genesis()];
        let wrapped = format!("{{\"chain\": {}}}", chain_to_json(&blocks).unwrap());
        assert_eq!(chain_from_json(&wrapped).unwrap(), blocks);
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        let blocks = vec![genesis()];
        store.fail_saves(true);
        assert!(matches!(store.save("k", &blocks), Err(StoreError::Io(_))));
        assert!(store.saved("k").is_none());
        store.fail_saves(false);
        store.save("k", &blocks).unwrap();
        assert_eq!(store.load("k").unwrap(), blocks);
    }

    #[test]
    fn test_read_json_missing_file() {
        let missing: Option<Vec<String>> =
            read_json(&scratch_dir("missing").join("x.json")).unwrap();
        assert!(missing.is_none());
    }
}
