//! Cache entry records

use crate::IndexError;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// Metadata stored per indexed path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub size: u64,
    pub mtime_ms: u64,
    pub is_dir: bool,
}

impl CacheEntry {
    /// Build an entry from what is actually on disk
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);

        Self {
            size: meta.len(),
            mtime_ms,
            is_dir: meta.is_dir(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn encode_decode_round_trip() {
        let entry = CacheEntry {
            size: 1024,
            mtime_ms: 1_557_759_515_000,
            is_dir: false,
        };
        let decoded = CacheEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn from_metadata_reflects_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        fs::write(&file, b"hello").unwrap();

        let entry = CacheEntry::from_metadata(&fs::metadata(&file).unwrap());
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);
        assert!(entry.mtime_ms > 0);

        let dir_entry = CacheEntry::from_metadata(&fs::metadata(dir.path()).unwrap());
        assert!(dir_entry.is_dir);
    }
}
