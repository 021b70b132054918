//! Disk-stat based cache mutations
//!
//! The updater is the mutation capability handed to the dispatcher for one
//! mount. `update` records what is actually on disk below the mount's files
//! root; notifications carry no authoritative metadata, so disk is the
//! source of truth.

use crate::cache::FileCache;
use crate::entry::CacheEntry;
use crate::IndexError;
use drift_core::{CacheUpdater, UpdateError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Mutation capability for one user mount
pub struct Updater {
    files_root: PathBuf,
    cache: Arc<FileCache>,
}

impl Updater {
    pub fn new(files_root: impl Into<PathBuf>, cache: Arc<FileCache>) -> Self {
        Self {
            files_root: files_root.into(),
            cache,
        }
    }

    /// Re-stat the parent directory entry after a child mutation
    fn refresh_parent(&self, internal_path: &str) -> Result<(), IndexError> {
        let Some((parent, _)) = internal_path.rsplit_once('/') else {
            return Ok(());
        };
        if self.cache.get(parent)?.is_some() {
            if let Ok(meta) = std::fs::metadata(self.files_root.join(parent)) {
                self.cache.put(parent, &CacheEntry::from_metadata(&meta))?;
            }
        }
        Ok(())
    }

    fn stage_rename(&self, source: &str, target: &str) -> Result<(), IndexError> {
        self.cache.rename_subtree(source, target)?;
        // refresh the moved entry from disk when the target is visible
        if let Ok(meta) = std::fs::metadata(self.files_root.join(target)) {
            self.cache.put(target, &CacheEntry::from_metadata(&meta))?;
        }
        Ok(())
    }
}

impl CacheUpdater for Updater {
    fn update(&self, internal_path: &str) -> Result<(), UpdateError> {
        match std::fs::metadata(self.files_root.join(internal_path)) {
            Ok(meta) => {
                self.cache
                    .put(internal_path, &CacheEntry::from_metadata(&meta))
                    .map_err(UpdateError::from)?;
            }
            Err(err) => {
                // the file raced away between notification and apply
                debug!("stat failed for {internal_path}: {err}, clearing entry");
                self.cache
                    .remove_subtree(internal_path)
                    .map_err(UpdateError::from)?;
            }
        }
        self.refresh_parent(internal_path).map_err(UpdateError::from)
    }

    fn remove(&self, internal_path: &str) -> Result<(), UpdateError> {
        self.cache
            .remove_subtree(internal_path)
            .map_err(UpdateError::from)?;
        self.refresh_parent(internal_path).map_err(UpdateError::from)
    }

    fn rename_from_storage(&self, source: &str, target: &str) -> Result<(), UpdateError> {
        self.cache.begin();
        match self.stage_rename(source, target) {
            Ok(()) => self.cache.commit().map_err(UpdateError::from),
            Err(err) => {
                self.cache.rollback();
                Err(err.into())
            }
        }
    }

    fn has_open_transaction(&self) -> bool {
        self.cache.has_open_transaction()
    }

    fn rollback(&self) -> Result<(), UpdateError> {
        self.cache.rollback();
        Ok(())
    }
}
