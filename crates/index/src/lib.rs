//! Persistent file index cache for drift
//!
//! This crate provides:
//! - sled-backed per-user cache trees ([`FileCache`])
//! - mount resolution over a storage root ([`MountManager`])
//! - disk-stat based mutations implementing the core updater capability
//!   ([`Updater`])

pub mod cache;
pub mod entry;
pub mod mount;
pub mod updater;

// Re-exports
pub use cache::FileCache;
pub use entry::CacheEntry;
pub use mount::{MountManager, UserMount};
pub use updater::Updater;

use drift_core::UpdateError;
use thiserror::Error;

/// Failure inside the index cache
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cache database error: {0}")]
    Db(#[from] sled::Error),
    #[error("cache entry encoding error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IndexError> for UpdateError {
    fn from(err: IndexError) -> Self {
        UpdateError::new(err.to_string())
    }
}
