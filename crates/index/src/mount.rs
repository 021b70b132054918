//! Mount resolution over a storage root
//!
//! A user owns the files below `storage_root/<user>/files`; their cache
//! entries live in a sled tree named after the user. A user exists exactly
//! when their home directory does — resolution never creates directories.

use crate::cache::FileCache;
use crate::updater::Updater;
use crate::IndexError;
use drift_core::{CacheUpdater, MountPoint, MountResolver};
use parking_lot::RwLock;
use sled::Db;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Owning unit for a single user's files
pub struct UserMount {
    user: String,
    updater: Arc<Updater>,
}

impl MountPoint for UserMount {
    /// Strip `<user>/files/` from a logical path
    ///
    /// Paths with fewer than two separators cannot address anything below
    /// the files namespace and resolve to `None`.
    fn internal_path(&self, logical_path: &str) -> Option<String> {
        let internal = logical_path
            .strip_prefix(self.user.as_str())?
            .strip_prefix("/files/")?;
        (!internal.is_empty()).then(|| internal.to_string())
    }

    fn updater(&self) -> Arc<dyn CacheUpdater> {
        Arc::clone(&self.updater) as Arc<dyn CacheUpdater>
    }
}

/// Resolves users to mounts backed by `storage_root/<user>/files`
pub struct MountManager {
    storage_root: PathBuf,
    db: Db,
    mounts: RwLock<HashMap<String, Arc<UserMount>>>,
}

impl MountManager {
    /// Open the cache database under `cache_dir`
    pub fn open(storage_root: impl Into<PathBuf>, cache_dir: &Path) -> Result<Self, IndexError> {
        let db = sled::open(cache_dir.join("index.db"))?;
        Ok(Self {
            storage_root: storage_root.into(),
            db,
            mounts: RwLock::new(HashMap::new()),
        })
    }
}

impl MountResolver for MountManager {
    fn resolve(&self, user: &str) -> Option<Arc<dyn MountPoint>> {
        if user.is_empty() || user.contains('/') {
            return None;
        }
        if let Some(mount) = self.mounts.read().get(user) {
            return Some(Arc::clone(mount) as Arc<dyn MountPoint>);
        }

        let home = self.storage_root.join(user);
        if !home.is_dir() {
            return None;
        }

        let tree = match self.db.open_tree(user) {
            Ok(tree) => tree,
            Err(err) => {
                warn!("failed to open cache tree for {user}: {err}");
                return None;
            }
        };

        debug!("mounting {user}");
        let cache = Arc::new(FileCache::new(tree));
        let mount = Arc::new(UserMount {
            user: user.to_string(),
            updater: Arc::new(Updater::new(home.join("files"), cache)),
        });
        self.mounts
            .write()
            .insert(user.to_string(), Arc::clone(&mount));
        Some(mount as Arc<dyn MountPoint>)
    }
}
