//! Change application
//!
//! Maps decoded changes onto index mutations: the leading identity segment
//! of the logical path resolves the owning mount, the remainder becomes the
//! mount's internal path, and the change kind selects the mutation. After
//! every apply — mutation, no-op or failure past mount resolution — the
//! dispatcher probes for a transaction the mutation path left open and
//! forces a rollback so it cannot leak into the next event.

use crate::change::{Change, ChangeKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Mutation failure inside the index cache
#[derive(Debug, Error)]
#[error("index mutation failed: {message}")]
pub struct UpdateError {
    message: String,
}

impl UpdateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-mount mutation capability of the persistent file index
pub trait CacheUpdater {
    fn update(&self, internal_path: &str) -> Result<(), UpdateError>;
    fn remove(&self, internal_path: &str) -> Result<(), UpdateError>;
    fn rename_from_storage(&self, source: &str, target: &str) -> Result<(), UpdateError>;

    /// Whether a transaction begun by a mutation is still open
    fn has_open_transaction(&self) -> bool;
    /// Discard an open transaction
    fn rollback(&self) -> Result<(), UpdateError>;
}

/// A resolved owning unit for one user's logical paths
pub trait MountPoint {
    /// Map a logical path to the mount's internal path
    ///
    /// `None` when the path carries too few segments to address anything
    /// below the mount's files namespace.
    fn internal_path(&self, logical_path: &str) -> Option<String>;

    fn updater(&self) -> Arc<dyn CacheUpdater>;
}

/// Resolves the identity segment of a logical path to its owning mount
pub trait MountResolver {
    fn resolve(&self, user: &str) -> Option<Arc<dyn MountPoint>>;
}

/// Failure applying a change
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown user {0}")]
    UnknownOwner(String),
    #[error("path {0} cannot be mapped into its mount")]
    UnresolvedPath(String),
    #[error("rename target {target} is not under the same mount as {src}")]
    CrossMountRename { src: String, target: String },
    #[error(transparent)]
    Update(#[from] UpdateError),
}

/// Applies decoded changes to the file index
pub struct ChangeDispatcher<R> {
    mounts: R,
}

impl<R: MountResolver> ChangeDispatcher<R> {
    pub fn new(mounts: R) -> Self {
        Self { mounts }
    }

    /// Apply one change to the index
    ///
    /// Nothing is mutated when the owner cannot be resolved.
    pub fn apply(&self, change: &Change) -> Result<(), DispatchError> {
        let user = owner_segment(&change.path);
        let mount = self
            .mounts
            .resolve(user)
            .ok_or_else(|| DispatchError::UnknownOwner(user.to_string()))?;
        let updater = mount.updater();

        let result = dispatch(change, user, mount.as_ref(), updater.as_ref());

        // A transaction still open here is a bug signal from the mutation
        // path; roll it back so it cannot taint the next event.
        if updater.has_open_transaction() {
            warn!(
                "dangling transaction after applying change to {}, rolling back",
                change.path
            );
            if let Err(err) = updater.rollback() {
                warn!("rollback failed: {err}");
            }
        }

        result
    }
}

fn dispatch(
    change: &Change,
    user: &str,
    mount: &dyn MountPoint,
    updater: &dyn CacheUpdater,
) -> Result<(), DispatchError> {
    let internal = mount
        .internal_path(&change.path)
        .ok_or_else(|| DispatchError::UnresolvedPath(change.path.clone()))?;

    match change.kind {
        ChangeKind::Added | ChangeKind::Modified => updater.update(&internal)?,
        ChangeKind::Removed => updater.remove(&internal)?,
        ChangeKind::Renamed => {
            let Some(target) = change.target.as_deref() else {
                // unreachable through the decoder; skip rather than crash
                warn!("rename change for {} has no target, skipping", change.path);
                return Ok(());
            };
            if owner_segment(target) != user {
                return Err(DispatchError::CrossMountRename {
                    src: change.path.clone(),
                    target: target.to_string(),
                });
            }
            let target_internal = mount
                .internal_path(target)
                .ok_or_else(|| DispatchError::UnresolvedPath(target.to_string()))?;
            updater.rename_from_storage(&internal, &target_internal)?;
        }
    }

    Ok(())
}

/// Leading identity segment of a logical path
fn owner_segment(path: &str) -> &str {
    match path.split_once('/') {
        Some((user, _)) => user,
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingUpdater {
        ops: Mutex<Vec<String>>,
        leak_transaction: AtomicBool,
        open: AtomicBool,
    }

    impl RecordingUpdater {
        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl CacheUpdater for RecordingUpdater {
        fn update(&self, internal_path: &str) -> Result<(), UpdateError> {
            if self.leak_transaction.load(Ordering::SeqCst) {
                self.open.store(true, Ordering::SeqCst);
            }
            self.ops.lock().unwrap().push(format!("update {internal_path}"));
            Ok(())
        }

        fn remove(&self, internal_path: &str) -> Result<(), UpdateError> {
            self.ops.lock().unwrap().push(format!("remove {internal_path}"));
            Ok(())
        }

        fn rename_from_storage(&self, source: &str, target: &str) -> Result<(), UpdateError> {
            self.ops
                .lock()
                .unwrap()
                .push(format!("rename {source} -> {target}"));
            Ok(())
        }

        fn has_open_transaction(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn rollback(&self) -> Result<(), UpdateError> {
            self.open.store(false, Ordering::SeqCst);
            self.ops.lock().unwrap().push("rollback".to_string());
            Ok(())
        }
    }

    struct FakeMount {
        user: String,
        updater: Arc<RecordingUpdater>,
    }

    impl MountPoint for FakeMount {
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

    struct FakeMounts {
        mounts: HashMap<String, Arc<FakeMount>>,
    }

    impl FakeMounts {
        fn with_user(user: &str) -> (Self, Arc<RecordingUpdater>) {
            let updater = Arc::new(RecordingUpdater::default());
            let mount = Arc::new(FakeMount {
                user: user.to_string(),
                updater: Arc::clone(&updater),
            });
            let mut mounts = HashMap::new();
            mounts.insert(user.to_string(), mount);
            (Self { mounts }, updater)
        }
    }

    impl MountResolver for FakeMounts {
        fn resolve(&self, user: &str) -> Option<Arc<dyn MountPoint>> {
            self.mounts
                .get(user)
                .map(|mount| Arc::clone(mount) as Arc<dyn MountPoint>)
        }
    }

    #[test]
    fn modify_updates_internal_path() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        dispatcher
            .apply(&Change::new(ChangeKind::Modified, "u1/files/docs/report.txt"))
            .unwrap();
        assert_eq!(updater.ops(), vec!["update docs/report.txt"]);
    }

    #[test]
    fn added_takes_the_update_path() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        dispatcher
            .apply(&Change::new(ChangeKind::Added, "u1/files/new.txt"))
            .unwrap();
        assert_eq!(updater.ops(), vec!["update new.txt"]);
    }

    #[test]
    fn removed_for_absent_entry_is_not_an_error() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        dispatcher
            .apply(&Change::new(ChangeKind::Removed, "u1/files/never-indexed"))
            .unwrap();
        assert_eq!(updater.ops(), vec!["remove never-indexed"]);
    }

    #[test]
    fn rename_maps_both_internal_paths() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        dispatcher
            .apply(&Change::renamed("u1/files/a", "u1/files/b", None))
            .unwrap();
        assert_eq!(updater.ops(), vec!["rename a -> b"]);
    }

    #[test]
    fn unknown_user_fails_without_mutating() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        let err = dispatcher
            .apply(&Change::new(ChangeKind::Modified, "nobody/files/x"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownOwner(user) if user == "nobody"));
        assert!(updater.ops().is_empty());
    }

    #[test]
    fn short_path_cannot_be_mapped() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        let err = dispatcher
            .apply(&Change::new(ChangeKind::Modified, "u1"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnresolvedPath(_)));
        assert!(updater.ops().is_empty());
    }

    #[test]
    fn cross_mount_rename_is_rejected() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        let err = dispatcher
            .apply(&Change::renamed("u1/files/a", "u2/files/b", None))
            .unwrap_err();
        assert!(matches!(err, DispatchError::CrossMountRename { .. }));
        assert!(updater.ops().is_empty());
    }

    #[test]
    fn rename_without_target_is_a_noop() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        let dispatcher = ChangeDispatcher::new(mounts);
        let mut change = Change::new(ChangeKind::Renamed, "u1/files/a");
        change.target = None;
        dispatcher.apply(&change).unwrap();
        assert!(updater.ops().is_empty());
    }

    #[test]
    fn dangling_transaction_is_rolled_back() {
        let (mounts, updater) = FakeMounts::with_user("u1");
        updater.leak_transaction.store(true, Ordering::SeqCst);
        let dispatcher = ChangeDispatcher::new(mounts);
        dispatcher
            .apply(&Change::new(ChangeKind::Modified, "u1/files/x"))
            .unwrap();
        assert_eq!(updater.ops(), vec!["update x", "rollback"]);
        assert!(!updater.has_open_transaction());
    }
}
