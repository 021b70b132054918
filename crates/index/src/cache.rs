//! sled-backed cache tree with staged-write transactions
//!
//! One `FileCache` wraps one sled tree; keys are internal paths, values are
//! bincode-encoded [`CacheEntry`] records. Writes normally land directly.
//! Between [`begin`](FileCache::begin) and [`commit`](FileCache::commit)
//! they are staged into a batch instead, so a failed multi-key mutation can
//! be discarded as a unit. Reads always see the committed state.

use crate::entry::CacheEntry;
use crate::IndexError;
use parking_lot::Mutex;
use sled::{Batch, IVec, Tree};

/// Per-mount file cache
pub struct FileCache {
    tree: Tree,
    staged: Mutex<Option<Batch>>,
}

impl FileCache {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            staged: Mutex::new(None),
        }
    }

    pub fn get(&self, path: &str) -> Result<Option<CacheEntry>, IndexError> {
        match self.tree.get(path.as_bytes())? {
            Some(value) => Ok(Some(CacheEntry::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the entry for `path`
    pub fn put(&self, path: &str, entry: &CacheEntry) -> Result<(), IndexError> {
        let value = entry.encode()?;
        let mut staged = self.staged.lock();
        match staged.as_mut() {
            Some(batch) => batch.insert(path.as_bytes(), value),
            None => {
                self.tree.insert(path.as_bytes(), value)?;
            }
        }
        Ok(())
    }

    /// Remove `path` and any descendants
    ///
    /// Removing an absent path is a no-op.
    pub fn remove_subtree(&self, path: &str) -> Result<(), IndexError> {
        let items = self.subtree(path)?;
        let mut staged = self.staged.lock();
        for (key, _) in items {
            match staged.as_mut() {
                Some(batch) => batch.remove(key.as_bytes()),
                None => {
                    self.tree.remove(key.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Move `source` and any descendants under `target`
    pub fn rename_subtree(&self, source: &str, target: &str) -> Result<(), IndexError> {
        let items = self.subtree(source)?;
        let mut staged = self.staged.lock();
        for (key, value) in items {
            let suffix = &key[source.len()..];
            let new_key = format!("{target}{suffix}");
            match staged.as_mut() {
                Some(batch) => {
                    batch.remove(key.as_bytes());
                    batch.insert(new_key.as_bytes(), value);
                }
                None => {
                    self.tree.remove(key.as_bytes())?;
                    self.tree.insert(new_key.as_bytes(), value)?;
                }
            }
        }
        Ok(())
    }

    /// Begin staging writes
    pub fn begin(&self) {
        *self.staged.lock() = Some(Batch::default());
    }

    /// Apply staged writes atomically
    pub fn commit(&self) -> Result<(), IndexError> {
        if let Some(batch) = self.staged.lock().take() {
            self.tree.apply_batch(batch)?;
        }
        Ok(())
    }

    /// Discard staged writes
    pub fn rollback(&self) {
        *self.staged.lock() = None;
    }

    pub fn has_open_transaction(&self) -> bool {
        self.staged.lock().is_some()
    }

    /// Number of committed entries
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Committed entry plus descendants, keyed by path
    fn subtree(&self, path: &str) -> Result<Vec<(String, IVec)>, IndexError> {
        let mut items = Vec::new();
        if let Some(value) = self.tree.get(path.as_bytes())? {
            items.push((path.to_string(), value));
        }
        for pair in self.tree.scan_prefix(format!("{path}/").as_bytes()) {
            let (key, value) = pair?;
            items.push((String::from_utf8_lossy(&key).into_owned(), value));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, FileCache) {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path().join("cache.db")).unwrap();
        let tree = db.open_tree("u1").unwrap();
        (dir, FileCache::new(tree))
    }

    fn entry(size: u64) -> CacheEntry {
        CacheEntry {
            size,
            mtime_ms: 1_000,
            is_dir: false,
        }
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, cache) = cache();
        cache.put("docs/a.txt", &entry(3)).unwrap();
        assert_eq!(cache.get("docs/a.txt").unwrap(), Some(entry(3)));
        assert_eq!(cache.get("docs/missing").unwrap(), None);
    }

    #[test]
    fn remove_subtree_takes_descendants() {
        let (_dir, cache) = cache();
        cache.put("docs", &entry(0)).unwrap();
        cache.put("docs/a.txt", &entry(1)).unwrap();
        cache.put("docs/sub/b.txt", &entry(2)).unwrap();
        cache.put("docs-other", &entry(3)).unwrap();

        cache.remove_subtree("docs").unwrap();

        assert!(cache.get("docs").unwrap().is_none());
        assert!(cache.get("docs/a.txt").unwrap().is_none());
        assert!(cache.get("docs/sub/b.txt").unwrap().is_none());
        // sibling with a common name prefix survives
        assert!(cache.get("docs-other").unwrap().is_some());
    }

    #[test]
    fn remove_absent_path_is_a_noop() {
        let (_dir, cache) = cache();
        cache.remove_subtree("never/there").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn rename_subtree_moves_descendants() {
        let (_dir, cache) = cache();
        cache.put("old", &entry(0)).unwrap();
        cache.put("old/a.txt", &entry(1)).unwrap();
        cache.put("old/sub/b.txt", &entry(2)).unwrap();

        cache.rename_subtree("old", "new").unwrap();

        assert!(cache.get("old").unwrap().is_none());
        assert!(cache.get("old/a.txt").unwrap().is_none());
        assert_eq!(cache.get("new").unwrap(), Some(entry(0)));
        assert_eq!(cache.get("new/a.txt").unwrap(), Some(entry(1)));
        assert_eq!(cache.get("new/sub/b.txt").unwrap(), Some(entry(2)));
    }

    #[test]
    fn staged_writes_are_invisible_until_commit() {
        let (_dir, cache) = cache();
        cache.put("kept", &entry(1)).unwrap();

        cache.begin();
        assert!(cache.has_open_transaction());
        cache.put("staged", &entry(2)).unwrap();
        cache.remove_subtree("kept").unwrap();

        // committed state unchanged while the batch is open
        assert!(cache.get("staged").unwrap().is_none());
        assert!(cache.get("kept").unwrap().is_some());

        cache.commit().unwrap();
        assert!(!cache.has_open_transaction());
        assert!(cache.get("staged").unwrap().is_some());
        assert!(cache.get("kept").unwrap().is_none());
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let (_dir, cache) = cache();
        cache.begin();
        cache.put("staged", &entry(1)).unwrap();
        cache.rollback();

        assert!(!cache.has_open_transaction());
        cache.commit().unwrap();
        assert!(cache.get("staged").unwrap().is_none());
    }
}
