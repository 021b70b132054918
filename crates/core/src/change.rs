//! Normalized change representation

use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Kind of filesystem change carried by a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// New file or directory
    Added,
    /// Content or metadata changed
    Modified,
    /// File or directory gone
    Removed,
    /// Moved to a new path
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
            ChangeKind::Renamed => "renamed",
        };
        f.write_str(text)
    }
}

/// A single decoded change event
///
/// Instances only exist fully resolved: the decoder either produces a change
/// whose paths all remapped cleanly, or nothing at all. The value is owned by
/// the callback that receives it and discarded after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// What happened
    pub kind: ChangeKind,
    /// Logical path, already stripped of the base prefix and remapped
    pub path: String,
    /// Post-rename logical path, present only for [`ChangeKind::Renamed`]
    pub target: Option<String>,
    /// Wall-clock time reported by the producer, when it parsed
    pub time: Option<DateTime<FixedOffset>>,
    /// Byte count reported by the producer (JSON payloads only)
    pub size: Option<u64>,
}

impl Change {
    /// Create a change without a rename target
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            target: None,
            time: None,
            size: None,
        }
    }

    /// Create a rename change
    pub fn renamed(
        path: impl Into<String>,
        target: impl Into<String>,
        time: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: path.into(),
            target: Some(target.into()),
            time,
            size: None,
        }
    }

    /// Attach producer-reported metadata
    pub fn with_meta(mut self, time: Option<DateTime<FixedOffset>>, size: Option<u64>) -> Self {
        self.time = time;
        self.size = size;
        self
    }
}
