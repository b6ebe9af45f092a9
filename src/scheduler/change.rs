// src/scheduler/change.rs
// Data model shared across the debounce queue and worker pool (SPEC_FULL §3).

use std::path::PathBuf;
use std::time::Instant;

/// The kind of filesystem event a change represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// A single reported change, as handed to the queue by the external monitor.
///
/// `project_id` is always supplied by the caller — the scheduler never
/// infers or defaults it (see DESIGN.md, Open Question 1).
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub project_id: i64,
    pub old_path: Option<PathBuf>,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind, project_id: i64) -> Self {
        Self { path: path.into(), kind, project_id, old_path: None }
    }

    pub fn with_old_path(mut self, old_path: impl Into<PathBuf>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }
}

/// Internal bookkeeping for one path sitting in the debounce window.
#[derive(Debug, Clone)]
pub(crate) struct PendingEntry {
    pub latest_change: FileChange,
    pub first_seen: Instant,
    pub fire_at: Instant,
    /// Monotonically increasing token. Bumped on every `add` for this path;
    /// the scheduled wakeup compares its captured token against the current
    /// one and no-ops if they differ, which is how a later `add` cancels an
    /// earlier still-in-flight wakeup without needing real timer handles.
    pub generation: u64,
}
