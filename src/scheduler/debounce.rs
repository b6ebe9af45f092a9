// src/scheduler/debounce.rs
// Debounce Queue (SPEC_FULL §4.C) — the hardest piece of this crate.
//
// Grounded in the teacher's `background/watcher.rs`, which tracks pending
// changes in an `Arc<RwLock<HashMap<PathBuf, (ChangeType, Instant)>>>` and
// periodically polls for anything whose debounce window has elapsed. That
// poll-loop approach can't give a hard `max_delay` guarantee or true
// per-path wakeups, so this module generalizes it: each `add` spawns a timer
// task for its path's current `fire_at`, tagged with a generation counter.
// Only the task whose generation still matches the live pending entry when
// it fires actually performs the pending -> ready transition; every earlier
// task for the same path becomes a harmless no-op the moment a later `add`
// bumps the generation. This gives "effectively one wakeup" behavior without
// needing a timer-wheel or real cancellation handles.
//
// Identity for debouncing purposes is `(project_id, path)`, not bare path —
// two projects may legitimately share a relative path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};

use super::change::{ChangeKind, FileChange, PendingEntry};

type ChangeKey = (i64, PathBuf);

struct State {
    pending: HashMap<ChangeKey, PendingEntry>,
    ready: VecDeque<FileChange>,
    ready_keys: HashSet<ChangeKey>,
}

pub struct DebounceQueue {
    delay: Duration,
    max_delay: Duration,
    state: Mutex<State>,
    notify: Notify,
}

impl DebounceQueue {
    pub fn new(delay: Duration, max_delay: Duration) -> Arc<Self> {
        let max_delay = if max_delay <= delay { delay * 2 } else { max_delay };
        Arc::new(Self {
            delay,
            max_delay,
            state: Mutex::new(State {
                pending: HashMap::new(),
                ready: VecDeque::new(),
                ready_keys: HashSet::new(),
            }),
            notify: Notify::new(),
        })
    }

    /// Enqueue a change. See SPEC_FULL §4.C for the full coalescing contract.
    pub async fn add(self: &Arc<Self>, change: FileChange) {
        let now = Instant::now();
        let key: ChangeKey = (change.project_id, change.path.clone());
        let mut state = self.state.lock().await;

        // If this (project, path) already sits in the ready queue (not yet
        // drained), pull it back out and fold it into a fresh pending window
        // so the "no two ready entries share a key" invariant holds.
        if state.ready_keys.remove(&key) {
            if let Some(idx) = state
                .ready
                .iter()
                .position(|c| c.project_id == key.0 && c.path == key.1)
            {
                state.ready.remove(idx);
            }
        }

        match state.pending.get_mut(&key) {
            None => {
                let fire_at = now + self.delay;
                state.pending.insert(
                    key.clone(),
                    PendingEntry { latest_change: change, first_seen: now, fire_at, generation: 0 },
                );
                self.schedule_wakeup(key, 0, fire_at);
            }
            Some(entry) => {
                // CREATED then DELETED within the same window: the file
                // came and went, drop the entry entirely.
                if matches!(entry.latest_change.kind, ChangeKind::Created)
                    && matches!(change.kind, ChangeKind::Deleted)
                {
                    entry.generation += 1; // invalidate any in-flight wakeup
                    state.pending.remove(&key);
                    return;
                }

                entry.latest_change = change;
                entry.generation += 1;
                let hard_deadline = entry.first_seen + self.max_delay;
                if now >= hard_deadline {
                    // Max-delay escape hatch: transition immediately.
                    let entry = state.pending.remove(&key).expect("entry present");
                    Self::push_ready(&mut state, entry.latest_change);
                    self.notify.notify_one();
                    return;
                }
                let fire_at = std::cmp::min(now + self.delay, hard_deadline);
                entry.fire_at = fire_at;
                let generation = entry.generation;
                self.schedule_wakeup(key, generation, fire_at);
            }
        }
    }

    fn schedule_wakeup(self: &Arc<Self>, key: ChangeKey, generation: u64, fire_at: Instant) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(fire_at.into()).await;
            queue.try_transition(&key, generation).await;
        });
    }

    async fn try_transition(self: &Arc<Self>, key: &ChangeKey, generation: u64) {
        let mut state = self.state.lock().await;
        let Some(entry) = state.pending.get(key) else { return };
        if entry.generation != generation {
            // A newer `add` superseded this wakeup; it scheduled its own.
            return;
        }
        let entry = state.pending.remove(key).expect("entry present");
        Self::push_ready(&mut state, entry.latest_change);
        drop(state);
        self.notify.notify_one();
    }

    fn push_ready(state: &mut State, change: FileChange) {
        state.ready_keys.insert((change.project_id, change.path.clone()));
        state.ready.push_back(change);
    }

    /// Remove and return up to `max_n` ready entries, FIFO.
    pub async fn drain(&self, max_n: usize) -> Vec<FileChange> {
        let mut state = self.state.lock().await;
        let n = max_n.min(state.ready.len());
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(change) = state.ready.pop_front() {
                state.ready_keys.remove(&(change.project_id, change.path.clone()));
                out.push(change);
            }
        }
        out
    }

    /// Block until the ready queue is non-empty or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> bool {
        loop {
            let notified = self.notify.notified();
            if self.ready_count().await > 0 {
                return true;
            }
            match tokio::time::timeout(timeout, notified).await {
                Ok(()) => {
                    if self.ready_count().await > 0 {
                        return true;
                    }
                    // Spurious wakeup (e.g. the path was re-coalesced back
                    // into pending); keep waiting out the remaining budget.
                    continue;
                }
                Err(_) => return false,
            }
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn ready_count(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.pending.clear();
        state.ready.clear();
        state.ready_keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, kind: ChangeKind) -> FileChange {
        FileChange::new(path, kind, 1)
    }

    #[tokio::test]
    async fn single_path_quiet_debounce_extends_window() {
        let q = DebounceQueue::new(Duration::from_millis(200), Duration::from_secs(2));
        q.add(change("p", ChangeKind::Modified)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        q.add(change("p", ChangeKind::Modified)).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(q.ready_count().await, 0, "window should have been extended by the second add");

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(q.ready_count().await, 1);
        let drained = q.drain(10).await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].path, PathBuf::from("p"));
    }

    #[tokio::test]
    async fn max_delay_escape_hatch_fires_despite_continuous_activity() {
        let q = DebounceQueue::new(Duration::from_millis(500), Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..10 {
            q.add(change("p", ChangeKind::Modified)).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(q.ready_count().await >= 1, "max_delay must force a transition eventually");
        assert!(start.elapsed() < Duration::from_millis(2200));
    }

    #[tokio::test]
    async fn created_then_deleted_within_window_cancels() {
        let q = DebounceQueue::new(Duration::from_millis(200), Duration::from_secs(2));
        q.add(change("p", ChangeKind::Created)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        q.add(change("p", ChangeKind::Deleted)).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(q.pending_count().await, 0);
        assert_eq!(q.ready_count().await, 0);
        let drained = q.drain(10).await;
        assert!(drained.is_empty());
    }

    #[tokio::test]
    async fn no_loss_across_distinct_paths() {
        let q = DebounceQueue::new(Duration::from_millis(50), Duration::from_millis(500));
        for i in 0..20 {
            q.add(change(&format!("p{i}"), ChangeKind::Modified)).await;
        }
        assert!(q.wait(Duration::from_secs(1)).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut seen = 0;
        loop {
            let batch = q.drain(5).await;
            if batch.is_empty() {
                if !q.wait(Duration::from_millis(100)).await {
                    break;
                }
                continue;
            }
            seen += batch.len();
        }
        assert_eq!(seen, 20);
    }

    #[tokio::test]
    async fn distinct_projects_with_the_same_path_do_not_collide() {
        let q = DebounceQueue::new(Duration::from_millis(50), Duration::from_millis(500));
        q.add(FileChange::new("shared.md", ChangeKind::Modified, 1)).await;
        q.add(FileChange::new("shared.md", ChangeKind::Modified, 2)).await;

        assert_eq!(q.pending_count().await, 2, "one pending entry per project");
        assert!(q.wait(Duration::from_secs(1)).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let drained = q.drain(10).await;
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().any(|c| c.project_id == 1));
        assert!(drained.iter().any(|c| c.project_id == 2));
    }

    #[tokio::test]
    async fn misconfigured_max_delay_is_normalized_on_construction() {
        let q = DebounceQueue::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(q.max_delay, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn wait_times_out_when_nothing_becomes_ready() {
        let q = DebounceQueue::new(Duration::from_secs(10), Duration::from_secs(20));
        let got = q.wait(Duration::from_millis(50)).await;
        assert!(!got);
    }
}
