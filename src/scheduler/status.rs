// src/scheduler/status.rs
// Status Reporter (SPEC_FULL §4.B): counters + a bounded ring of recent
// successes/failures, with derived rates. Grounded in the teacher's small,
// lock-guarded, snapshot-returns-a-copy style (db/pool.rs's PoolStatus) and
// background/mod.rs's cycle counters.

use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::Mutex;

const ERROR_TRUNCATE_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct SuccessEntry {
    pub path: String,
    pub wall_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub path: String,
    pub wall_time: chrono::DateTime<chrono::Utc>,
    pub error_summary: String,
}

struct Inner {
    processed: u64,
    failed: u64,
    started_at: Instant,
    recent_successes: VecDeque<SuccessEntry>,
    recent_failures: VecDeque<FailureEntry>,
    capacity: usize,
}

/// A point-in-time copy of the reporter's state, safe to hand to callers.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub processed: u64,
    pub failed: u64,
    pub uptime_seconds: f64,
    pub files_per_second: f64,
    pub recent_successes: Vec<SuccessEntry>,
    pub recent_failures: Vec<FailureEntry>,
}

/// Thread-safe counters + bounded history. `capacity` (`H` in the spec) must
/// be >= 1; construction normalizes 0 up to 1 rather than panicking.
pub struct StatusReporter {
    inner: Mutex<Inner>,
}

impl StatusReporter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                processed: 0,
                failed: 0,
                started_at: Instant::now(),
                recent_successes: VecDeque::with_capacity(capacity),
                recent_failures: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    pub async fn report_success(&self, path: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.processed += 1;
        if inner.recent_successes.len() == inner.capacity {
            inner.recent_successes.pop_front();
        }
        inner.recent_successes.push_back(SuccessEntry {
            path: path.into(),
            wall_time: chrono::Utc::now(),
        });
    }

    pub async fn report_failure(&self, path: impl Into<String>, error_text: &str) {
        let summary = truncate(error_text, ERROR_TRUNCATE_LEN);
        let mut inner = self.inner.lock().await;
        inner.failed += 1;
        if inner.recent_failures.len() == inner.capacity {
            inner.recent_failures.pop_front();
        }
        inner.recent_failures.push_back(FailureEntry {
            path: path.into(),
            wall_time: chrono::Utc::now(),
            error_summary: summary,
        });
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock().await;
        let uptime_seconds = inner.started_at.elapsed().as_secs_f64();
        let files_per_second = if uptime_seconds > 0.0 {
            inner.processed as f64 / uptime_seconds
        } else {
            0.0
        };
        StatusSnapshot {
            processed: inner.processed,
            failed: inner.failed,
            uptime_seconds,
            files_per_second,
            recent_successes: inner.recent_successes.iter().cloned().collect(),
            recent_failures: inner.recent_failures.iter().cloned().collect(),
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.processed = 0;
        inner.failed = 0;
        inner.recent_successes.clear();
        inner.recent_failures.clear();
        inner.started_at = Instant::now();
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}
