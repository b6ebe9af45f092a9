// src/scheduler/controller.rs
// Scheduler Controller (SPEC_FULL §4.E): owns the Queue, Pool, and Reporter
// for their lifetime; start/stop are idempotent. Grounded in the teacher's
// `background/mod.rs::spawn`, which returns a shutdown handle for a single
// worker loop — generalized here to an explicit start/stop object so the
// Component Kernel (§4.F) can sequence it alongside other components.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::change::FileChange;
use super::debounce::DebounceQueue;
use super::extractor::ChangeExtractor;
use super::status::{StatusReporter, StatusSnapshot};
use super::worker_pool::WorkerPool;
use crate::config::SchedulerConfig;

pub struct SchedulerController {
    queue: Arc<DebounceQueue>,
    pool: Arc<WorkerPool>,
    reporter: Arc<StatusReporter>,
    running: AtomicBool,
}

impl SchedulerController {
    pub fn new(config: &SchedulerConfig, extractor: Arc<dyn ChangeExtractor>) -> Arc<Self> {
        let queue = DebounceQueue::new(
            Duration::from_secs_f64(config.delay_seconds),
            Duration::from_secs_f64(config.max_delay_seconds),
        );
        let reporter = Arc::new(StatusReporter::new(config.status_history));
        let pool = WorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&reporter),
            extractor,
            config.worker_threads,
            config.batch_size,
        );
        Arc::new(Self { queue, pool, reporter, running: AtomicBool::new(false) })
    }

    /// Start the queue's consumers. Idempotent; a partial failure leaves the
    /// controller stopped rather than half-started.
    pub async fn start(&self) -> crate::error::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            warn!("scheduler controller already running; start() is a no-op");
            return Ok(());
        }
        self.pool.start().await;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.pool.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn enqueue(&self, change: FileChange) {
        self.queue.add(change).await;
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.reporter.snapshot().await
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.pending_count().await
    }

    pub async fn ready_count(&self) -> usize {
        self.queue.ready_count().await
    }

    pub async fn active_workers(&self) -> usize {
        self.pool.active_count().await
    }
}
