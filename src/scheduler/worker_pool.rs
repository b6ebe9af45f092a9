// src/scheduler/worker_pool.rs
// Worker Pool (SPEC_FULL §4.D): N concurrent consumers of the ready queue,
// cooperative shutdown, per-item failure isolation. Grounded in the
// teacher's `background/fast_lane.rs` (Arc<Notify> + watch::Receiver<bool>
// select loop) generalized from a single fast-lane consumer to N.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::change::ChangeKind;
use super::debounce::DebounceQueue;
use super::extractor::ChangeExtractor;
use super::status::StatusReporter;

const WAIT_POLL: Duration = Duration::from_secs(1);
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const INTERNAL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct WorkerState {
    pub id: usize,
    pub busy: bool,
    pub current_path: Option<String>,
}

struct Handles {
    stop_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

pub struct WorkerPool {
    queue: Arc<DebounceQueue>,
    reporter: Arc<StatusReporter>,
    extractor: Arc<dyn ChangeExtractor>,
    worker_threads: usize,
    batch_size: usize,
    states: Arc<RwLock<Vec<WorkerState>>>,
    running: Mutex<Option<Handles>>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<DebounceQueue>,
        reporter: Arc<StatusReporter>,
        extractor: Arc<dyn ChangeExtractor>,
        worker_threads: usize,
        batch_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            reporter,
            extractor,
            worker_threads: worker_threads.max(1),
            batch_size: batch_size.max(1),
            states: Arc::new(RwLock::new(Vec::new())),
            running: Mutex::new(None),
        })
    }

    /// Launch `worker_threads` consumers. Idempotent: calling `start` while
    /// already running logs a warning and has no effect.
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("worker pool already running; start() is a no-op");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut states = Vec::with_capacity(self.worker_threads);
        for id in 0..self.worker_threads {
            states.push(WorkerState { id, busy: false, current_path: None });
        }
        *self.states.write().await = states;

        let mut joins = Vec::with_capacity(self.worker_threads);
        for id in 0..self.worker_threads {
            let pool = Arc::clone(self);
            let mut stop_rx = stop_rx.clone();
            joins.push(tokio::spawn(async move {
                pool.run_worker(id, &mut stop_rx).await;
            }));
        }

        *running = Some(Handles { stop_tx, joins });
        info!(workers = self.worker_threads, "worker pool started");
    }

    /// Signal all workers to stop and join them with a bounded timeout.
    /// Items left in the queue at stop time remain there — no data loss.
    pub async fn stop(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        let Some(handles) = running.take() else {
            return;
        };
        let _ = handles.stop_tx.send(true);

        for join in handles.joins {
            match tokio::time::timeout(JOIN_TIMEOUT, join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "worker task panicked during shutdown"),
                Err(_) => warn!("worker did not exit within the shutdown grace period; abandoning"),
            }
        }
        info!("worker pool stopped");
    }

    pub async fn active_count(&self) -> usize {
        self.states.read().await.iter().filter(|s| s.busy).count()
    }

    pub async fn processing_paths(&self) -> Vec<String> {
        self.states
            .read()
            .await
            .iter()
            .filter_map(|s| s.current_path.clone())
            .collect()
    }

    async fn run_worker(self: Arc<Self>, id: usize, stop_rx: &mut watch::Receiver<bool>) {
        debug!(worker = id, "worker started");
        loop {
            if *stop_rx.borrow() {
                break;
            }

            let got_items = tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() { break; }
                    true
                }
                available = self.queue.wait(WAIT_POLL) => available,
            };
            if !got_items {
                continue;
            }

            let batch = self.queue.drain(self.batch_size).await;
            if batch.is_empty() {
                continue;
            }

            let mut batch = batch.into_iter();
            while let Some(change) = batch.next() {
                if *stop_rx.borrow() {
                    // This batch was already removed from the queue by
                    // `drain`; re-add the undispatched remainder so it is
                    // not lost, preserving "no data loss" across a stop.
                    self.queue.add(change).await;
                    for leftover in batch.by_ref() {
                        self.queue.add(leftover).await;
                    }
                    break;
                }

                self.set_busy(id, Some(change.path.display().to_string())).await;
                let path_str = change.path.display().to_string();
                let started = std::time::Instant::now();

                // Run the extractor call on its own task so a panic inside it
                // (an internal fault, not a business error the extractor
                // chose to return) can't take the whole worker down with it.
                let outcome: crate::error::Result<()> = match change.kind {
                    ChangeKind::Deleted => {
                        let extractor = Arc::clone(&self.extractor);
                        let change = change.clone();
                        match tokio::spawn(async move { extractor.on_delete(&change).await }).await {
                            Ok(r) => r,
                            Err(join_err) => Err(join_err.into()),
                        }
                    }
                    _ => match tokio::fs::read(&change.path).await {
                        Ok(contents) => {
                            let extractor = Arc::clone(&self.extractor);
                            let change = change.clone();
                            match tokio::spawn(async move { extractor.extract(&change, &contents).await }).await {
                                Ok(r) => r,
                                Err(join_err) => Err(join_err.into()),
                            }
                        }
                        Err(e) => Err(crate::error::AppError::InternalError(format!(
                            "failed to read {}: {e}",
                            change.path.display()
                        ))),
                    },
                };

                match outcome {
                    Ok(()) => self.reporter.report_success(path_str.clone()).await,
                    Err(e @ crate::error::AppError::WorkerPanic(_)) => {
                        warn!(worker = id, path = %path_str, error = %e, "internal fault running extractor; backing off");
                        self.reporter.report_failure(path_str.clone(), &e.to_string()).await;
                        tokio::time::sleep(internal_backoff()).await;
                    }
                    Err(e) => self.reporter.report_failure(path_str.clone(), &e.to_string()).await,
                }

                debug!(worker = id, path = %path_str, elapsed_ms = started.elapsed().as_millis(), "item processed");
                self.set_busy(id, None).await;
            }
        }
        debug!(worker = id, "worker exiting");
    }

    async fn set_busy(&self, id: usize, current_path: Option<String>) {
        let mut states = self.states.write().await;
        if let Some(state) = states.iter_mut().find(|s| s.id == id) {
            state.busy = current_path.is_some();
            state.current_path = current_path;
        }
    }
}

fn internal_backoff() -> Duration {
    INTERNAL_ERROR_BACKOFF
}
