// src/scheduler/mod.rs
// Background change-driven work scheduler: debounce queue, worker pool,
// status reporter, and the controller gluing them together (SPEC_FULL §4).

pub mod change;
pub mod controller;
pub mod debounce;
pub mod extractor;
pub mod status;
pub mod worker_pool;

pub use change::{ChangeKind, FileChange};
pub use controller::SchedulerController;
pub use extractor::ChangeExtractor;
pub use status::{StatusReporter, StatusSnapshot};
pub use worker_pool::{WorkerPool, WorkerState};
