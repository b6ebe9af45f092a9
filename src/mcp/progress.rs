// src/mcp/progress.rs
// Progress & Cancellation Primitives (SPEC_FULL §4.J). Grounded directly in
// `web/mcp_http.rs`'s use of `tokio_util::sync::CancellationToken` for its
// HTTP transport's shutdown signal, generalized here to per-invocation
// cancellation, plus a progress reporter callback in the same spirit as the
// teacher's broadcast-event side channel (`mcp/mod.rs`'s `ws_tx`).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Cancellation is cooperative: `cancel()` never kills a running tool, it
/// only flips a flag tools are expected to poll at natural boundaries.
#[derive(Clone)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub type ProgressCallback = Arc<dyn Fn(f64, Option<String>) + Send + Sync>;

/// Reports fractional progress for a single tool invocation. When no
/// callback is wired (the session doesn't advertise `progress_tracking`),
/// reports are simply logged at debug level.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub fn silent() -> Self {
        Self { callback: None }
    }

    pub fn report(&self, fraction: f64, message: Option<String>) -> Result<()> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(AppError::ConfigInvalid(format!(
                "progress fraction must be within [0.0, 1.0], got {fraction}"
            )));
        }
        match &self.callback {
            Some(cb) => cb(fraction, message),
            None => tracing::debug!(fraction, message = message.as_deref(), "progress (no listener)"),
        }
        Ok(())
    }
}
