// src/config/mod.rs
// Configuration and shared constants.

pub mod env;
pub mod file;

pub use env::EnvConfig;
pub use file::FileConfig;

use crate::error::{AppError, Result};

/// Fully resolved scheduler configuration: defaults, overridden by
/// `~/.config/changeforge/config.toml` (or `./config.toml` if present),
/// overridden by environment variables. See SPEC_FULL §6.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub worker_threads: usize,
    pub batch_size: usize,
    pub status_history: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_seconds: 10.0,
            max_delay_seconds: 120.0,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_size: 16,
            status_history: 100,
        }
    }
}

impl SchedulerConfig {
    /// Normalize an ad-hoc configuration. `max_delay` must exceed `delay`;
    /// if misconfigured, force `max_delay = 2 * delay` and log once, per
    /// SPEC_FULL §4.C.
    pub fn normalized(mut self) -> Self {
        if self.max_delay_seconds <= self.delay_seconds {
            tracing::warn!(
                delay = self.delay_seconds,
                max_delay = self.max_delay_seconds,
                "scheduler.max_delay_seconds must exceed scheduler.delay_seconds; forcing max_delay = 2 * delay"
            );
            self.max_delay_seconds = 2.0 * self.delay_seconds;
        }
        if self.worker_threads == 0 {
            tracing::warn!("scheduler.worker_threads must be >= 1; forcing 1");
            self.worker_threads = 1;
        }
        if self.batch_size == 0 {
            tracing::warn!("scheduler.batch_size must be >= 1; forcing 1");
            self.batch_size = 1;
        }
        if self.status_history == 0 {
            tracing::warn!("scheduler.status_history must be >= 1; forcing 1");
            self.status_history = 1;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_seconds <= 0.0 {
            return Err(AppError::ConfigInvalid(
                "scheduler.delay_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level resolved configuration combining all layers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub session_timeout_seconds: u64,
    pub http_bind_addr: String,
    pub log_level: String,
}

impl AppConfig {
    /// Load defaults, then the TOML file, then environment variables
    /// (highest priority), matching the teacher's env-over-file-over-default
    /// layering in `config/{env,file}.rs`.
    pub fn load() -> Self {
        let file = FileConfig::load();
        let env = EnvConfig::load();

        let mut scheduler = SchedulerConfig {
            enabled: env.scheduler_enabled.unwrap_or(file.scheduler.enabled),
            delay_seconds: env
                .scheduler_delay_seconds
                .or(file.scheduler.delay_seconds)
                .unwrap_or(10.0),
            max_delay_seconds: env
                .scheduler_max_delay_seconds
                .or(file.scheduler.max_delay_seconds)
                .unwrap_or(120.0),
            worker_threads: env
                .scheduler_worker_threads
                .or(file.scheduler.worker_threads)
                .unwrap_or_else(|| SchedulerConfig::default().worker_threads),
            batch_size: env
                .scheduler_batch_size
                .or(file.scheduler.batch_size)
                .unwrap_or(16),
            status_history: env
                .scheduler_status_history
                .or(file.scheduler.status_history)
                .unwrap_or(100),
        };
        scheduler = scheduler.normalized();

        Self {
            scheduler,
            session_timeout_seconds: env
                .session_timeout_seconds
                .or(file.session_timeout_seconds)
                .unwrap_or(3600),
            http_bind_addr: env
                .http_bind_addr
                .or(file.http_bind_addr)
                .unwrap_or_else(|| "127.0.0.1:7878".to_string()),
            log_level: env.log_level.or(file.log_level).unwrap_or_else(|| "info".to_string()),
        }
    }
}
