// src/config/env.rs
// Environment-based configuration overrides - single source of truth for env vars.
// Mirrors the teacher's "read once at startup, log what was found" pattern
// (see ApiKeys::from_env in the grounding repo) generalized to flat
// scheduler/session/http keys instead of domain-specific API keys.

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub scheduler_enabled: Option<bool>,
    pub scheduler_delay_seconds: Option<f64>,
    pub scheduler_max_delay_seconds: Option<f64>,
    pub scheduler_worker_threads: Option<usize>,
    pub scheduler_batch_size: Option<usize>,
    pub scheduler_status_history: Option<usize>,
    pub session_timeout_seconds: Option<u64>,
    pub http_bind_addr: Option<String>,
    pub log_level: Option<String>,
}

impl EnvConfig {
    pub fn load() -> Self {
        let cfg = Self {
            scheduler_enabled: parse_bool_env("SCHEDULER_ENABLED"),
            scheduler_delay_seconds: parse_env("SCHEDULER_DELAY_SECONDS"),
            scheduler_max_delay_seconds: parse_env("SCHEDULER_MAX_DELAY_SECONDS"),
            scheduler_worker_threads: parse_env("SCHEDULER_WORKER_THREADS"),
            scheduler_batch_size: parse_env("SCHEDULER_BATCH_SIZE"),
            scheduler_status_history: parse_env("SCHEDULER_STATUS_HISTORY"),
            session_timeout_seconds: parse_env("SESSION_TIMEOUT_SECONDS"),
            http_bind_addr: read_string("HTTP_BIND_ADDR"),
            log_level: read_string("LOG_LEVEL"),
        };
        cfg.log_overrides();
        cfg
    }

    fn log_overrides(&self) {
        let mut set = Vec::new();
        if self.scheduler_enabled.is_some() {
            set.push("SCHEDULER_ENABLED");
        }
        if self.scheduler_delay_seconds.is_some() {
            set.push("SCHEDULER_DELAY_SECONDS");
        }
        if self.scheduler_max_delay_seconds.is_some() {
            set.push("SCHEDULER_MAX_DELAY_SECONDS");
        }
        if self.scheduler_worker_threads.is_some() {
            set.push("SCHEDULER_WORKER_THREADS");
        }
        if self.scheduler_batch_size.is_some() {
            set.push("SCHEDULER_BATCH_SIZE");
        }
        if self.scheduler_status_history.is_some() {
            set.push("SCHEDULER_STATUS_HISTORY");
        }
        if self.session_timeout_seconds.is_some() {
            set.push("SESSION_TIMEOUT_SECONDS");
        }
        if self.http_bind_addr.is_some() {
            set.push("HTTP_BIND_ADDR");
        }
        if self.log_level.is_some() {
            set.push("LOG_LEVEL");
        }
        if !set.is_empty() {
            debug!(overrides = ?set, "environment configuration overrides present");
        }
    }
}

fn read_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    read_string(name).and_then(|v| v.parse().ok())
}

pub(crate) fn parse_bool_env(name: &str) -> Option<bool> {
    let value = read_string(name)?.to_lowercase();
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
