// src/config/file.rs
// File-based configuration from ~/.config/changeforge/config.toml (or
// ./config.toml if present in the working directory). Mirrors the teacher's
// MiraConfig::load: missing file or unparseable TOML both fall back to
// defaults rather than failing startup.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    pub session_timeout_seconds: Option<u64>,
    pub http_bind_addr: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub delay_seconds: Option<f64>,
    pub max_delay_seconds: Option<f64>,
    pub worker_threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub status_history: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_seconds: None,
            max_delay_seconds: None,
            worker_threads: None,
            batch_size: None,
            status_history: None,
        }
    }
}

impl FileConfig {
    pub fn load() -> Self {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
        }
    }

    pub fn config_path() -> PathBuf {
        let cwd_candidate = PathBuf::from("./config.toml");
        if cwd_candidate.exists() {
            return cwd_candidate;
        }
        dirs::config_dir()
            .unwrap_or_else(|| {
                warn!("no config directory available, falling back to current directory");
                PathBuf::from(".")
            })
            .join("changeforge")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_config_to_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.delay_seconds, None);
    }

    #[test]
    fn parses_scheduler_section() {
        let toml = r#"
session_timeout_seconds = 1800
http_bind_addr = "0.0.0.0:9000"

[scheduler]
enabled = true
delay_seconds = 5.0
max_delay_seconds = 30.0
worker_threads = 4
batch_size = 8
status_history = 50
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.delay_seconds, Some(5.0));
        assert_eq!(config.scheduler.max_delay_seconds, Some(30.0));
        assert_eq!(config.scheduler.worker_threads, Some(4));
        assert_eq!(config.scheduler.batch_size, Some(8));
        assert_eq!(config.scheduler.status_history, Some(50));
        assert_eq!(config.session_timeout_seconds, Some(1800));
        assert_eq!(config.http_bind_addr.as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let toml = r#"
[scheduler]
enabled = true
unknown_key = "ignored"

[unrelated_section]
x = 1
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn corrupt_toml_fails_to_parse_and_caller_falls_back() {
        let bad = "[scheduler\nenabled = true";
        let result: Result<FileConfig, _> = toml::from_str(bad);
        assert!(result.is_err());
        let config = result.unwrap_or_default();
        assert!(config.scheduler.enabled);
    }
}
