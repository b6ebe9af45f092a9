// src/cli/config.rs
// `config show` subcommand: prints the fully-layered configuration
// (defaults -> file -> env) the way the running process would resolve it.
// Grounded in the teacher's `cli/config.rs::run_config_show`, which prints
// the config file path followed by each resolved key.

use anyhow::Result;

use crate::config::{file::FileConfig, AppConfig};

pub fn run_config_show() -> Result<()> {
    let config = AppConfig::load();

    println!("Config file: {}", FileConfig::config_path().display());
    println!();

    println!("[scheduler]");
    println!("enabled            = {}", config.scheduler.enabled);
    println!("delay_seconds      = {}", config.scheduler.delay_seconds);
    println!("max_delay_seconds  = {}", config.scheduler.max_delay_seconds);
    println!("worker_threads     = {}", config.scheduler.worker_threads);
    println!("batch_size         = {}", config.scheduler.batch_size);
    println!("status_history     = {}", config.scheduler.status_history);
    println!();
    println!("session_timeout_seconds = {}", config.session_timeout_seconds);
    println!("http.bind_addr          = \"{}\"", config.http_bind_addr);
    println!("log.level               = \"{}\"", config.log_level);

    Ok(())
}
