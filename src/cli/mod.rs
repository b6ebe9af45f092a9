// src/cli/mod.rs
// CLI surface: a `serve` subcommand that boots the scheduler + MCP/HTTP
// surface, and a `config show` subcommand. Grounded in the teacher's
// `cli/mod.rs` (clap derive layout, `Cli`/`Commands`), trimmed to the two
// commands this spec's scope actually needs.

use clap::{Parser, Subcommand};

pub mod config;
pub mod serve;

#[derive(Parser)]
#[command(name = "changeforge")]
#[command(about = "Background change-driven work scheduler with an MCP tool-serving surface")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and HTTP/MCP surface (default)
    Serve,

    /// Inspect resolved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the fully layered configuration
    Show,
}
