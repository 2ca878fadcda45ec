//! CLI argument definitions for Stockroom.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

/// Stockroom -- conversational account inventory.
#[derive(Parser)]
#[command(
    name = "stockroom",
    version,
    about = "Stockroom -- conversational account inventory",
    long_about = "Manages a stock of credential accounts grouped by category: batch adds, \
                  oldest-first withdrawal into a bounded history, and a Telegram gateway \
                  for the operator workflow."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Telegram bot gateway (receive operator events, drive
    /// the inventory, send replies back).
    Bot {
        /// Telegram long-polling timeout in seconds.
        #[arg(long, default_value_t = 30)]
        poll_timeout: u64,

        /// Restrict the bot to specific operator IDs (comma-separated).
        /// Overrides the allow-list from config/default.toml.
        #[arg(long)]
        operators: Option<String>,
    },

    /// Print the day/week/month added and withdrawn counters.
    Stats,

    /// Run one history retention sweep and exit.
    Sweep,

    /// Show current system status.
    Status,
}
