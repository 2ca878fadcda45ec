//! CLI entry point for Stockroom.
//!
//! This binary provides the `stockroom` command: the Telegram gateway
//! plus small operational subcommands that work straight against the
//! database.

mod bot;
mod cli;
mod config;
mod helpers;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use stockroom_engine::InventoryEngine;
use stockroom_store::{Database, InventoryStore};

use crate::cli::{Cli, Commands};
use crate::config::load_bot_config;
use crate::helpers::{env_non_empty, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Bot {
            poll_timeout,
            operators,
        } => bot::cmd_bot(poll_timeout, operators).await,
        Commands::Stats => cmd_stats().await,
        Commands::Sweep => cmd_sweep().await,
        Commands::Status => cmd_status().await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: stats
// ---------------------------------------------------------------------------

async fn cmd_stats() -> Result<()> {
    init_tracing("warn");
    let engine = open_engine().await?;

    let stats = engine.statistics(Utc::now()).await?;
    let total = engine.total_active().await?;

    println!();
    println!("  Accounts in stock: {total}");
    println!(
        "  Added:     day {:>5}  week {:>5}  month {:>5}",
        stats.added.day, stats.added.week, stats.added.month
    );
    println!(
        "  Withdrawn: day {:>5}  week {:>5}  month {:>5}",
        stats.retrieved.day, stats.retrieved.week, stats.retrieved.month
    );
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: sweep
// ---------------------------------------------------------------------------

async fn cmd_sweep() -> Result<()> {
    init_tracing("info");
    let engine = open_engine().await?;

    let removed = engine.retention_sweep(Utc::now()).await?;
    println!("  Retention sweep removed {removed} history entries.");

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status() -> Result<()> {
    init_tracing("warn");
    let cfg = load_bot_config();

    println!();
    println!("  Stockroom Status");
    println!("  ================");
    println!();

    let db_path = std::path::Path::new(&cfg.db_path);
    if db_path.exists() {
        println!("  Database:   OK ({})", db_path.display());
    } else {
        println!("  Database:   NOT INITIALIZED (created on first `stockroom bot`)");
    }

    if cfg.operators.is_empty() {
        println!("  Operators:  NONE CONFIGURED (set [bot] operators in config/default.toml)");
    } else {
        println!("  Operators:  {:?}", cfg.operators);
    }

    match env_non_empty("STOCKROOM_BOT_TOKEN").or_else(|| env_non_empty("TELEGRAM_BOT_TOKEN")) {
        Some(_) => println!("  Bot token:  CONFIGURED"),
        None => println!("  Bot token:  NOT SET"),
    }

    let config_path = std::path::Path::new("config/default.toml");
    if config_path.exists() {
        println!("  Config:     OK ({})", config_path.display());
    } else {
        println!("  Config:     MISSING (using defaults)");
    }

    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open the configured database and build an engine over it.
async fn open_engine() -> Result<InventoryEngine> {
    let cfg = load_bot_config();
    let db = Database::open_and_migrate(cfg.db_path)
        .await
        .context("failed to open database")?;
    Ok(InventoryEngine::new(InventoryStore::new(db)))
}
