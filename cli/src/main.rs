// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Todoapp Recurrence CLI
//!
//! The `todoapp` binary hosts the recurrence engine.
//!
//! ## Commands
//!
//! - `todoapp daemon` - Run the recurrence processor until interrupted
//! - `todoapp tick [--date YYYY-MM-DD]` - Run a single recurrence pass
//! - `todoapp pattern preview <FILE>` - Validate a rule and list its dates
//! - `todoapp config show|validate|generate` - Configuration management
//! - `todoapp update [--dry-run]` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use todoapp_cli::commands::{self, ConfigCommand, PatternCommand, TickArgs, UpdateCommand};

/// Todoapp recurrence engine - generate recurring task instances
#[derive(Parser)]
#[command(name = "todoapp")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "TODOAPP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TODOAPP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the recurrence processor in the foreground until Ctrl-C
    #[command(name = "daemon")]
    Daemon,

    /// Run one recurrence pass and print the report
    #[command(name = "tick")]
    Tick {
        #[command(flatten)]
        args: TickArgs,
    },

    /// Recurrence rule tools
    #[command(name = "pattern")]
    Pattern {
        #[command(subcommand)]
        command: PatternCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the todoapp database schema
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up TODOAPP_* variables from a local .env, if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Daemon) => commands::daemon::run(cli.config).await,
        Some(Commands::Tick { args }) => commands::tick::execute(args, cli.config).await,
        Some(Commands::Pattern { command }) => commands::pattern::handle_command(command).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Update { command }) => commands::update::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
