// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! Implements `todoapp update`, which applies the embedded SQL migrations
//! (tasks and recurrence patterns) to the configured PostgreSQL database.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! todoapp update
//!
//! # Preview migrations without applying
//! todoapp update --dry-run
//! ```
//!
//! # Environment
//!
//! `TODOAPP_DATABASE_URL` takes precedence over `spec.database.url`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use todoapp_core::domain::repository::StorageBackend;

use super::load_config;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: UpdateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Todoapp Update".bold().green());

    // load_config applies TODOAPP_DATABASE_URL on top of the manifest
    let config = load_config(config_path)?;
    let database_url = match config.storage_backend()? {
        StorageBackend::PostgreSQL(pg) => pg.connection_string,
        StorageBackend::InMemory => anyhow::bail!(
            "No PostgreSQL database configured. Set TODOAPP_DATABASE_URL or spec.database.url."
        ),
    };

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    // The tracking table does not exist before the first run
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        MIGRATOR.run(&pool).await.context("Failed to apply migrations")?;
        println!("{}", "✓ Database updated successfully.".green());
    } else {
        println!("{}", "✓ Database is up to date.".green());
    }

    Ok(())
}
