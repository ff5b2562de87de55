// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Single recurrence pass
//!
//! Runs one tick against the configured storage and prints the report. With
//! `--date` the tick runs as of that date, which is how operators backfill
//! after an outage.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use todoapp_core::application::repository_factory::create_recurrence_service;
use todoapp_core::application::{RecurrenceService, TickReport};
use todoapp_core::domain::clock::{Clock, SystemClock};
use todoapp_core::infrastructure::event_bus::EventBus;

use super::load_config;

#[derive(Args)]
pub struct TickArgs {
    /// Run as of this date instead of today
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: TickArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let today = args
        .date
        .unwrap_or_else(|| SystemClock::new(config.spec.recurrence.clock).today());

    let event_bus = EventBus::with_default_capacity();
    let service = create_recurrence_service(&config, event_bus).await?;

    let report = service
        .run_tick(today)
        .await
        .with_context(|| format!("Recurrence tick for {} failed", today))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(today, &report);
    }

    Ok(())
}

fn print_report(today: NaiveDate, report: &TickReport) {
    println!("{}", format!("Recurrence tick for {}", today).bold());
    println!("  Due:       {}", report.due);
    println!("  Generated: {}", report.generated.to_string().green());
    println!("  Skipped:   {}", report.skipped);
    if report.failed > 0 {
        println!("  Failed:    {}", report.failed.to_string().red());
    } else {
        println!("  Failed:    0");
    }
    if report.malformed > 0 {
        println!(
            "  Malformed: {} {}",
            report.malformed.to_string().red().bold(),
            "(needs manual correction, see logs)".dimmed()
        );
    }
}
