// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Recurrence rule commands
//!
//! `todoapp pattern preview` validates a rule file and lists the dates the
//! engine would generate for it, without touching storage.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use todoapp_core::domain::occurrence::Occurrences;
use todoapp_core::domain::recurrence::{RecurrenceRequest, RecurrenceRule};

#[derive(Subcommand)]
pub enum PatternCommand {
    /// Validate a recurrence rule (YAML or JSON) and print its first occurrences
    Preview {
        /// Rule file using the API field names (frequency, intervalValue, ...)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of occurrences to list
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

pub async fn handle_command(command: PatternCommand) -> Result<()> {
    match command {
        PatternCommand::Preview { file, count } => preview(&file, count).await,
    }
}

async fn preview(file: &Path, count: usize) -> Result<()> {
    let rule = load_rule(file)?;

    println!("{}", "Recurrence rule is valid".green().bold());
    println!("  Frequency: {}", rule.frequency.kind());
    println!("  Interval: {}", rule.interval);
    println!("  Start: {}", rule.start_date);
    if let Some(end) = rule.end_date {
        println!("  End: {}", end);
    }
    if let Some(max) = rule.max_occurrences {
        println!("  Max occurrences: {}", max);
    }
    println!();

    let dates = preview_dates(&rule, count)?;
    if dates.is_empty() {
        println!("{}", "No occurrences fall within the rule's bounds".yellow());
        return Ok(());
    }

    println!("{}", "Occurrences:".bold());
    for (index, date) in dates.iter().enumerate() {
        println!("  {:>3}. {} ({})", index + 1, date, date.format("%A"));
    }
    if dates.len() < count {
        println!("{}", "  (series ends here)".dimmed());
    }

    Ok(())
}

/// Parse and validate a rule file. JSON is a subset of YAML, so one parser covers both.
fn load_rule(file: &Path) -> Result<RecurrenceRule> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read rule file: {:?}", file))?;
    let request: RecurrenceRequest = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse rule file: {:?}", file))?;
    RecurrenceRule::try_from(request).context("Invalid recurrence rule")
}

fn preview_dates(rule: &RecurrenceRule, count: usize) -> Result<Vec<NaiveDate>> {
    Occurrences::new(rule)
        .take(count)
        .collect::<Result<Vec<_>, _>>()
        .context("Rule produced an invalid occurrence")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rule_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_preview_weekly_yaml() {
        let file = rule_file(
            r#"
frequency: WEEKLY
intervalValue: 1
startDate: 2025-01-06
daysOfWeek: [MONDAY, WEDNESDAY]
"#,
        );
        let rule = load_rule(file.path()).unwrap();
        let dates = preview_dates(&rule, 3).unwrap();
        assert_eq!(dates, vec![date(2025, 1, 6), date(2025, 1, 8), date(2025, 1, 13)]);
    }

    #[test]
    fn test_preview_json_stops_at_max() {
        let file = rule_file(
            r#"{"frequency": "DAILY", "intervalValue": 2, "startDate": "2025-03-01",
                "maxOccurrences": 3}"#,
        );
        let rule = load_rule(file.path()).unwrap();
        let dates = preview_dates(&rule, 10).unwrap();
        assert_eq!(dates, vec![date(2025, 3, 1), date(2025, 3, 3), date(2025, 3, 5)]);
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let file = rule_file(
            r#"
frequency: MONTHLY
intervalValue: 1
startDate: 2025-01-31
"#,
        );
        let err = load_rule(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("day of month"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_rule(Path::new("/nonexistent/rule.yaml")).is_err());
    }
}
