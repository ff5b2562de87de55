// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Source of "today" for the recurrence coordinator.

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Which calendar the system clock reads dates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    Utc,
    #[default]
    Local,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    mode: ClockMode,
}

impl SystemClock {
    pub fn new(mode: ClockMode) -> Self {
        Self { mode }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        match self.mode {
            ClockMode::Utc => Utc::now().date_naive(),
            ClockMode::Local => Local::now().date_naive(),
        }
    }
}

/// Clock pinned to a single date (admin catch-up runs and tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
