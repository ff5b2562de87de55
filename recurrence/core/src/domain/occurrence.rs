// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Occurrence Calculator
//!
//! Pure date arithmetic for recurrence rules. Given a rule and the date of the
//! last generated instance (if any) it yields the next occurrence date.
//!
//! - **First occurrence** (nothing generated yet) is anchored on `start_date`
//!   itself, never `start_date` plus one interval.
//! - **Weekly** intervals count whole Monday-based weeks from the week that
//!   contains `start_date`; only weeks whose offset is a multiple of the
//!   interval are eligible.
//! - **Monthly** dates clamp to the last day of short months, so day 31 lands
//!   on Feb 28/29, Apr 30, ...
//!
//! Every result is checked to move strictly forward from the last generated
//! date and to never precede `start_date`. A failed check is reported as an
//! [`OccurrenceError`] and never corrected silently.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use thiserror::Error;

use crate::domain::recurrence::{DayOfMonth, Frequency, RecurrenceRule, WeekdaySet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccurrenceError {
    #[error("Date arithmetic overflowed from reference date {reference}")]
    Overflow { reference: NaiveDate },

    #[error("Computed occurrence {computed} does not move past reference date {reference}")]
    NotForward {
        reference: NaiveDate,
        computed: NaiveDate,
    },

    #[error("Computed occurrence {computed} precedes start date {start}")]
    BeforeStart { start: NaiveDate, computed: NaiveDate },

    #[error("Weekly rule has no weekdays")]
    NoWeekdays,
}

/// Next occurrence after `last_generated`, or the first occurrence when nothing
/// has been generated yet.
pub fn next_occurrence(
    rule: &RecurrenceRule,
    last_generated: Option<NaiveDate>,
) -> Result<NaiveDate, OccurrenceError> {
    let next = match last_generated {
        None => first_occurrence(rule)?,
        Some(last) => following_occurrence(rule, last)?,
    };

    if next < rule.start_date {
        return Err(OccurrenceError::BeforeStart {
            start: rule.start_date,
            computed: next,
        });
    }
    if let Some(last) = last_generated {
        if next <= last {
            return Err(OccurrenceError::NotForward {
                reference: last,
                computed: next,
            });
        }
    }
    Ok(next)
}

fn first_occurrence(rule: &RecurrenceRule) -> Result<NaiveDate, OccurrenceError> {
    let start = rule.start_date;
    match rule.frequency {
        Frequency::Daily => Ok(start),
        Frequency::Weekly { days } => weekly_on_or_after(rule, days, start),
        Frequency::Monthly { day_of_month } => {
            let in_start_month = clamped_day(start.year(), start.month(), day_of_month)
                .ok_or(OccurrenceError::Overflow { reference: start })?;
            if in_start_month >= start {
                return Ok(in_start_month);
            }
            month_after(start, 1, day_of_month)
        }
    }
}

fn following_occurrence(
    rule: &RecurrenceRule,
    last: NaiveDate,
) -> Result<NaiveDate, OccurrenceError> {
    let interval = rule.interval.get();
    match rule.frequency {
        Frequency::Daily => last
            .checked_add_days(Days::new(u64::from(interval)))
            .ok_or(OccurrenceError::Overflow { reference: last }),
        Frequency::Weekly { days } => {
            let day_after = last
                .succ_opt()
                .ok_or(OccurrenceError::Overflow { reference: last })?;
            weekly_on_or_after(rule, days, day_after)
        }
        Frequency::Monthly { day_of_month } => month_after(last, interval, day_of_month),
    }
}

/// Earliest date `>= from` in an eligible week whose weekday is in `days`
fn weekly_on_or_after(
    rule: &RecurrenceRule,
    days: WeekdaySet,
    from: NaiveDate,
) -> Result<NaiveDate, OccurrenceError> {
    let first_day = days.first().ok_or(OccurrenceError::NoWeekdays)?;
    let from = from.max(rule.start_date);
    let overflow = OccurrenceError::Overflow { reference: from };

    let anchor = week_start(rule.start_date).ok_or(overflow.clone())?;
    let week = week_start(from).ok_or(overflow.clone())?;
    let interval = u64::from(rule.interval.get());
    let offset = week.signed_duration_since(anchor).num_days().unsigned_abs() / 7;

    let weeks_ahead = match offset % interval {
        0 => {
            let from_index = from.weekday().num_days_from_monday();
            if let Some(day) = days.iter().find(|d| d.num_days_from_monday() >= from_index) {
                return day_in_week(week, day).ok_or(overflow);
            }
            interval
        }
        remainder => interval - remainder,
    };

    let target_week = week
        .checked_add_days(Days::new(weeks_ahead * 7))
        .ok_or(overflow.clone())?;
    day_in_week(target_week, first_day).ok_or(overflow)
}

/// Monday of the week containing `date`
fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

fn day_in_week(monday: NaiveDate, day: Weekday) -> Option<NaiveDate> {
    monday.checked_add_days(Days::new(u64::from(day.num_days_from_monday())))
}

/// `day_of_month` in the month `months` after the month of `reference`
fn month_after(
    reference: NaiveDate,
    months: u32,
    day_of_month: DayOfMonth,
) -> Result<NaiveDate, OccurrenceError> {
    let overflow = OccurrenceError::Overflow { reference };
    let target = reference
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(months)))
        .ok_or(overflow.clone())?;
    clamped_day(target.year(), target.month(), day_of_month).ok_or(overflow)
}

fn clamped_day(year: i32, month: u32, day_of_month: DayOfMonth) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day_of_month.get().min(last))
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
        .map(|date| date.day())
}

/// Successive occurrence dates of a rule, starting from a given progress point.
///
/// Stops at the end date, at `max_occurrences`, or after yielding the first
/// error.
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    last: Option<NaiveDate>,
    generated: u32,
    done: bool,
}

impl<'a> Occurrences<'a> {
    pub fn new(rule: &'a RecurrenceRule) -> Self {
        Self::resume(rule, None, 0)
    }

    pub fn resume(rule: &'a RecurrenceRule, last: Option<NaiveDate>, generated: u32) -> Self {
        Self {
            rule,
            last,
            generated,
            done: false,
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = Result<NaiveDate, OccurrenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(max) = self.rule.max_occurrences {
            if self.generated >= max.get() {
                self.done = true;
                return None;
            }
        }

        match next_occurrence(self.rule, self.last) {
            Ok(date) if self.rule.end_date.is_some_and(|end| date > end) => {
                self.done = true;
                None
            }
            Ok(date) => {
                self.last = Some(date);
                self.generated += 1;
                Some(Ok(date))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
