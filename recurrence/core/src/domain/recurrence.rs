// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Recurrence Pattern Aggregate
//!
//! A [`RecurrencePattern`] attaches a [`RecurrenceRule`] to a template task and
//! tracks how far generation has progressed (`generated_count`,
//! `last_generated_date`).
//!
//! Rules are only ever built through [`RecurrenceRule::try_from`] on a
//! [`RecurrenceRequest`], which is the single validation path for both pattern
//! creation and pattern updates. Frequency-specific data (weekdays, day of
//! month) lives inside the [`Frequency`] variant, so a rule cannot carry fields
//! for a frequency it does not use.
//!
//! Progress fields are owned by the recurrence coordinator; user edits only
//! replace the rule.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::occurrence::{self, OccurrenceError};
use crate::domain::task::{TaskId, UserId};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of weekdays for weekly recurrence.
///
/// Iteration is always in calendar order, Monday through Sunday. The
/// `Display`/`FromStr` pair uses the comma-joined upper-case form
/// (`MONDAY,WEDNESDAY`) which is also the storage encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(u8);

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeekdaySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in Monday..Sunday order
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }

    pub fn first(&self) -> Option<Weekday> {
        self.iter().next()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

/// Accepts full or three-letter names in any case
fn parse_weekday(s: &str) -> Option<Weekday> {
    let upper = s.trim().to_ascii_uppercase();
    WEEK.into_iter().find(|day| {
        let name = weekday_name(*day);
        upper == name || upper == name[..3]
    })
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(weekday_name).collect();
        write!(f, "{}", names.join(","))
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown weekday: '{0}'")]
pub struct ParseWeekdayError(pub String);

impl FromStr for WeekdaySet {
    type Err = ParseWeekdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                parse_weekday(part).ok_or_else(|| ParseWeekdayError(part.trim().to_string()))
            })
            .collect()
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(weekday_name))
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                parse_weekday(name)
                    .ok_or_else(|| serde::de::Error::custom(ParseWeekdayError(name.clone())))
            })
            .collect()
    }
}

/// Day of month for monthly recurrence, 1..=31
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DayOfMonth(u8);

impl DayOfMonth {
    pub fn get(&self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for DayOfMonth {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(day @ 1..=31) => Ok(Self(day)),
            _ => Err(ValidationError::DayOfMonthOutOfRange(value)),
        }
    }
}

impl From<DayOfMonth> for u32 {
    fn from(day: DayOfMonth) -> Self {
        day.get()
    }
}

/// Frequency discriminant as it appears on the wire and in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrequencyKind {
    Daily,
    Weekly,
    Monthly,
}

impl FrequencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyKind::Daily => "DAILY",
            FrequencyKind::Weekly => "WEEKLY",
            FrequencyKind::Monthly => "MONTHLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(FrequencyKind::Daily),
            "WEEKLY" => Some(FrequencyKind::Weekly),
            "MONTHLY" => Some(FrequencyKind::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for FrequencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly { days: WeekdaySet },
    Monthly { day_of_month: DayOfMonth },
}

impl Frequency {
    pub fn kind(&self) -> FrequencyKind {
        match self {
            Frequency::Daily => FrequencyKind::Daily,
            Frequency::Weekly { .. } => FrequencyKind::Weekly,
            Frequency::Monthly { .. } => FrequencyKind::Monthly,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Interval value must be at least 1, got {0}")]
    InvalidInterval(u32),

    #[error("Weekly recurrence requires at least one day of week")]
    MissingDaysOfWeek,

    #[error("Monthly recurrence requires a day of month")]
    MissingDayOfMonth,

    #[error("Day of month must be between 1 and 31, got {0}")]
    DayOfMonthOutOfRange(u32),

    #[error("{field} is not allowed for {frequency} recurrence")]
    UnexpectedField {
        field: &'static str,
        frequency: FrequencyKind,
    },

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("Max occurrences must be at least 1, got {0}")]
    InvalidMaxOccurrences(u32),

    #[error("Max occurrences {max} is below the {generated} instances already generated")]
    MaxOccurrencesBelowGenerated { max: u32, generated: u32 },

    #[error("Start date {start} is after the last generated occurrence {last}")]
    StartAfterLastGenerated { start: NaiveDate, last: NaiveDate },
}

/// Unvalidated recurrence settings as submitted by a user.
///
/// Field names follow the REST payload (`intervalValue`, `daysOfWeek`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRequest {
    pub frequency: Option<FrequencyKind>,
    pub interval_value: Option<u32>,
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<WeekdaySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<u32>,
}

/// Validated recurrence rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: NonZeroU32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: Option<NonZeroU32>,
}

impl TryFrom<RecurrenceRequest> for RecurrenceRule {
    type Error = ValidationError;

    fn try_from(request: RecurrenceRequest) -> Result<Self, Self::Error> {
        let kind = request
            .frequency
            .ok_or(ValidationError::MissingField("frequency"))?;
        let start_date = request
            .start_date
            .ok_or(ValidationError::MissingField("startDate"))?;
        let interval_value = request
            .interval_value
            .ok_or(ValidationError::MissingField("intervalValue"))?;
        let interval = NonZeroU32::new(interval_value)
            .ok_or(ValidationError::InvalidInterval(interval_value))?;

        let frequency = match kind {
            FrequencyKind::Daily => {
                reject_field(request.days_of_week.is_some(), "daysOfWeek", kind)?;
                reject_field(request.day_of_month.is_some(), "dayOfMonth", kind)?;
                Frequency::Daily
            }
            FrequencyKind::Weekly => {
                reject_field(request.day_of_month.is_some(), "dayOfMonth", kind)?;
                let days = request
                    .days_of_week
                    .filter(|days| !days.is_empty())
                    .ok_or(ValidationError::MissingDaysOfWeek)?;
                Frequency::Weekly { days }
            }
            FrequencyKind::Monthly => {
                reject_field(request.days_of_week.is_some(), "daysOfWeek", kind)?;
                let day = request
                    .day_of_month
                    .ok_or(ValidationError::MissingDayOfMonth)?;
                Frequency::Monthly {
                    day_of_month: DayOfMonth::try_from(day)?,
                }
            }
        };

        if let Some(end) = request.end_date {
            if end < start_date {
                return Err(ValidationError::EndBeforeStart {
                    start: start_date,
                    end,
                });
            }
        }

        let max_occurrences = request
            .max_occurrences
            .map(|max| NonZeroU32::new(max).ok_or(ValidationError::InvalidMaxOccurrences(max)))
            .transpose()?;

        Ok(Self {
            frequency,
            interval,
            start_date,
            end_date: request.end_date,
            max_occurrences,
        })
    }
}

fn reject_field(
    present: bool,
    field: &'static str,
    frequency: FrequencyKind,
) -> Result<(), ValidationError> {
    if present {
        Err(ValidationError::UnexpectedField { field, frequency })
    } else {
        Ok(())
    }
}

impl From<&RecurrenceRule> for RecurrenceRequest {
    fn from(rule: &RecurrenceRule) -> Self {
        let (days_of_week, day_of_month) = match rule.frequency {
            Frequency::Daily => (None, None),
            Frequency::Weekly { days } => (Some(days), None),
            Frequency::Monthly { day_of_month } => (None, Some(day_of_month.get())),
        };
        Self {
            frequency: Some(rule.frequency.kind()),
            interval_value: Some(rule.interval.get()),
            start_date: Some(rule.start_date),
            end_date: rule.end_date,
            days_of_week,
            day_of_month,
            max_occurrences: rule.max_occurrences.map(NonZeroU32::get),
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    Active,
    /// Terminal
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub id: PatternId,
    /// Template task (one pattern per task)
    pub task_id: TaskId,
    pub user_id: UserId,
    pub rule: RecurrenceRule,
    pub generated_count: u32,
    pub last_generated_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrencePattern {
    pub fn new(task_id: TaskId, user_id: UserId, rule: RecurrenceRule) -> Self {
        let now = Utc::now();
        Self {
            id: PatternId::new(),
            task_id,
            user_id,
            rule,
            generated_count: 0,
            last_generated_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the generation budget (max occurrences or end date) is used up
    pub fn is_complete(&self) -> bool {
        if let Some(max) = self.rule.max_occurrences {
            if self.generated_count >= max.get() {
                return true;
            }
        }
        matches!(
            (self.rule.end_date, self.last_generated_date),
            (Some(end), Some(last)) if last >= end
        )
    }

    pub fn status(&self) -> PatternStatus {
        if self.is_complete() {
            PatternStatus::Complete
        } else {
            PatternStatus::Active
        }
    }

    pub fn next_occurrence(&self) -> Result<NaiveDate, OccurrenceError> {
        occurrence::next_occurrence(&self.rule, self.last_generated_date)
    }

    /// The occurrence this pattern owes as of `today`, if any.
    ///
    /// `None` when the pattern is complete, has not started yet, its next
    /// occurrence lies in the future, or that occurrence falls after the end
    /// date.
    pub fn due_occurrence(&self, today: NaiveDate) -> Result<Option<NaiveDate>, OccurrenceError> {
        if self.is_complete() || self.rule.start_date > today {
            return Ok(None);
        }
        let next = self.next_occurrence()?;
        let within_end = self.rule.end_date.is_none_or(|end| next <= end);
        Ok((next <= today && within_end).then_some(next))
    }

    /// Record one generated instance dated `date`
    pub fn advance(&mut self, date: NaiveDate) {
        self.last_generated_date = Some(date);
        self.generated_count += 1;
        self.updated_at = Utc::now();
    }

    /// Replace the rule after a user edit, keeping progress fields intact
    pub fn update_rule(&mut self, rule: RecurrenceRule) -> Result<(), ValidationError> {
        ensure_rule_fits_progress(&rule, self.generated_count, self.last_generated_date)?;
        self.rule = rule;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A replacement rule must not leave existing progress behind: its budget has
/// to cover the instances already generated, and its start date may not move
/// past the last generated occurrence.
///
/// Stores re-run this against the progress they hold when saving an update.
pub fn ensure_rule_fits_progress(
    rule: &RecurrenceRule,
    generated_count: u32,
    last_generated_date: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if let Some(max) = rule.max_occurrences {
        if max.get() < generated_count {
            return Err(ValidationError::MaxOccurrencesBelowGenerated {
                max: max.get(),
                generated: generated_count,
            });
        }
    }
    if let Some(last) = last_generated_date {
        if rule.start_date > last {
            return Err(ValidationError::StartAfterLastGenerated {
                start: rule.start_date,
                last,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily_request() -> RecurrenceRequest {
        RecurrenceRequest {
            frequency: Some(FrequencyKind::Daily),
            interval_value: Some(1),
            start_date: Some(date(2025, 1, 1)),
            ..Default::default()
        }
    }

    fn daily_pattern(max: Option<u32>, end: Option<NaiveDate>) -> RecurrencePattern {
        let rule = RecurrenceRule::try_from(RecurrenceRequest {
            max_occurrences: max,
            end_date: end,
            ..daily_request()
        })
        .unwrap();
        RecurrencePattern::new(TaskId::new(), UserId::new(), rule)
    }

    #[test]
    fn test_weekday_set_iterates_in_calendar_order() {
        let set: WeekdaySet = [Weekday::Fri, Weekday::Mon, Weekday::Wed].into_iter().collect();
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.first(), Some(Weekday::Mon));
    }

    #[test]
    fn test_weekday_set_storage_encoding() {
        let set: WeekdaySet = "wednesday, MONDAY,Fri".parse().unwrap();
        assert_eq!(set.to_string(), "MONDAY,WEDNESDAY,FRIDAY");
        assert_eq!(set.to_string().parse::<WeekdaySet>().unwrap(), set);
        assert!("".parse::<WeekdaySet>().unwrap().is_empty());
        assert_eq!(
            "MONDAY,FUNDAY".parse::<WeekdaySet>(),
            Err(ParseWeekdayError("FUNDAY".to_string()))
        );
    }

    #[test]
    fn test_weekday_set_serializes_as_name_list() {
        let set: WeekdaySet = [Weekday::Sun, Weekday::Tue].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["TUESDAY","SUNDAY"]"#);
        let back: WeekdaySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<WeekdaySet>(r#"["NEVERDAY"]"#).is_err());
    }

    #[test]
    fn test_valid_daily_rule() {
        let rule = RecurrenceRule::try_from(daily_request()).unwrap();
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(rule.interval.get(), 1);
        assert_eq!(rule.start_date, date(2025, 1, 1));
        assert_eq!(rule.end_date, None);
        assert_eq!(rule.max_occurrences, None);
    }

    #[test]
    fn test_required_fields() {
        let missing_frequency = RecurrenceRequest { frequency: None, ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(missing_frequency),
            Err(ValidationError::MissingField("frequency"))
        );

        let missing_start = RecurrenceRequest { start_date: None, ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(missing_start),
            Err(ValidationError::MissingField("startDate"))
        );

        let missing_interval = RecurrenceRequest { interval_value: None, ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(missing_interval),
            Err(ValidationError::MissingField("intervalValue"))
        );

        let zero_interval = RecurrenceRequest { interval_value: Some(0), ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(zero_interval),
            Err(ValidationError::InvalidInterval(0))
        );
    }

    #[test]
    fn test_weekly_requires_days() {
        let request = RecurrenceRequest {
            frequency: Some(FrequencyKind::Weekly),
            ..daily_request()
        };
        assert_eq!(
            RecurrenceRule::try_from(request.clone()),
            Err(ValidationError::MissingDaysOfWeek)
        );

        let empty = RecurrenceRequest {
            days_of_week: Some(WeekdaySet::empty()),
            ..request.clone()
        };
        assert_eq!(RecurrenceRule::try_from(empty), Err(ValidationError::MissingDaysOfWeek));

        let days: WeekdaySet = [Weekday::Tue].into_iter().collect();
        let valid = RecurrenceRequest {
            days_of_week: Some(days),
            ..request
        };
        assert_eq!(
            RecurrenceRule::try_from(valid).unwrap().frequency,
            Frequency::Weekly { days }
        );
    }

    #[test]
    fn test_monthly_day_of_month_bounds() {
        let request = RecurrenceRequest {
            frequency: Some(FrequencyKind::Monthly),
            ..daily_request()
        };
        assert_eq!(
            RecurrenceRule::try_from(request.clone()),
            Err(ValidationError::MissingDayOfMonth)
        );
        for bad in [0, 32, 300] {
            let invalid = RecurrenceRequest { day_of_month: Some(bad), ..request.clone() };
            assert_eq!(
                RecurrenceRule::try_from(invalid),
                Err(ValidationError::DayOfMonthOutOfRange(bad))
            );
        }
        for good in [1, 15, 31] {
            let valid = RecurrenceRequest { day_of_month: Some(good), ..request.clone() };
            assert!(RecurrenceRule::try_from(valid).is_ok());
        }
    }

    #[test]
    fn test_rejects_fields_for_other_frequency() {
        let daily_with_day = RecurrenceRequest { day_of_month: Some(3), ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(daily_with_day),
            Err(ValidationError::UnexpectedField {
                field: "dayOfMonth",
                frequency: FrequencyKind::Daily,
            })
        );

        let monthly_with_days = RecurrenceRequest {
            frequency: Some(FrequencyKind::Monthly),
            day_of_month: Some(3),
            days_of_week: Some([Weekday::Mon].into_iter().collect()),
            ..daily_request()
        };
        assert_eq!(
            RecurrenceRule::try_from(monthly_with_days),
            Err(ValidationError::UnexpectedField {
                field: "daysOfWeek",
                frequency: FrequencyKind::Monthly,
            })
        );
    }

    #[test]
    fn test_end_date_and_max_occurrences() {
        let end_before = RecurrenceRequest {
            end_date: Some(date(2024, 12, 31)),
            ..daily_request()
        };
        assert_eq!(
            RecurrenceRule::try_from(end_before),
            Err(ValidationError::EndBeforeStart {
                start: date(2025, 1, 1),
                end: date(2024, 12, 31),
            })
        );

        let same_day = RecurrenceRequest { end_date: Some(date(2025, 1, 1)), ..daily_request() };
        assert!(RecurrenceRule::try_from(same_day).is_ok());

        let zero_max = RecurrenceRequest { max_occurrences: Some(0), ..daily_request() };
        assert_eq!(
            RecurrenceRule::try_from(zero_max),
            Err(ValidationError::InvalidMaxOccurrences(0))
        );
    }

    #[test]
    fn test_rule_converts_back_to_request() {
        let request = RecurrenceRequest {
            frequency: Some(FrequencyKind::Weekly),
            interval_value: Some(2),
            start_date: Some(date(2025, 1, 6)),
            end_date: Some(date(2025, 6, 30)),
            days_of_week: Some([Weekday::Mon, Weekday::Thu].into_iter().collect()),
            day_of_month: None,
            max_occurrences: Some(10),
        };
        let rule = RecurrenceRule::try_from(request.clone()).unwrap();
        assert_eq!(RecurrenceRequest::from(&rule), request);
    }

    #[test]
    fn test_request_deserializes_from_camel_case() {
        let yaml = r#"
frequency: WEEKLY
intervalValue: 1
startDate: 2025-01-06
daysOfWeek: [MONDAY, WEDNESDAY]
maxOccurrences: 4
"#;
        let request: RecurrenceRequest = serde_yaml::from_str(yaml).unwrap();
        let rule = RecurrenceRule::try_from(request).unwrap();
        assert_eq!(rule.max_occurrences.map(NonZeroU32::get), Some(4));
        assert_eq!(rule.frequency.kind(), FrequencyKind::Weekly);
    }

    #[test]
    fn test_complete_by_max_occurrences() {
        let mut pattern = daily_pattern(Some(2), None);
        assert_eq!(pattern.status(), PatternStatus::Active);
        pattern.advance(date(2025, 1, 1));
        assert!(!pattern.is_complete());
        pattern.advance(date(2025, 1, 2));
        assert!(pattern.is_complete());
        assert_eq!(pattern.status(), PatternStatus::Complete);
    }

    #[test]
    fn test_complete_by_end_date() {
        let mut pattern = daily_pattern(None, Some(date(2025, 1, 2)));
        assert!(!pattern.is_complete());
        pattern.advance(date(2025, 1, 1));
        assert!(!pattern.is_complete());
        pattern.advance(date(2025, 1, 2));
        assert!(pattern.is_complete());
    }

    #[test]
    fn test_due_occurrence() {
        let pattern = daily_pattern(None, None);
        assert_eq!(pattern.due_occurrence(date(2024, 12, 31)).unwrap(), None);
        assert_eq!(
            pattern.due_occurrence(date(2025, 1, 1)).unwrap(),
            Some(date(2025, 1, 1))
        );

        let mut advanced = pattern.clone();
        advanced.advance(date(2025, 1, 1));
        assert_eq!(advanced.due_occurrence(date(2025, 1, 1)).unwrap(), None);
        assert_eq!(
            advanced.due_occurrence(date(2025, 1, 9)).unwrap(),
            Some(date(2025, 1, 2))
        );
    }

    #[test]
    fn test_not_due_past_end_date() {
        let mut request = daily_request();
        request.interval_value = Some(5);
        request.end_date = Some(date(2025, 1, 5));
        let rule = RecurrenceRule::try_from(request).unwrap();
        let mut pattern = RecurrencePattern::new(TaskId::new(), UserId::new(), rule);
        pattern.advance(date(2025, 1, 3));

        // Jan 8 would be next, beyond the end date
        assert!(!pattern.is_complete());
        assert_eq!(pattern.due_occurrence(date(2025, 2, 1)).unwrap(), None);
    }

    #[test]
    fn test_update_rule_keeps_progress() {
        let mut pattern = daily_pattern(Some(5), None);
        pattern.advance(date(2025, 1, 1));
        pattern.advance(date(2025, 1, 2));
        pattern.advance(date(2025, 1, 3));

        let lowered = RecurrenceRule::try_from(RecurrenceRequest {
            max_occurrences: Some(2),
            ..daily_request()
        })
        .unwrap();
        assert_eq!(
            pattern.update_rule(lowered),
            Err(ValidationError::MaxOccurrencesBelowGenerated { max: 2, generated: 3 })
        );

        let every_other_day = RecurrenceRule::try_from(RecurrenceRequest {
            interval_value: Some(2),
            ..daily_request()
        })
        .unwrap();
        pattern.update_rule(every_other_day).unwrap();
        assert_eq!(pattern.generated_count, 3);
        assert_eq!(pattern.last_generated_date, Some(date(2025, 1, 3)));
        assert_eq!(pattern.next_occurrence().unwrap(), date(2025, 1, 5));
    }

    #[test]
    fn test_update_rule_rejects_start_after_progress() {
        let mut pattern = daily_pattern(None, None);
        pattern.advance(date(2025, 1, 1));

        let moved = RecurrenceRule::try_from(RecurrenceRequest {
            start_date: Some(date(2025, 3, 1)),
            ..daily_request()
        })
        .unwrap();
        assert_eq!(
            pattern.update_rule(moved),
            Err(ValidationError::StartAfterLastGenerated {
                start: date(2025, 3, 1),
                last: date(2025, 1, 1),
            })
        );
        assert_eq!(pattern.rule.start_date, date(2025, 1, 1));
        assert_eq!(pattern.next_occurrence().unwrap(), date(2025, 1, 2));

        // Moving the start up to the last generated date keeps it computable
        let same_day = RecurrenceRule::try_from(RecurrenceRequest {
            start_date: Some(date(2025, 1, 1)),
            interval_value: Some(3),
            ..daily_request()
        })
        .unwrap();
        pattern.update_rule(same_day).unwrap();
        assert_eq!(pattern.next_occurrence().unwrap(), date(2025, 1, 4));
    }

    #[test]
    fn test_unstarted_pattern_may_move_its_start() {
        let mut pattern = daily_pattern(None, None);
        let later = RecurrenceRule::try_from(RecurrenceRequest {
            start_date: Some(date(2025, 3, 1)),
            ..daily_request()
        })
        .unwrap();
        pattern.update_rule(later).unwrap();
        assert_eq!(pattern.next_occurrence().unwrap(), date(2025, 3, 1));
    }
}
