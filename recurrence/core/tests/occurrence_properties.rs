// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Property tests for the occurrence calculator: spacing, weekday membership,
//! month-end clamping and termination hold for arbitrary valid rules.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use proptest::prelude::*;

use todoapp_core::domain::occurrence::{last_day_of_month, next_occurrence, Occurrences};
use todoapp_core::domain::recurrence::{
    FrequencyKind, RecurrenceRequest, RecurrenceRule, WeekdaySet,
};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..45_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1990, 1, 1)
            .and_then(|base| base.checked_add_days(Days::new(offset)))
            .unwrap()
    })
}

fn any_weekdays() -> impl Strategy<Value = WeekdaySet> {
    (1u8..128).prop_map(|mask| {
        WEEK.iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, day)| *day)
            .collect()
    })
}

fn rule(request: RecurrenceRequest) -> RecurrenceRule {
    RecurrenceRule::try_from(request).unwrap()
}

fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

fn eligible(rule: &RecurrenceRule, date: NaiveDate, days: WeekdaySet) -> bool {
    let weeks = (week_monday(date) - week_monday(rule.start_date)).num_days() / 7;
    date >= rule.start_date
        && days.contains(date.weekday())
        && weeks % i64::from(rule.interval.get()) == 0
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

proptest! {
    /// Daily occurrences start on the start date and are exactly `interval` days apart.
    #[test]
    fn prop_daily_spacing(start in any_date(), interval in 1u32..60, count in 1usize..40) {
        let rule = rule(RecurrenceRequest {
            frequency: Some(FrequencyKind::Daily),
            interval_value: Some(interval),
            start_date: Some(start),
            ..Default::default()
        });

        let dates: Vec<NaiveDate> = Occurrences::new(&rule)

            .take(count)

            .collect::<Result<_, _>>()

            .unwrap();
        prop_assert_eq!(dates[0], start);
        for pair in dates.windows(2) {
            prop_assert_eq!((pair[1] - pair[0]).num_days(), i64::from(interval));
        }
    }

    /// Weekly occurrences land on selected weekdays of eligible weeks, and no
    /// eligible day between two consecutive occurrences is skipped.
    #[test]
    fn prop_weekly_membership(
        start in any_date(),
        interval in 1u32..6,
        days in any_weekdays(),
        count in 1usize..30
    ) {
        let rule = rule(RecurrenceRequest {
            frequency: Some(FrequencyKind::Weekly),
            interval_value: Some(interval),
            start_date: Some(start),
            days_of_week: Some(days),
            ..Default::default()
        });

        let dates: Vec<NaiveDate> = Occurrences::new(&rule)

            .take(count)

            .collect::<Result<_, _>>()

            .unwrap();

        // Nothing eligible between the start date and the first occurrence
        let mut day = start;
        while day < dates[0] {
            prop_assert!(!eligible(&rule, day, days), "skipped {} before first {}", day, dates[0]);
            day = day.succ_opt().unwrap();
        }

        for date in &dates {
            prop_assert!(eligible(&rule, *date, days), "{} is not eligible", date);
        }
        for pair in dates.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            let mut day = pair[0].succ_opt().unwrap();
            while day < pair[1] {
                prop_assert!(
                    !eligible(&rule, day, days),
                    "skipped {} between {} and {}",
                    day,
                    pair[0],
                    pair[1]
                );
                day = day.succ_opt().unwrap();
            }
        }
    }

    /// Monthly occurrences fall on the requested day clamped to the month
    /// length, `interval` months apart.
    #[test]
    fn prop_monthly_clamp(
        start in any_date(),
        interval in 1u32..13,
        day_of_month in 1u32..=31,
        count in 1usize..30
    ) {
        let rule = rule(RecurrenceRequest {
            frequency: Some(FrequencyKind::Monthly),
            interval_value: Some(interval),
            start_date: Some(start),
            day_of_month: Some(day_of_month),
            ..Default::default()
        });

        let dates: Vec<NaiveDate> = Occurrences::new(&rule)

            .take(count)

            .collect::<Result<_, _>>()

            .unwrap();
        prop_assert!(dates[0] >= start);
        prop_assert!(month_index(dates[0]) - month_index(start) <= 1);

        for date in &dates {
            let last = last_day_of_month(date.year(), date.month()).unwrap();
            prop_assert_eq!(date.day(), day_of_month.min(last));
        }
        for pair in dates.windows(2) {
            prop_assert_eq!(month_index(pair[1]) - month_index(pair[0]), i64::from(interval));
        }
    }

    /// Generation stops at max_occurrences and never passes the end date.
    #[test]
    fn prop_termination(
        start in any_date(),
        interval in 1u32..10,
        max in proptest::option::of(1u32..20),
        span in proptest::option::of(0u64..200)
    ) {
        let end = span.map(|days| start.checked_add_days(Days::new(days)).unwrap());
        let rule = rule(RecurrenceRequest {
            frequency: Some(FrequencyKind::Daily),
            interval_value: Some(interval),
            start_date: Some(start),
            end_date: end,
            max_occurrences: max,
            ..Default::default()
        });

        let dates: Vec<NaiveDate> = Occurrences::new(&rule)

            .take(500)

            .collect::<Result<_, _>>()

            .unwrap();
        if let Some(max) = max {
            prop_assert!(dates.len() <= max as usize);
        }
        if let Some(end) = end {
            prop_assert!(dates.iter().all(|d| *d <= end));
        }
        if max.is_none() && end.is_none() {
            prop_assert_eq!(dates.len(), 500);
        }
    }

    /// Every computed occurrence moves strictly forward and never precedes the start.
    #[test]
    fn prop_next_occurrence_moves_forward(
        start in any_date(),
        after in 0u64..400,
        interval in 1u32..8,
        days in any_weekdays()
    ) {
        let rule = rule(RecurrenceRequest {
            frequency: Some(FrequencyKind::Weekly),
            interval_value: Some(interval),
            start_date: Some(start),
            days_of_week: Some(days),
            ..Default::default()
        });
        let last = start.checked_add_days(Days::new(after)).unwrap();

        let next = next_occurrence(&rule, Some(last)).unwrap();
        prop_assert!(next > last);
        prop_assert!(next >= start);
    }
}
