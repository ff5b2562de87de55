// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Recurrence Pattern Repository
//!
//! `RecurrencePatternRepository` and `RecurrenceUnitOfWork` backed by the
//! `recurrence_patterns` table. Rows are turned back into rules through
//! `RecurrenceRule::try_from`, so storage never bypasses validation.
//!
//! `days_of_week` is stored as comma-joined upper-case names
//! (`MONDAY,WEDNESDAY`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::error;
use uuid::Uuid;

use super::{is_active, is_due_or_malformed, sort_due};
use crate::domain::recurrence::{
    ensure_rule_fits_progress, Frequency, FrequencyKind, PatternId, RecurrencePattern,
    RecurrenceRequest, RecurrenceRule, WeekdaySet,
};
use crate::domain::repository::{
    RecurrencePatternRepository, RecurrenceTransaction, RecurrenceUnitOfWork, RepositoryError,
};
use crate::domain::events::RecurrenceEvent;
use crate::domain::task::{TaskId, UserId};
use crate::infrastructure::event_bus::EventBus;

const PATTERN_COLUMNS: &str = "id, task_id, user_id, frequency, interval_value, days_of_week, \
     day_of_month, start_date, end_date, max_occurrences, generated_count, last_generated_date, \
     created_at, updated_at";

pub struct PostgresRecurrencePatternRepository {
    pool: PgPool,
    event_bus: Option<EventBus>,
}

impl PostgresRecurrencePatternRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, event_bus: None }
    }

    /// Publish `PatternMalformed` for rows that can no longer be read
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    async fn fetch_many(
        &self,
        sql: &str,
        binds: PatternBinds,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let query = sqlx::query(sql);
        let query = match binds {
            PatternBinds::User(user_id) => query.bind(user_id.0),
            PatternBinds::UserAndDate(user_id, today) => query.bind(user_id.0).bind(today),
            PatternBinds::Date(today) => query.bind(today),
        };
        let rows = query.fetch_all(&self.pool).await?;

        let mut patterns = Vec::with_capacity(rows.len());
        for row in rows {
            match pattern_from_row(&row) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => self.report_unreadable(row.try_get("id").ok(), &e),
            }
        }
        Ok(patterns)
    }

    /// A row that fails to decode is skipped, never dropped silently
    fn report_unreadable(&self, id: Option<Uuid>, err: &RepositoryError) {
        error!(pattern_id = ?id, error = %err, "Skipping unreadable recurrence pattern row");
        if let (Some(id), Some(bus)) = (id, &self.event_bus) {
            bus.publish(RecurrenceEvent::PatternMalformed {
                pattern_id: PatternId(id),
                reason: err.to_string(),
                detected_at: Utc::now(),
            });
        }
    }

    /// Explain a skipped update by re-checking the rule against what is stored now
    async fn progress_conflict(&self, pattern: &RecurrencePattern) -> RepositoryError {
        let stored = match self.find_by_id(pattern.id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                return RepositoryError::NotFound(format!("Recurrence pattern {}", pattern.id))
            }
            Err(e) => return e,
        };
        let fits = ensure_rule_fits_progress(
            &pattern.rule,
            stored.generated_count,
            stored.last_generated_date,
        );
        match fits {
            Err(e) => RepositoryError::Validation(e),
            // Progress moved again between the write and the re-read
            Ok(()) => RepositoryError::Conflict(format!(
                "Recurrence pattern {} advanced while its rule was being updated",
                pattern.id
            )),
        }
    }
}

enum PatternBinds {
    User(UserId),
    UserAndDate(UserId, NaiveDate),
    Date(NaiveDate),
}

fn to_db_int(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Serialization(format!("{} out of range: {}", column, value)))
}

fn from_db_int(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Serialization(format!("{} is negative: {}", column, value)))
}

fn pattern_from_row(row: &PgRow) -> Result<RecurrencePattern, RepositoryError> {
    let frequency: String = row.try_get("frequency")?;
    let frequency = FrequencyKind::parse(&frequency)
        .ok_or_else(|| {
            RepositoryError::Serialization(format!("Unknown frequency: {}", frequency))
        })?;

    let days_of_week = row
        .try_get::<Option<String>, _>("days_of_week")?
        .map(|raw| raw.parse::<WeekdaySet>())
        .transpose()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    let request = RecurrenceRequest {
        frequency: Some(frequency),
        interval_value: Some(from_db_int(row.try_get("interval_value")?, "interval_value")?),
        start_date: Some(row.try_get("start_date")?),
        end_date: row.try_get("end_date")?,
        days_of_week,
        day_of_month: row
            .try_get::<Option<i32>, _>("day_of_month")?
            .map(|d| from_db_int(d, "day_of_month"))
            .transpose()?,
        max_occurrences: row
            .try_get::<Option<i32>, _>("max_occurrences")?
            .map(|m| from_db_int(m, "max_occurrences"))
            .transpose()?,
    };
    let rule = RecurrenceRule::try_from(request)
        .map_err(|e| RepositoryError::Serialization(format!("Stored rule is invalid: {}", e)))?;

    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(RecurrencePattern {
        id: PatternId(row.try_get("id")?),
        task_id: TaskId(row.try_get("task_id")?),
        user_id: UserId(row.try_get("user_id")?),
        rule,
        generated_count: from_db_int(row.try_get("generated_count")?, "generated_count")?,
        last_generated_date: row.try_get("last_generated_date")?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl RecurrencePatternRepository for PostgresRecurrencePatternRepository {
    async fn save(&self, pattern: &RecurrencePattern) -> Result<(), RepositoryError> {
        let rule = &pattern.rule;
        let (days_of_week, day_of_month) = match rule.frequency {
            Frequency::Daily => (None, None),
            Frequency::Weekly { days } => (Some(days.to_string()), None),
            Frequency::Monthly { day_of_month } => {
                (None, Some(to_db_int(day_of_month.get(), "day_of_month")?))
            }
        };
        let max_occurrences = rule
            .max_occurrences
            .map(|m| to_db_int(m.get(), "max_occurrences"))
            .transpose()?;

        // The rule is replaced only while it still fits the stored progress
        let result = sqlx::query(
            r#"
            INSERT INTO recurrence_patterns (
                id, task_id, user_id, frequency, interval_value, days_of_week,
                day_of_month, start_date, end_date, max_occurrences,
                generated_count, last_generated_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                frequency = EXCLUDED.frequency,
                interval_value = EXCLUDED.interval_value,
                days_of_week = EXCLUDED.days_of_week,
                day_of_month = EXCLUDED.day_of_month,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                max_occurrences = EXCLUDED.max_occurrences,
                updated_at = EXCLUDED.updated_at
            WHERE (EXCLUDED.max_occurrences IS NULL
                   OR recurrence_patterns.generated_count <= EXCLUDED.max_occurrences)
              AND (recurrence_patterns.last_generated_date IS NULL
                   OR EXCLUDED.start_date <= recurrence_patterns.last_generated_date)
            "#,
        )
        .bind(pattern.id.0)
        .bind(pattern.task_id.0)
        .bind(pattern.user_id.0)
        .bind(rule.frequency.kind().as_str())
        .bind(to_db_int(rule.interval.get(), "interval_value")?)
        .bind(days_of_week)
        .bind(day_of_month)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(max_occurrences)
        .bind(to_db_int(pattern.generated_count, "generated_count")?)
        .bind(pattern.last_generated_date)
        .bind(pattern.created_at)
        .bind(pattern.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!(
                    "Task {} already has a recurrence pattern",
                    pattern.task_id
                ))
            }
            other => {
                RepositoryError::Database(format!("Failed to save recurrence pattern: {}", other))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(self.progress_conflict(pattern).await);
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: PatternId,
    ) -> Result<Option<RecurrencePattern>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM recurrence_patterns WHERE id = $1",
            PATTERN_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(pattern_from_row).transpose()
    }

    async fn find_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<RecurrencePattern>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM recurrence_patterns WHERE task_id = $1",
            PATTERN_COLUMNS
        ))
        .bind(task_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(pattern_from_row).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM recurrence_patterns WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
            PATTERN_COLUMNS
        );
        self.fetch_many(&sql, PatternBinds::User(user_id)).await
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {} FROM recurrence_patterns
            WHERE user_id = $1
              AND (max_occurrences IS NULL OR generated_count < max_occurrences)
              AND (end_date IS NULL OR end_date >= $2)
            ORDER BY created_at ASC, id ASC
            "#,
            PATTERN_COLUMNS
        );
        let mut patterns = self.fetch_many(&sql, PatternBinds::UserAndDate(user_id, today)).await?;
        patterns.retain(|p| is_active(p, today));
        Ok(patterns)
    }

    async fn find_due_patterns(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        // Coarse filter in SQL, exact occurrence check in Rust
        let sql = format!(
            r#"
            SELECT {} FROM recurrence_patterns
            WHERE start_date <= $1
              AND (max_occurrences IS NULL OR generated_count < max_occurrences)
              AND (end_date IS NULL
                   OR last_generated_date IS NULL
                   OR last_generated_date < end_date)
            ORDER BY start_date ASC, id ASC
            "#,
            PATTERN_COLUMNS
        );
        let mut patterns = self.fetch_many(&sql, PatternBinds::Date(today)).await?;
        patterns.retain(|p| is_due_or_malformed(p, today));
        sort_due(&mut patterns);
        Ok(patterns)
    }

    async fn delete(&self, id: PatternId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM recurrence_patterns WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_task(&self, task_id: TaskId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM recurrence_patterns WHERE task_id = $1")
            .bind(task_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PostgresRecurrenceUnitOfWork {
    pool: PgPool,
}

impl PostgresRecurrenceUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecurrenceUnitOfWork for PostgresRecurrenceUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn RecurrenceTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresRecurrenceTransaction { tx: Some(tx) }))
    }
}

/// Dropping the inner `sqlx::Transaction` without commit rolls it back
struct PostgresRecurrenceTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresRecurrenceTransaction {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, RepositoryError> {
        self.tx.as_mut().ok_or(RepositoryError::TransactionClosed)
    }
}

#[async_trait]
impl RecurrenceTransaction for PostgresRecurrenceTransaction {
    async fn compare_and_advance(
        &mut self,
        pattern_id: PatternId,
        expected_last: Option<NaiveDate>,
        new_last: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            UPDATE recurrence_patterns
            SET last_generated_date = $3,
                generated_count = generated_count + 1,
                updated_at = NOW()
            WHERE id = $1
              AND last_generated_date IS NOT DISTINCT FROM $2
              AND (max_occurrences IS NULL OR generated_count < max_occurrences)
            "#,
        )
        .bind(pattern_id.0)
        .bind(expected_last)
        .bind(new_last)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_instance(
        &mut self,
        template_task_id: TaskId,
        pattern_id: PatternId,
        due_date: NaiveDate,
    ) -> Result<TaskId, RepositoryError> {
        let instance_id = TaskId::new();
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                id, user_id, description, priority, category_id,
                completed, due_date, recurrence_pattern_id, created_at
            )
            SELECT $1, user_id, description, priority, category_id,
                   FALSE, $2, $3, NOW()
            FROM tasks
            WHERE id = $4
            "#,
        )
        .bind(instance_id.0)
        .bind(due_date)
        .bind(pattern_id.0)
        .bind(template_task_id.0)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Template task {}", template_task_id)));
        }
        Ok(instance_id)
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self.tx.take().ok_or(RepositoryError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepositoryError> {
        let tx = self.tx.take().ok_or(RepositoryError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
