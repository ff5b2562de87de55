// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the recurrence engine, following the DDD
//! Repository pattern: interfaces live in the domain layer and are implemented
//! in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | PostgreSQL implementation |
//! |-------|-----------|---------------------------|
//! | `RecurrencePatternRepository` | `RecurrencePattern` | `PostgresRecurrencePatternRepository` |
//! | `TaskRepository` | `Task` | `PostgresTaskRepository` |
//! | `RecurrenceUnitOfWork` | progress + generated task | `PostgresRecurrenceUnitOfWork` |
//!
//! `InMemoryRecurrenceStore` implements all three over one shared state.
//!
//! ## Atomic advancement
//!
//! Generating an instance touches two aggregates: the pattern's progress
//! fields and a brand-new task. [`RecurrenceUnitOfWork::begin`] opens a
//! [`RecurrenceTransaction`] in which the coordinator first performs the
//! compare-and-advance (the only guard against concurrent ticks) and then asks
//! the task factory for the instance. Either both writes commit or neither.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::recurrence::{PatternId, RecurrencePattern, ValidationError};
use crate::domain::task::{Task, TaskId, UserId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository interface for RecurrencePattern aggregates
#[async_trait]
pub trait RecurrencePatternRepository: Send + Sync {
    /// Save pattern (create or update).
    ///
    /// An update replaces the rule only; `generated_count` and
    /// `last_generated_date` of a stored pattern change exclusively through
    /// [`RecurrenceTransaction::compare_and_advance`]. The new rule is checked
    /// against the stored progress atomically with the write
    /// ([`ensure_rule_fits_progress`](crate::domain::recurrence::ensure_rule_fits_progress));
    /// a rule that no longer fits fails with [`RepositoryError::Validation`].
    async fn save(&self, pattern: &RecurrencePattern) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PatternId) -> Result<Option<RecurrencePattern>, RepositoryError>;

    /// Find the pattern governing a template task
    async fn find_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<RecurrencePattern>, RepositoryError>;

    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError>;

    /// Patterns of a user that are not complete and whose end date (if any)
    /// has not passed as of `today`
    async fn find_active_by_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError>;

    /// Patterns owing an occurrence on or before `today`, ordered by start date
    /// then id.
    ///
    /// Patterns whose next occurrence cannot be computed are included so the
    /// coordinator can raise them as malformed.
    async fn find_due_patterns(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError>;

    async fn delete(&self, id: PatternId) -> Result<(), RepositoryError>;

    /// Delete the pattern of a template task, if there is one
    async fn delete_by_task(&self, task_id: TaskId) -> Result<(), RepositoryError>;
}

/// Repository interface for Task aggregates
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;

    /// Instances generated from a pattern, ordered by due date
    async fn find_instances_of(&self, pattern_id: PatternId) -> Result<Vec<Task>, RepositoryError>;

    /// Delete a task; its recurrence pattern (if any) goes with it
    async fn delete(&self, id: TaskId) -> Result<(), RepositoryError>;
}

/// Opens transactions spanning pattern progress and task creation
#[async_trait]
pub trait RecurrenceUnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RecurrenceTransaction>, RepositoryError>;
}

/// One pattern advancement. Dropping without `commit` discards all writes.
#[async_trait]
pub trait RecurrenceTransaction: Send {
    /// Set `last_generated_date = new_last` and increment `generated_count`,
    /// but only if `last_generated_date` still equals `expected_last` and the
    /// pattern has budget left. Returns `false` when another worker got there
    /// first or the pattern is gone.
    async fn compare_and_advance(
        &mut self,
        pattern_id: PatternId,
        expected_last: Option<NaiveDate>,
        new_last: NaiveDate,
    ) -> Result<bool, RepositoryError>;

    /// Task factory: create an instance of `template_task_id` due on
    /// `due_date`, linked back to `pattern_id`
    async fn create_instance(
        &mut self,
        template_task_id: TaskId,
        pattern_id: PatternId,
        due_date: NaiveDate,
    ) -> Result<TaskId, RepositoryError>;

    async fn commit(&mut self) -> Result<(), RepositoryError>;

    async fn rollback(&mut self) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction already finished")]
    TransactionClosed,

    /// The write would contradict state only the store can see
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
