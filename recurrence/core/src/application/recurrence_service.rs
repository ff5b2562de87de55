// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Recurrence Service - pattern management and instance generation
//!
//! Owns the recurrence coordinator: once per tick it asks the pattern store
//! for due patterns and advances each one in its own transaction
//! (compare-and-advance, then instance creation, then commit). A failure on
//! one pattern never stops the others.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Validated pattern CRUD, previews and the periodic tick

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::clock::Clock;
use crate::domain::events::RecurrenceEvent;
use crate::domain::occurrence::{OccurrenceError, Occurrences};
use crate::domain::recurrence::{
    PatternId, RecurrencePattern, RecurrenceRequest, RecurrenceRule, ValidationError,
};
use crate::domain::repository::{
    RecurrencePatternRepository, RecurrenceTransaction, RecurrenceUnitOfWork, RepositoryError,
    TaskRepository,
};
use crate::domain::task::{TaskId, UserId};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Error)]
pub enum RecurrenceError {
    #[error("Invalid recurrence pattern: {0}")]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Recurrence pattern not found: {0}")]
    PatternNotFound(PatternId),

    #[error("Task {0} already has a recurrence pattern")]
    AlreadyExists(TaskId),

    #[error("Malformed recurrence pattern: {0}")]
    Malformed(#[from] OccurrenceError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RecurrenceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // The store re-checks rules against progress it holds
            RepositoryError::Validation(e) => RecurrenceError::Validation(e),
            other => RecurrenceError::Repository(other),
        }
    }
}

/// Result of trying to advance a single pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated { instance_id: TaskId, due_date: NaiveDate },
    /// Nothing owed as of the given day
    NotDue,
    /// Another worker advanced the pattern first
    Conflict,
}

/// Per-tick totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub today: Option<NaiveDate>,
    pub due: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub malformed: usize,
}

#[async_trait]
pub trait RecurrenceService: Send + Sync {
    /// Attach a recurrence rule to an existing task
    async fn create_pattern(
        &self,
        task_id: TaskId,
        request: RecurrenceRequest,
    ) -> Result<RecurrencePattern, RecurrenceError>;

    /// Replace the rule of a pattern, keeping its progress
    async fn update_pattern(
        &self,
        pattern_id: PatternId,
        request: RecurrenceRequest,
    ) -> Result<RecurrencePattern, RecurrenceError>;

    async fn delete_pattern(&self, pattern_id: PatternId) -> Result<(), RecurrenceError>;

    async fn get_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<RecurrencePattern>, RecurrenceError>;

    async fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RecurrenceError>;

    async fn list_active_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RecurrenceError>;

    /// Upcoming occurrence dates after the pattern's current progress
    async fn preview(
        &self,
        pattern_id: PatternId,
        count: usize,
    ) -> Result<Vec<NaiveDate>, RecurrenceError>;

    /// Generate at most one instance of `pattern` as of `today`
    async fn generate_next_instance(
        &self,
        pattern: &RecurrencePattern,
        today: NaiveDate,
    ) -> Result<GenerationOutcome, RecurrenceError>;

    /// One tick against the configured clock; returns the number of
    /// instances generated
    async fn process_pending_recurrences(&self) -> anyhow::Result<usize>;

    /// One tick as of `today`
    async fn run_tick(&self, today: NaiveDate) -> Result<TickReport, RecurrenceError>;
}

pub struct StandardRecurrenceService {
    patterns: Arc<dyn RecurrencePatternRepository>,
    tasks: Arc<dyn TaskRepository>,
    unit_of_work: Arc<dyn RecurrenceUnitOfWork>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl StandardRecurrenceService {
    pub fn new(
        patterns: Arc<dyn RecurrencePatternRepository>,
        tasks: Arc<dyn TaskRepository>,
        unit_of_work: Arc<dyn RecurrenceUnitOfWork>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            patterns,
            tasks,
            unit_of_work,
            event_bus,
            clock,
        }
    }

    async fn find_pattern(
        &self,
        pattern_id: PatternId,
    ) -> Result<RecurrencePattern, RecurrenceError> {
        self.patterns
            .find_by_id(pattern_id)
            .await?
            .ok_or(RecurrenceError::PatternNotFound(pattern_id))
    }

    /// Runs the compare-and-advance and the insert inside `tx`. The caller
    /// commits or rolls back.
    async fn advance_in(
        tx: &mut Box<dyn RecurrenceTransaction>,
        pattern: &RecurrencePattern,
        due_date: NaiveDate,
    ) -> Result<Option<TaskId>, RepositoryError> {
        if !tx
            .compare_and_advance(pattern.id, pattern.last_generated_date, due_date)
            .await?
        {
            return Ok(None);
        }
        let instance_id = tx.create_instance(pattern.task_id, pattern.id, due_date).await?;
        Ok(Some(instance_id))
    }

    fn report_malformed(&self, pattern: &RecurrencePattern, reason: &OccurrenceError) {
        error!(
            pattern_id = %pattern.id,
            task_id = %pattern.task_id,
            error = %reason,
            "Recurrence pattern is malformed and needs manual correction"
        );
        self.event_bus.publish(RecurrenceEvent::PatternMalformed {
            pattern_id: pattern.id,
            reason: reason.to_string(),
            detected_at: Utc::now(),
        });
    }
}

#[async_trait]
impl RecurrenceService for StandardRecurrenceService {
    async fn create_pattern(
        &self,
        task_id: TaskId,
        request: RecurrenceRequest,
    ) -> Result<RecurrencePattern, RecurrenceError> {
        let rule = RecurrenceRule::try_from(request)?;

        let task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(RecurrenceError::TaskNotFound(task_id))?;

        if self.patterns.find_by_task(task_id).await?.is_some() {
            return Err(RecurrenceError::AlreadyExists(task_id));
        }

        let pattern = RecurrencePattern::new(task.id, task.user_id, rule);
        self.patterns.save(&pattern).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => RecurrenceError::AlreadyExists(task_id),
            other => other.into(),
        })?;

        info!(
            pattern_id = %pattern.id,
            task_id = %task_id,
            frequency = %rule.frequency.kind(),
            "Created recurrence pattern"
        );
        self.event_bus.publish(RecurrenceEvent::PatternCreated {
            pattern_id: pattern.id,
            task_id,
            user_id: pattern.user_id,
            created_at: pattern.created_at,
        });

        Ok(pattern)
    }

    async fn update_pattern(
        &self,
        pattern_id: PatternId,
        request: RecurrenceRequest,
    ) -> Result<RecurrencePattern, RecurrenceError> {
        let rule = RecurrenceRule::try_from(request)?;
        let mut pattern = self.find_pattern(pattern_id).await?;
        pattern.update_rule(rule)?;
        self.patterns.save(&pattern).await?;

        info!(pattern_id = %pattern_id, "Updated recurrence pattern");
        self.event_bus.publish(RecurrenceEvent::PatternUpdated {
            pattern_id,
            updated_at: pattern.updated_at,
        });

        Ok(pattern)
    }

    async fn delete_pattern(&self, pattern_id: PatternId) -> Result<(), RecurrenceError> {
        self.find_pattern(pattern_id).await?;
        self.patterns.delete(pattern_id).await?;

        info!(pattern_id = %pattern_id, "Deleted recurrence pattern");
        self.event_bus.publish(RecurrenceEvent::PatternDeleted {
            pattern_id,
            deleted_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<RecurrencePattern>, RecurrenceError> {
        Ok(self.patterns.find_by_task(task_id).await?)
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RecurrenceError> {
        Ok(self.patterns.find_by_user(user_id).await?)
    }

    async fn list_active_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RecurrenceError> {
        Ok(self
            .patterns
            .find_active_by_user(user_id, self.clock.today())
            .await?)
    }

    async fn preview(
        &self,
        pattern_id: PatternId,
        count: usize,
    ) -> Result<Vec<NaiveDate>, RecurrenceError> {
        let pattern = self.find_pattern(pattern_id).await?;
        let dates = Occurrences::resume(
            &pattern.rule,
            pattern.last_generated_date,
            pattern.generated_count,
        )
        .take(count)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    async fn generate_next_instance(
        &self,
        pattern: &RecurrencePattern,
        today: NaiveDate,
    ) -> Result<GenerationOutcome, RecurrenceError> {
        // Re-verify against the snapshot; selection may be stale
        let Some(due_date) = pattern.due_occurrence(today)? else {
            debug!(pattern_id = %pattern.id, "Pattern no longer due, skipping");
            return Ok(GenerationOutcome::NotDue);
        };

        let mut tx = self.unit_of_work.begin().await?;
        let instance_id = match Self::advance_in(&mut tx, pattern, due_date).await {
            Ok(Some(instance_id)) => instance_id,
            Ok(None) => {
                tx.rollback().await?;
                debug!(
                    pattern_id = %pattern.id,
                    "Pattern advanced by another worker, skipping"
                );
                return Ok(GenerationOutcome::Conflict);
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(pattern_id = %pattern.id, error = %rollback_err, "Rollback failed");
                }
                return Err(e.into());
            }
        };
        tx.commit().await?;

        let mut advanced = pattern.clone();
        advanced.advance(due_date);

        info!(
            pattern_id = %pattern.id,
            instance_id = %instance_id,
            due_date = %due_date,
            generated_count = advanced.generated_count,
            "Generated recurring task instance"
        );
        self.event_bus.publish(RecurrenceEvent::InstanceGenerated {
            pattern_id: pattern.id,
            template_task_id: pattern.task_id,
            instance_id,
            user_id: pattern.user_id,
            due_date,
            generated_count: advanced.generated_count,
            generated_at: Utc::now(),
        });

        if advanced.is_complete() {
            info!(
                pattern_id = %pattern.id,
                generated_count = advanced.generated_count,
                "Recurrence pattern completed"
            );
            self.event_bus.publish(RecurrenceEvent::PatternCompleted {
                pattern_id: pattern.id,
                generated_count: advanced.generated_count,
                completed_at: Utc::now(),
            });
        }

        Ok(GenerationOutcome::Generated { instance_id, due_date })
    }

    async fn process_pending_recurrences(&self) -> anyhow::Result<usize> {
        let today = self.clock.today();
        let report = self
            .run_tick(today)
            .await
            .with_context(|| format!("Recurrence tick for {} failed", today))?;
        Ok(report.generated)
    }

    async fn run_tick(&self, today: NaiveDate) -> Result<TickReport, RecurrenceError> {
        let due = self.patterns.find_due_patterns(today).await?;
        let mut report = TickReport {
            today: Some(today),
            due: due.len(),
            ..Default::default()
        };

        for pattern in &due {
            match self.generate_next_instance(pattern, today).await {
                Ok(GenerationOutcome::Generated { .. }) => report.generated += 1,
                Ok(GenerationOutcome::NotDue | GenerationOutcome::Conflict) => report.skipped += 1,
                Err(RecurrenceError::Malformed(reason)) => {
                    self.report_malformed(pattern, &reason);
                    report.malformed += 1;
                }
                Err(e) => {
                    error!(
                        pattern_id = %pattern.id,
                        error = %e,
                        "Failed to generate recurring task instance"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            today = %today,
            due = report.due,
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failed,
            malformed = report.malformed,
            "Recurrence tick completed"
        );
        self.event_bus.publish(RecurrenceEvent::TickCompleted {
            today,
            generated: report.generated,
            skipped: report.skipped,
            failed: report.failed,
            malformed: report.malformed,
            completed_at: Utc::now(),
        });

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::recurrence::FrequencyKind;
    use crate::domain::task::Task;
    use crate::infrastructure::repositories::InMemoryRecurrenceStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service(store: &InMemoryRecurrenceStore, today: NaiveDate) -> StandardRecurrenceService {
        StandardRecurrenceService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            EventBus::new(64),
            Arc::new(FixedClock(today)),
        )
    }

    fn daily(start: NaiveDate) -> RecurrenceRequest {
        RecurrenceRequest {
            frequency: Some(FrequencyKind::Daily),
            interval_value: Some(1),
            start_date: Some(start),
            ..Default::default()
        }
    }

    async fn template(store: &InMemoryRecurrenceStore) -> Task {
        let task = Task::new(UserId::new(), "Check the mailbox");
        TaskRepository::save(store, &task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_create_pattern_validates_and_links_task() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 1));
        let task = template(&store).await;

        let invalid = RecurrenceRequest {
            interval_value: Some(0),
            ..daily(date(2025, 1, 1))
        };
        assert!(matches!(
            svc.create_pattern(task.id, invalid).await,
            Err(RecurrenceError::Validation(ValidationError::InvalidInterval(0)))
        ));

        let pattern = svc.create_pattern(task.id, daily(date(2025, 1, 1))).await.unwrap();
        assert_eq!(pattern.task_id, task.id);
        assert_eq!(pattern.user_id, task.user_id);
        assert_eq!(svc.get_by_task(task.id).await.unwrap(), Some(pattern));

        assert!(matches!(
            svc.create_pattern(task.id, daily(date(2025, 1, 1))).await,
            Err(RecurrenceError::AlreadyExists(_))
        ));
        assert!(matches!(
            svc.create_pattern(TaskId::new(), daily(date(2025, 1, 1))).await,
            Err(RecurrenceError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_pattern_rejects_max_below_generated() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 3));
        let task = template(&store).await;
        let pattern = svc.create_pattern(task.id, daily(date(2025, 1, 1))).await.unwrap();

        for day in 1..=3 {
            let current = svc.get_by_task(task.id).await.unwrap().unwrap();
            svc.generate_next_instance(&current, date(2025, 1, day)).await.unwrap();
        }

        let lowered = RecurrenceRequest {
            max_occurrences: Some(2),
            ..daily(date(2025, 1, 1))
        };
        assert!(matches!(
            svc.update_pattern(pattern.id, lowered).await,
            Err(RecurrenceError::Validation(
                ValidationError::MaxOccurrencesBelowGenerated { max: 2, generated: 3 }
            ))
        ));

        let every_other_day = RecurrenceRequest {
            interval_value: Some(2),
            ..daily(date(2025, 1, 1))
        };
        let updated = svc.update_pattern(pattern.id, every_other_day).await.unwrap();
        assert_eq!(updated.generated_count, 3);
        assert_eq!(updated.rule.interval.get(), 2);
    }

    #[tokio::test]
    async fn test_update_pattern_cannot_move_start_past_generated_dates() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 1));
        let task = template(&store).await;
        let pattern = svc.create_pattern(task.id, daily(date(2025, 1, 1))).await.unwrap();
        svc.generate_next_instance(&pattern, date(2025, 1, 1)).await.unwrap();

        assert!(matches!(
            svc.update_pattern(pattern.id, daily(date(2025, 3, 1))).await,
            Err(RecurrenceError::Validation(ValidationError::StartAfterLastGenerated { .. }))
        ));
        let stored = svc.get_by_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.rule.start_date, date(2025, 1, 1));
    }

    #[test]
    fn test_store_validation_surfaces_as_validation_error() {
        let err = RecurrenceError::from(RepositoryError::Validation(
            ValidationError::MaxOccurrencesBelowGenerated { max: 1, generated: 2 },
        ));
        assert!(matches!(err, RecurrenceError::Validation(_)));
        assert!(matches!(
            RecurrenceError::from(RepositoryError::Conflict("busy".to_string())),
            RecurrenceError::Repository(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_starts_after_progress() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 1));
        let task = template(&store).await;
        let request = RecurrenceRequest {
            max_occurrences: Some(3),
            ..daily(date(2025, 1, 1))
        };
        let pattern = svc.create_pattern(task.id, request).await.unwrap();

        assert_eq!(
            svc.preview(pattern.id, 10).await.unwrap(),
            vec![date(2025, 1, 1), date(2025, 1, 2), date(2025, 1, 3)]
        );

        svc.generate_next_instance(&pattern, date(2025, 1, 1)).await.unwrap();
        assert_eq!(
            svc.preview(pattern.id, 1).await.unwrap(),
            vec![date(2025, 1, 2)]
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_a_conflict() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 5));
        let task = template(&store).await;
        let snapshot = svc.create_pattern(task.id, daily(date(2025, 1, 1))).await.unwrap();

        let first = svc.generate_next_instance(&snapshot, date(2025, 1, 5)).await.unwrap();
        assert!(matches!(
            first,
            GenerationOutcome::Generated { due_date, .. } if due_date == date(2025, 1, 1)
        ));

        let second = svc.generate_next_instance(&snapshot, date(2025, 1, 5)).await.unwrap();
        assert_eq!(second, GenerationOutcome::Conflict);
        assert_eq!(store.find_instances_of(snapshot.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_pattern_publishes_event() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 1));
        let mut events = svc.event_bus.subscribe();
        let task = template(&store).await;
        let pattern = svc.create_pattern(task.id, daily(date(2025, 1, 1))).await.unwrap();

        svc.delete_pattern(pattern.id).await.unwrap();
        assert!(svc.get_by_task(task.id).await.unwrap().is_none());
        assert!(matches!(
            svc.delete_pattern(pattern.id).await,
            Err(RecurrenceError::PatternNotFound(_))
        ));

        let published = events.drain();
        assert!(matches!(published[0], RecurrenceEvent::PatternCreated { .. }));
        assert!(matches!(published[1], RecurrenceEvent::PatternDeleted { .. }));
    }

    #[tokio::test]
    async fn test_list_active_by_user_hides_complete_patterns() {
        let store = InMemoryRecurrenceStore::new();
        let svc = service(&store, date(2025, 1, 10));
        let user = UserId::new();

        let once = Task::new(user, "One-off");
        let ongoing = Task::new(user, "Ongoing");
        TaskRepository::save(&store, &once).await.unwrap();
        TaskRepository::save(&store, &ongoing).await.unwrap();

        let single = svc
            .create_pattern(
                once.id,
                RecurrenceRequest {
                    max_occurrences: Some(1),
                    ..daily(date(2025, 1, 1))
                },
            )
            .await
            .unwrap();
        svc.create_pattern(ongoing.id, daily(date(2025, 1, 1))).await.unwrap();
        svc.generate_next_instance(&single, date(2025, 1, 10)).await.unwrap();

        assert_eq!(svc.list_by_user(user).await.unwrap().len(), 2);
        let active = svc.list_active_by_user(user).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].task_id, ongoing.id);
    }
}
