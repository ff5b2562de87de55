// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! [`crate::domain::repository`].
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! - **PostgresRecurrencePatternRepository** - `recurrence_patterns` table
//! - **PostgresTaskRepository** - `tasks` table
//! - **PostgresRecurrenceUnitOfWork** - compare-and-advance plus instance
//!   insert in one database transaction
//!
//! ## In-Memory
//!
//! - **InMemoryRecurrenceStore** - one shared store implementing all three
//!   traits, for tests, previews and single-process deployments
//!
//! # Usage
//!
//! ```no_run
//! # async fn example(database_url: &str) -> anyhow::Result<()> {
//! use sqlx::PgPool;
//! use todoapp_core::infrastructure::repositories::PostgresRecurrencePatternRepository;
//! use todoapp_core::domain::repository::RecurrencePatternRepository;
//!
//! let pool = PgPool::connect(database_url).await?;
//! let repo = PostgresRecurrencePatternRepository::new(pool);
//! let due = repo.find_due_patterns(chrono::Utc::now().date_naive()).await?;
//! # Ok(())
//! # }
//! ```

pub mod postgres_recurrence;
pub mod postgres_task;

pub use postgres_recurrence::{PostgresRecurrencePatternRepository, PostgresRecurrenceUnitOfWork};
pub use postgres_task::PostgresTaskRepository;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::recurrence::{ensure_rule_fits_progress, PatternId, RecurrencePattern};
use crate::domain::repository::{
    RecurrencePatternRepository, RecurrenceTransaction, RecurrenceUnitOfWork, RepositoryError,
    TaskRepository,
};
use crate::domain::task::{Task, TaskId, UserId};

/// Orders due patterns by start date, then id
pub(crate) fn sort_due(patterns: &mut [RecurrencePattern]) {
    patterns.sort_by(|a, b| {
        a.rule
            .start_date
            .cmp(&b.rule.start_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// A pattern is selected when it owes an occurrence, or when its next
/// occurrence cannot be computed at all
pub(crate) fn is_due_or_malformed(pattern: &RecurrencePattern, today: NaiveDate) -> bool {
    !matches!(pattern.due_occurrence(today), Ok(None))
}

/// Active means not complete and not past its end date
pub(crate) fn is_active(pattern: &RecurrencePattern, today: NaiveDate) -> bool {
    !pattern.is_complete() && pattern.rule.end_date.is_none_or(|end| end >= today)
}

#[derive(Debug, Default)]
struct StoreState {
    patterns: HashMap<PatternId, RecurrencePattern>,
    tasks: HashMap<TaskId, Task>,
}

impl StoreState {
    fn remove_pattern(&mut self, id: PatternId) {
        self.patterns.remove(&id);
        // Instances outlive their pattern, unlinked
        for task in self.tasks.values_mut() {
            if task.recurrence_pattern_id == Some(id) {
                task.recurrence_pattern_id = None;
            }
        }
    }
}

/// Shared in-memory store for patterns and tasks.
///
/// Clones share state, so two services built over clones of one store behave
/// like two workers against one database.
#[derive(Clone, Default)]
pub struct InMemoryRecurrenceStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecurrenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }
}

#[async_trait]
impl RecurrencePatternRepository for InMemoryRecurrenceStore {
    async fn save(&self, pattern: &RecurrencePattern) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .patterns
            .values()
            .find(|p| p.task_id == pattern.task_id && p.id != pattern.id)
        {
            return Err(RepositoryError::Conflict(format!(
                "Task {} already has recurrence pattern {}",
                pattern.task_id, existing.id
            )));
        }
        let mut stored = pattern.clone();
        if let Some(existing) = state.patterns.get(&pattern.id) {
            ensure_rule_fits_progress(
                &pattern.rule,
                existing.generated_count,
                existing.last_generated_date,
            )?;
            stored.generated_count = existing.generated_count;
            stored.last_generated_date = existing.last_generated_date;
        }
        state.patterns.insert(pattern.id, stored);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: PatternId,
    ) -> Result<Option<RecurrencePattern>, RepositoryError> {
        Ok(self.state.lock().await.patterns.get(&id).cloned())
    }

    async fn find_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<RecurrencePattern>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.patterns.values().find(|p| p.task_id == task_id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let state = self.state.lock().await;
        let mut patterns: Vec<_> = state
            .patterns
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        patterns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(patterns)
    }

    async fn find_active_by_user(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let mut patterns = self.find_by_user(user_id).await?;
        patterns.retain(|p| is_active(p, today));
        Ok(patterns)
    }

    async fn find_due_patterns(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrencePattern>, RepositoryError> {
        let state = self.state.lock().await;
        let mut due: Vec<_> = state
            .patterns
            .values()
            .filter(|p| is_due_or_malformed(p, today))
            .cloned()
            .collect();
        sort_due(&mut due);
        Ok(due)
    }

    async fn delete(&self, id: PatternId) -> Result<(), RepositoryError> {
        self.state.lock().await.remove_pattern(id);
        Ok(())
    }

    async fn delete_by_task(&self, task_id: TaskId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let ids: Vec<_> = state
            .patterns
            .values()
            .filter(|p| p.task_id == task_id)
            .map(|p| p.id)
            .collect();
        for id in ids {
            state.remove_pattern(id);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryRecurrenceStore {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.state.lock().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn find_instances_of(&self, pattern_id: PatternId) -> Result<Vec<Task>, RepositoryError> {
        let state = self.state.lock().await;
        let mut instances: Vec<_> = state
            .tasks
            .values()
            .filter(|t| t.recurrence_pattern_id == Some(pattern_id))
            .cloned()
            .collect();
        instances.sort_by_key(|t| t.due_date);
        Ok(instances)
    }

    async fn delete(&self, id: TaskId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.tasks.remove(&id);
        let owned: Vec<_> = state
            .patterns
            .values()
            .filter(|p| p.task_id == id)
            .map(|p| p.id)
            .collect();
        for pattern_id in owned {
            state.remove_pattern(pattern_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RecurrenceUnitOfWork for InMemoryRecurrenceStore {
    async fn begin(&self) -> Result<Box<dyn RecurrenceTransaction>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            staged_patterns: HashMap::new(),
            staged_tasks: Vec::new(),
        }))
    }
}

/// Holds the store lock until commit or rollback; writes are staged and only
/// become visible on commit
struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<StoreState>>,
    staged_patterns: HashMap<PatternId, RecurrencePattern>,
    staged_tasks: Vec<Task>,
}

impl InMemoryTransaction {
    fn state(&self) -> Result<&StoreState, RepositoryError> {
        self.guard.as_deref().ok_or(RepositoryError::TransactionClosed)
    }

    fn current_pattern(&self, id: PatternId) -> Result<Option<RecurrencePattern>, RepositoryError> {
        if let Some(staged) = self.staged_patterns.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.state()?.patterns.get(&id).cloned())
    }
}

#[async_trait]
impl RecurrenceTransaction for InMemoryTransaction {
    async fn compare_and_advance(
        &mut self,
        pattern_id: PatternId,
        expected_last: Option<NaiveDate>,
        new_last: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let Some(mut pattern) = self.current_pattern(pattern_id)? else {
            return Ok(false);
        };
        let has_budget = pattern
            .rule
            .max_occurrences
            .is_none_or(|max| pattern.generated_count < max.get());
        if pattern.last_generated_date != expected_last || !has_budget {
            return Ok(false);
        }
        pattern.advance(new_last);
        self.staged_patterns.insert(pattern_id, pattern);
        Ok(true)
    }

    async fn create_instance(
        &mut self,
        template_task_id: TaskId,
        pattern_id: PatternId,
        due_date: NaiveDate,
    ) -> Result<TaskId, RepositoryError> {
        let template = self
            .state()?
            .tasks
            .get(&template_task_id)
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Template task {}", template_task_id))
            })?;
        let instance = template.instantiate(pattern_id, due_date);
        let id = instance.id;
        self.staged_tasks.push(instance);
        Ok(id)
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let mut guard = self.guard.take().ok_or(RepositoryError::TransactionClosed)?;
        for (id, pattern) in self.staged_patterns.drain() {
            guard.patterns.insert(id, pattern);
        }
        for task in self.staged_tasks.drain(..) {
            guard.tasks.insert(task.id, task);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepositoryError> {
        self.guard.take().ok_or(RepositoryError::TransactionClosed)?;
        self.staged_patterns.clear();
        self.staged_tasks.clear();
        Ok(())
    }
}
