// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Task Repository
//!
//! `TaskRepository` over the `tasks` table. Deleting a task removes its
//! recurrence pattern through the `ON DELETE CASCADE` foreign key.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::recurrence::PatternId;
use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{CategoryId, Priority, Task, TaskId, UserId};

const TASK_COLUMNS: &str = "id, user_id, description, priority, category_id, completed, due_date, \
     recurrence_pattern_id, created_at";

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn task_from_row(row: &PgRow) -> Result<Task, RepositoryError> {
    let priority: String = row.try_get("priority")?;
    let priority = Priority::parse(&priority)
        .ok_or_else(|| RepositoryError::Serialization(format!("Unknown priority: {}", priority)))?;

    Ok(Task {
        id: TaskId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        description: row.try_get("description")?,
        priority,
        category_id: row.try_get::<Option<uuid::Uuid>, _>("category_id")?.map(CategoryId),
        completed: row.try_get("completed")?,
        due_date: row.try_get("due_date")?,
        recurrence_pattern_id: row
            .try_get::<Option<uuid::Uuid>, _>("recurrence_pattern_id")?
            .map(PatternId),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, user_id, description, priority, category_id,
                completed, due_date, recurrence_pattern_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                priority = EXCLUDED.priority,
                category_id = EXCLUDED.category_id,
                completed = EXCLUDED.completed,
                due_date = EXCLUDED.due_date
            "#,
        )
        .bind(task.id.0)
        .bind(task.user_id.0)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.category_id.map(|c| c.0))
        .bind(task.completed)
        .bind(task.due_date)
        .bind(task.recurrence_pattern_id.map(|p| p.0))
        .bind(task.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save task: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_instances_of(&self, pattern_id: PatternId) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE recurrence_pattern_id = $1 \
             ORDER BY due_date ASC, created_at ASC",
            TASK_COLUMNS
        ))
        .bind(pattern_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn delete(&self, id: TaskId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
