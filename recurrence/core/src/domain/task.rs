// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Task aggregate as seen by the recurrence engine.
//!
//! Only the fields a generated instance inherits from its template are modelled
//! here; comments, tags, shares and attachments belong to the wider backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::recurrence::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner of tasks and patterns (tenant boundary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub description: String,
    pub priority: Priority,
    pub category_id: Option<CategoryId>,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    /// Set on instances produced by the recurrence engine
    pub recurrence_pattern_id: Option<PatternId>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: UserId, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            user_id,
            description: description.into(),
            priority: Priority::default(),
            category_id: None,
            completed: false,
            due_date: None,
            recurrence_pattern_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Build the task instance for one occurrence of `pattern_id`.
    ///
    /// The instance inherits description, owner, priority and category from
    /// this template and starts out incomplete.
    pub fn instantiate(&self, pattern_id: PatternId, due_date: NaiveDate) -> Task {
        Task {
            id: TaskId::new(),
            user_id: self.user_id,
            description: self.description.clone(),
            priority: self.priority,
            category_id: self.category_id,
            completed: false,
            due_date: Some(due_date),
            recurrence_pattern_id: Some(pattern_id),
            created_at: Utc::now(),
        }
    }
}
