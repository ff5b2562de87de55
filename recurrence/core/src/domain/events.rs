// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Recurrence domain events, published on the
//! [`EventBus`](crate::infrastructure::event_bus::EventBus).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::recurrence::PatternId;
use crate::domain::task::{TaskId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceEvent {
    PatternCreated {
        pattern_id: PatternId,
        task_id: TaskId,
        user_id: UserId,
        created_at: DateTime<Utc>,
    },
    PatternUpdated {
        pattern_id: PatternId,
        updated_at: DateTime<Utc>,
    },
    PatternDeleted {
        pattern_id: PatternId,
        deleted_at: DateTime<Utc>,
    },
    InstanceGenerated {
        pattern_id: PatternId,
        template_task_id: TaskId,
        instance_id: TaskId,
        user_id: UserId,
        due_date: NaiveDate,
        generated_count: u32,
        generated_at: DateTime<Utc>,
    },
    PatternCompleted {
        pattern_id: PatternId,
        generated_count: u32,
        completed_at: DateTime<Utc>,
    },
    /// Operational alert: the pattern needs manual correction
    PatternMalformed {
        pattern_id: PatternId,
        reason: String,
        detected_at: DateTime<Utc>,
    },
    TickCompleted {
        today: NaiveDate,
        generated: usize,
        skipped: usize,
        failed: usize,
        malformed: usize,
        completed_at: DateTime<Utc>,
    },
}

impl RecurrenceEvent {
    pub fn pattern_id(&self) -> Option<PatternId> {
        match self {
            RecurrenceEvent::PatternCreated { pattern_id, .. }
            | RecurrenceEvent::PatternUpdated { pattern_id, .. }
            | RecurrenceEvent::PatternDeleted { pattern_id, .. }
            | RecurrenceEvent::InstanceGenerated { pattern_id, .. }
            | RecurrenceEvent::PatternCompleted { pattern_id, .. }
            | RecurrenceEvent::PatternMalformed { pattern_id, .. } => Some(*pattern_id),
            RecurrenceEvent::TickCompleted { .. } => None,
        }
    }
}
