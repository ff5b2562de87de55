// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the recurrence service, its periodic processor and
//! repository wiring.

pub mod recurrence_processor;
pub mod recurrence_service;
pub mod repository_factory;

pub use recurrence_processor::{RecurrenceProcessor, RecurrenceProcessorConfig};
pub use recurrence_service::{
    GenerationOutcome, RecurrenceError, RecurrenceService, StandardRecurrenceService, TickReport,
};
