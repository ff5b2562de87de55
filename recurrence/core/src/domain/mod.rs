// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: recurrence rules, occurrence arithmetic, aggregates,
//! repository contracts and the engine manifest.

pub mod clock;
pub mod engine_config;
pub mod events;
pub mod occurrence;
pub mod recurrence;
pub mod repository;
pub mod task;
