// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Recurrence engine for the todo backend.
//!
//! Turns recurring tasks into concrete, dated task instances: validates
//! recurrence rules, computes occurrence dates, and on every tick generates at
//! most one instance per due pattern under an atomic compare-and-advance.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Layout:** `domain` (pure rules and contracts), `application`
//!   (service, processor, wiring), `infrastructure` (storage, event bus)

pub mod application;
pub mod domain;
pub mod infrastructure;
