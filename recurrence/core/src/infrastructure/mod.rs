// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: persistence adapters, connection pool and the event bus.

pub mod db;
pub mod event_bus;
pub mod repositories;
