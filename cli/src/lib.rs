// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Todoapp CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers behind the `todoapp` binary

pub mod commands;
