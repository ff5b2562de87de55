// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the todoapp CLI

pub mod config;
pub mod daemon;
pub mod pattern;
pub mod tick;
pub mod update;

pub use self::config::ConfigCommand;
pub use self::pattern::PatternCommand;
pub use self::tick::TickArgs;
pub use self::update::UpdateCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;
use todoapp_core::domain::engine_config::EngineConfigManifest;

/// Load, override and validate the engine manifest
pub(crate) fn load_config(config_path: Option<PathBuf>) -> Result<EngineConfigManifest> {
    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}
