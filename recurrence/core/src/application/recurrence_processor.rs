// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Recurrence Processor - periodic trigger for instance generation
//!
//! Calls [`RecurrenceService::process_pending_recurrences`] on a fixed
//! interval until cancelled. A tick always runs to completion; cancellation is
//! observed between ticks.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Background scheduling of the recurrence coordinator

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::recurrence_service::RecurrenceService;
use crate::domain::engine_config::RecurrenceConfig;

/// Configuration for the recurrence processor
#[derive(Debug, Clone)]
pub struct RecurrenceProcessorConfig {
    /// How often to run a tick (in seconds)
    pub interval_seconds: u64,

    /// Whether the processor runs at all
    pub enabled: bool,
}

impl Default for RecurrenceProcessorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60, // Once a minute
            enabled: true,
        }
    }
}

impl From<&RecurrenceConfig> for RecurrenceProcessorConfig {
    fn from(config: &RecurrenceConfig) -> Self {
        Self {
            interval_seconds: config.interval_seconds,
            enabled: config.enabled,
        }
    }
}

pub struct RecurrenceProcessor {
    service: Arc<dyn RecurrenceService>,
    config: RecurrenceProcessorConfig,
    shutdown_token: CancellationToken,
}

impl RecurrenceProcessor {
    pub fn new(service: Arc<dyn RecurrenceService>, config: RecurrenceProcessorConfig) -> Self {
        Self {
            service,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the processor background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the processor loop until the shutdown token fires
    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Recurrence processor is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            "Starting recurrence processor background task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        // A slow tick must not cause a burst of catch-up ticks
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping recurrence processor");
                    break;
                }
                _ = tick.tick() => {
                    debug!("Running recurrence processor cycle");
                    self.tick().await;
                }
            }
        }

        info!("Recurrence processor background task stopped");
    }

    /// Execute a single cycle; failures are logged and the loop keeps going
    pub async fn tick(&self) -> Option<usize> {
        match self.service.process_pending_recurrences().await {
            Ok(generated) => {
                debug!(generated, "Recurrence processor cycle completed");
                Some(generated)
            }
            Err(e) => {
                warn!("Recurrence processor cycle failed: {:#}", e);
                None
            }
        }
    }
}
