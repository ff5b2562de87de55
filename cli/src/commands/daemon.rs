// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Foreground recurrence daemon
//!
//! Starts the [`RecurrenceProcessor`] against the configured storage and runs
//! until Ctrl+C or SIGTERM. In-flight ticks finish before the process exits.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use todoapp_core::application::repository_factory::create_recurrence_service;
use todoapp_core::application::{RecurrenceProcessor, RecurrenceProcessorConfig};
use todoapp_core::domain::engine_config::DatabaseBackend;
use todoapp_core::domain::events::RecurrenceEvent;
use todoapp_core::infrastructure::event_bus::{EventBus, EventBusError, EventReceiver};

use super::load_config;

pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    if config.spec.database.backend == DatabaseBackend::InMemory {
        println!(
            "{}",
            "WARNING: Using in-memory storage. Patterns are lost when the daemon exits."
                .yellow()
                .bold()
        );
    }

    if !config.spec.recurrence.enabled {
        warn!("Recurrence processing is disabled; the daemon will idle until stopped");
    }

    let event_bus = EventBus::with_default_capacity();
    let alerts = tokio::spawn(log_alerts(event_bus.subscribe()));

    let service = create_recurrence_service(&config, event_bus).await?;
    let processor = Arc::new(RecurrenceProcessor::new(
        service,
        RecurrenceProcessorConfig::from(&config.spec.recurrence),
    ));
    let shutdown = processor.shutdown_token();
    let handle = processor.start();

    info!(name = %config.metadata.name, "Recurrence daemon started");

    let signal_result = shutdown_signal().await;
    shutdown.cancel();
    handle.await.context("Recurrence processor task panicked")?;
    alerts.abort();

    info!("Recurrence daemon stopped");
    signal_result
}

/// Surface operational alerts published by the service
async fn log_alerts(mut receiver: EventReceiver) {
    loop {
        match receiver.recv().await {
            Ok(RecurrenceEvent::PatternMalformed {
                pattern_id, reason, ..
            }) => {
                error!(
                    pattern_id = %pattern_id,
                    reason = %reason,
                    "Recurrence pattern needs manual correction"
                );
            }
            Ok(RecurrenceEvent::PatternCompleted {
                pattern_id,
                generated_count,
                ..
            }) => {
                info!(pattern_id = %pattern_id, generated_count, "Recurrence pattern completed");
            }
            Ok(_) | Err(EventBusError::Lagged(_)) | Err(EventBusError::Empty) => continue,
            Err(EventBusError::Closed) => break,
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            info!("Received Ctrl+C signal");
            result
        },
        result = terminate => {
            info!("Received SIGTERM signal");
            result
        },
    }
}
