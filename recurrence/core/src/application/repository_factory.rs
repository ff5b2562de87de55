// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the storage backend
//! configuration, keeping the domain layer free of infrastructure choices.
//!
//! The in-memory backend hands out one shared [`InMemoryRecurrenceStore`] for
//! all three contracts so transactions see the same data the repositories do.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use crate::application::recurrence_service::StandardRecurrenceService;
use crate::domain::clock::SystemClock;
use crate::domain::engine_config::EngineConfigManifest;
use crate::domain::repository::{
    RecurrencePatternRepository, RecurrenceUnitOfWork, StorageBackend, TaskRepository,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::{
    InMemoryRecurrenceStore, PostgresRecurrencePatternRepository, PostgresRecurrenceUnitOfWork,
    PostgresTaskRepository,
};

/// The persistence ports the recurrence service needs
#[derive(Clone)]
pub struct RecurrenceRepositories {
    pub patterns: Arc<dyn RecurrencePatternRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub unit_of_work: Arc<dyn RecurrenceUnitOfWork>,
}

impl RecurrenceRepositories {
    pub fn in_memory(store: InMemoryRecurrenceStore) -> Self {
        Self {
            patterns: Arc::new(store.clone()),
            tasks: Arc::new(store.clone()),
            unit_of_work: Arc::new(store),
        }
    }

    pub fn postgres(pool: PgPool, event_bus: EventBus) -> Self {
        let patterns =
            PostgresRecurrencePatternRepository::new(pool.clone()).with_event_bus(event_bus);
        Self {
            patterns: Arc::new(patterns),
            tasks: Arc::new(PostgresTaskRepository::new(pool.clone())),
            unit_of_work: Arc::new(PostgresRecurrenceUnitOfWork::new(pool)),
        }
    }
}

/// Creates the repositories for the configured backend, connecting to
/// PostgreSQL when required. Rows the store cannot decode are reported on
/// `event_bus`.
pub async fn create_repositories(
    backend: &StorageBackend,
    event_bus: &EventBus,
) -> anyhow::Result<RecurrenceRepositories> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory recurrence storage");
            Ok(RecurrenceRepositories::in_memory(InMemoryRecurrenceStore::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::connect(config)
                .await
                .context("Failed to connect to PostgreSQL")?;
            info!(max_connections = config.max_connections, "Connected to PostgreSQL");
            Ok(RecurrenceRepositories::postgres(db.get_pool().clone(), event_bus.clone()))
        }
    }
}

/// Wires a [`StandardRecurrenceService`] from an engine manifest
pub async fn create_recurrence_service(
    config: &EngineConfigManifest,
    event_bus: EventBus,
) -> anyhow::Result<Arc<StandardRecurrenceService>> {
    let backend = config.storage_backend()?;
    let repos = create_repositories(&backend, &event_bus).await?;
    Ok(Arc::new(StandardRecurrenceService::new(
        repos.patterns,
        repos.tasks,
        repos.unit_of_work,
        event_bus,
        Arc::new(SystemClock::new(config.spec.recurrence.clock)),
    )))
}
