// Copyright (c) 2026 Todoapp Contributors
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Recurrence processor cadence and clock
// - Persistence backend selection

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::clock::ClockMode;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "todoapp.dev/v1";
pub const KIND: &str = "EngineConfig";

/// Top-level engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "todoapp.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Instance name, used in logs only
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    #[serde(default)]
    pub recurrence: RecurrenceConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    /// Whether the periodic processor runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between processor ticks
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Calendar used to decide what "today" is
    #[serde(default)]
    pub clock: ClockMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseBackend {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,

    /// PostgreSQL connection string (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_true() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_max_connections() -> u32 {
    5
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
            clock: ClockMode::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "todoapp-recurrence".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

impl EngineConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. TODOAPP_CONFIG_PATH environment variable
    /// 2. ./todoapp-config.yaml (working directory)
    /// 3. ~/.todoapp/config.yaml (user home)
    /// 4. /etc/todoapp/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TODOAPP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./todoapp-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".todoapp").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/todoapp/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!(
                    "No configuration file found in standard locations. Using defaults."
                );
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (container deployments)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TODOAPP_DATABASE_URL") {
            tracing::info!("Environment override: TODOAPP_DATABASE_URL (backend=postgres)");
            self.spec.database.url = Some(url);
            self.spec.database.backend = DatabaseBackend::Postgres;
        }

        if let Ok(val) = std::env::var("TODOAPP_RECURRENCE_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!(
                        "Environment override: TODOAPP_RECURRENCE_INTERVAL_SECS={}",
                        secs
                    );
                    self.spec.recurrence.interval_seconds = secs;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for TODOAPP_RECURRENCE_INTERVAL_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("TODOAPP_RECURRENCE_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.spec.recurrence.enabled = true,
                "false" | "0" | "no" | "off" => self.spec.recurrence.enabled = false,
                _ => tracing::warn!(
                    "Invalid value for TODOAPP_RECURRENCE_ENABLED: '{}'. Expected true/false.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.spec.recurrence.interval_seconds == 0 {
            anyhow::bail!("spec.recurrence.interval_seconds must be greater than 0");
        }

        if self.spec.database.backend == DatabaseBackend::Postgres {
            if self.spec.database.url.is_none() {
                anyhow::bail!("spec.database.url is required for the postgres backend");
            }
            if self.spec.database.max_connections == 0 {
                anyhow::bail!("spec.database.max_connections must be greater than 0");
            }
        }

        Ok(())
    }

    /// Resolve the storage backend, expanding "env:VAR_NAME" connection strings
    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        match self.spec.database.backend {
            DatabaseBackend::InMemory => Ok(StorageBackend::InMemory),
            DatabaseBackend::Postgres => {
                let raw = self
                    .spec
                    .database
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("spec.database.url is not set"))?;
                let connection_string = match raw.strip_prefix("env:") {
                    Some(var) => std::env::var(var)
                        .map_err(|_| anyhow::anyhow!("Environment variable {} is not set", var))?,
                    None => raw.to_string(),
                };
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string,
                    max_connections: self.spec.database.max_connections,
                }))
            }
        }
    }
}
