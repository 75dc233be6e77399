// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Layered settings: built-in defaults, then an optional `stockbook.toml`,
//! then `STOCKBOOK__SECTION__KEY` environment variables.

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub log: LogSettings,
    /// Audit identity used when the CLI is not given `--actor`.
    pub actor_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Falls back to the platform data dir when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let file = crate::db::project_dirs()
            .ok()
            .map(|dirs| dirs.config_dir().join("stockbook.toml"));
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?
            .set_default("actor_id", 1)?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("STOCKBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings {
                path: None,
                busy_timeout_ms: 5000,
            },
            log: LogSettings {
                level: "info".to_string(),
                json: false,
            },
            actor_id: 1,
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log: &LogSettings) {
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("stockbook={}", log.level));
    let builder = fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(std::io::stderr);
    // a second init (tests, embedding) is not an error
    if log.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
