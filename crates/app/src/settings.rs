//! Handles settings for the daemon. Configuration is read from an optional
//! `settings.toml` in the working directory, then from `LEDGER__*`
//! environment variables (`LEDGER__APP__LEVEL=debug`,
//! `LEDGER__DATABASE__SQLITE=./ledger.db`, ...).
//!
//! See `settings.example.toml` for every key.
use config::{Config, ConfigError, Environment, File};
use ledger::{EngineSettings, ReconcilerSettings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    /// Path of the SQLite file, created when missing.
    Sqlite(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub engine: EngineSettings,
    pub reconciler: ReconcilerSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
