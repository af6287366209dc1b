use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Analysis catalog synchronized into the database on startup.
    #[serde(default)]
    pub analyses: Vec<AnalysisConfig>,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_worker_interval_secs() -> u64 {
    5
}

impl Config {
    /// The configured database path, or `~/.alaska/data/alaska.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            worker_count: default_worker_count(),
            worker_interval_secs: default_worker_interval_secs(),
            progress: ProgressConfig::default(),
            notifications: NotificationsConfig::default(),
            logging: LoggingConfig::default(),
            analyses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Value `old_progress` is reset to when a project is started.
    #[serde(default)]
    pub finalized: i64,
    /// Per analysis code, the value `old_progress` is set to when a job of
    /// that analysis starts. Codes without an entry leave it untouched.
    #[serde(default)]
    pub started: HashMap<String, i64>,
}

impl ProgressConfig {
    pub fn started_for(&self, code: &str) -> Option<i64> {
        self.started.get(code).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Mail spool directory. Mail notifications are disabled when unset.
    #[serde(default)]
    pub spool_directory: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_from() -> String {
    "noreply@alaska.local".to_string()
}

fn default_broadcast_capacity() -> usize {
    100
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            spool_directory: None,
            from: default_from(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub code: String,
    pub name: String,
    pub step: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}
