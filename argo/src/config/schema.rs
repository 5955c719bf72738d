//! Configuration schema
//!
//! Nested config structs deserialized from TOML, with defaults filling in
//! every field the user's file omits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bind_addr: String,
    pub port: u16,
    pub registry_path: String,
    pub log_dir: String,
    pub templates_dir: String,
    pub personas_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 7890,
            registry_path: "~/.argo/registry.json".to_string(),
            log_dir: "~/.argo/logs".to_string(),
            templates_dir: "~/.argo/templates".to_string(),
            personas_path: "~/.argo/personas.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub default_timeout_secs: u64,
    pub progress_interval_secs: u64,
    pub graceful_shutdown_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3600,
            progress_interval_secs: 5,
            graceful_shutdown_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgoConfig {
    pub daemon: DaemonConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}
