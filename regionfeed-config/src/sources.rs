use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub orchestrator: FileOrchestratorConfig,
    pub slack: Option<FileSlackConfig>,
    #[serde(default)]
    pub providers: Vec<FileProviderConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    /// Humantime duration, e.g. `"24h"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileOrchestratorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_drain_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSlackConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes_channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileProviderConfig {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

/// Environment-derived configuration values.
///
/// Values are kept raw; parsing and validation happen in the loader so a bad
/// value is reported instead of silently ignored.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub cache_ttl: Option<String>,
    pub max_concurrency: Option<String>,
    pub fetch_timeout: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub slack_error_channel: Option<String>,
    pub slack_changes_channel: Option<String>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        Self {
            config_path: var("REGIONFEED_CONFIG").map(PathBuf::from),
            database_url: var("DATABASE_URL"),
            cache_ttl: var("REGIONFEED_CACHE_TTL"),
            max_concurrency: var("REGIONFEED_MAX_CONCURRENCY"),
            fetch_timeout: var("REGIONFEED_FETCH_TIMEOUT"),
            slack_webhook_url: var("SLACK_WEBHOOK_URL"),
            slack_error_channel: var("SLACK_ERROR_CHANNEL"),
            slack_changes_channel: var("SLACK_CHANGES_CHANNEL"),
        }
    }
}
