use std::path::PathBuf;
use std::time::Duration;

use regionfeed_core::{CachePolicy, OrchestratorConfig};

use crate::util::{mask_token, mask_url};

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub orchestrator: OrchestratorConfig,
    pub slack: Option<SlackConfig>,
    pub providers: Vec<ProviderConfig>,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Cache policy derived from the configured TTL.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(self.cache.ttl)
    }

    /// Human-readable summary with secrets masked.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push(match &self.metadata.config_path {
            Some(path) => format!("config file: {}", path.display()),
            None => "config file: none".to_string(),
        });
        lines.push(match &self.database.url {
            Some(url) => format!("database: {}", mask_url(url)),
            None => "database: none (in-memory cache)".to_string(),
        });
        lines.push(format!(
            "cache ttl: {}",
            humantime::format_duration(self.cache.ttl)
        ));
        lines.push(format!(
            "max concurrency: {}",
            self.orchestrator.max_concurrency
        ));
        lines.push(format!(
            "fetch timeout: {}",
            humantime::format_duration(self.orchestrator.fetch_timeout)
        ));
        lines.push(match &self.slack {
            Some(slack) => format!(
                "slack webhook: {} (errors: {}, changes: {})",
                mask_url(&slack.webhook_url),
                slack.error_channel.as_deref().unwrap_or("default"),
                slack.changes_channel.as_deref().unwrap_or("default"),
            ),
            None => "slack webhook: none".to_string(),
        });
        for provider in &self.providers {
            let token = provider
                .bearer_token
                .as_deref()
                .map(|t| format!(" (token {})", mask_token(t)))
                .unwrap_or_default();
            lines.push(format!(
                "provider {}: {}{}",
                provider.name, provider.url, token
            ));
        }

        lines
    }
}

/// Persistent cache location. `None` selects the in-memory cache.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: regionfeed_core::cache::DEFAULT_CACHE_TTL,
        }
    }
}

/// Slack webhook delivery settings.
#[derive(Clone)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub error_channel: Option<String>,
    pub changes_channel: Option<String>,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("webhook_url", &mask_url(&self.webhook_url))
            .field("error_channel", &self.error_channel)
            .field("changes_channel", &self.changes_channel)
            .finish()
    }
}

/// An HTTP JSON provider entry.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field(
                "bearer_token",
                &self.bearer_token.as_deref().map(mask_token),
            )
            .finish()
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
