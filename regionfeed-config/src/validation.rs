use std::collections::HashSet;

use thiserror::Error;

use super::models::Config;

/// Upper bound on the worker pool accepted from configuration.
pub const MAX_CONCURRENCY_LIMIT: usize = 1024;

/// Configuration that would make the orchestrator misbehave.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("max_concurrency {value} exceeds the limit of {limit}")]
    ConcurrencyTooHigh { value: usize, limit: usize },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("provider `{name}` is defined more than once")]
    DuplicateProvider { name: String },
    #[error("provider entry #{index} has an empty name")]
    UnnamedProvider { index: usize },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

/// Non-fatal findings collected while loading.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    /// Warning with a suggested remedy.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Reject unusable settings and collect warnings for degraded ones.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    match config.orchestrator.max_concurrency {
        0 => return Err(ConfigGuardRailError::ZeroConcurrency),
        value if value > MAX_CONCURRENCY_LIMIT => {
            return Err(ConfigGuardRailError::ConcurrencyTooHigh {
                value,
                limit: MAX_CONCURRENCY_LIMIT,
            });
        }
        _ => {}
    }
    if config.orchestrator.fetch_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroDuration {
            field: "fetch_timeout",
        });
    }
    if config.cache.ttl.is_zero() {
        return Err(ConfigGuardRailError::ZeroDuration { field: "cache ttl" });
    }

    let mut seen = HashSet::new();
    for (index, provider) in config.providers.iter().enumerate() {
        if provider.name.trim().is_empty() {
            return Err(ConfigGuardRailError::UnnamedProvider { index });
        }
        if !seen.insert(provider.name.as_str()) {
            return Err(ConfigGuardRailError::DuplicateProvider {
                name: provider.name.clone(),
            });
        }
    }

    if config.providers.is_empty() {
        warnings.push_with_hint(
            "No providers configured; the report will be empty",
            "Add [[providers]] entries with a name and url to regionfeed.toml",
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not set; caching will not persist between runs",
            "Set DATABASE_URL (e.g. sqlite://regions.db) to keep a \
             last-known-good cache",
        );
    }

    if config.slack.is_none() {
        warnings.push_with_hint(
            "SLACK_WEBHOOK_URL not set; notifications will be disabled",
            "Set SLACK_WEBHOOK_URL or add a [slack] section to receive \
             change and error events",
        );
    }

    if config.orchestrator.notification_drain_timeout.is_zero() {
        warnings.push(
            "notification_drain_timeout is zero; pending notifications are \
             abandoned at exit",
        );
    }

    Ok(warnings)
}
