use once_cell::sync::Lazy;
use std::{
    fs,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use regionfeed_core::OrchestratorConfig;

use super::{
    models::{
        CacheConfig, Config, ConfigMetadata, DatabaseConfig, ProviderConfig,
        SlackConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("regionfeed.toml"),
        PathBuf::from("config/regionfeed.toml"),
    ]
});

/// Explicit overrides for where configuration is read from.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Composes [`Config`] from the environment, a TOML file and defaults.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Read this file instead of searching the default locations. A missing
    /// file is an error.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Load `.env`, then compose configuration from the process environment,
    /// the TOML file and defaults (in that order of precedence).
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`load`](Self::load) but with an explicit environment and no
    /// `.env` handling.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(explicit) =
            &self.options.config_path
        {
            (Some(explicit.clone()), true)
        } else if let Some(from_env) = &env.config_path {
            (Some(from_env.clone()), true)
        } else {
            (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            )
        };

        let Some(path) = path else {
            debug!("No configuration file in default locations");
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }
        debug!("Loading configuration from {}", path.display());

        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No regionfeed.toml detected; falling back to environment \
             variables",
            "Create regionfeed.toml or set REGIONFEED_CONFIG to point at one",
        );
    }

    let FileConfig {
        database: file_database,
        cache: file_cache,
        orchestrator: file_orchestrator,
        slack: file_slack,
        providers: file_providers,
    } = file_config.unwrap_or_default();

    let database = DatabaseConfig {
        url: env
            .database_url
            .clone()
            .or(file_database.url)
            .filter(|url| !url.trim().is_empty()),
    };

    let cache = CacheConfig {
        ttl: resolve_duration(
            "cache ttl",
            env.cache_ttl.as_deref(),
            file_cache.ttl.as_deref(),
            CacheConfig::default().ttl,
        )?,
    };

    let max_concurrency = match env.max_concurrency.as_deref() {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|err| ConfigLoadError::InvalidValue {
                field: "REGIONFEED_MAX_CONCURRENCY",
                value: raw.to_string(),
                reason: err.to_string(),
            })?,
        None => file_orchestrator
            .max_concurrency
            .unwrap_or(OrchestratorConfig::DEFAULT_MAX_CONCURRENCY),
    };
    let orchestrator = OrchestratorConfig {
        max_concurrency,
        fetch_timeout: resolve_duration(
            "fetch_timeout",
            env.fetch_timeout.as_deref(),
            file_orchestrator.fetch_timeout.as_deref(),
            OrchestratorConfig::DEFAULT_FETCH_TIMEOUT,
        )?,
        notification_drain_timeout: resolve_duration(
            "notification_drain_timeout",
            None,
            file_orchestrator.notification_drain_timeout.as_deref(),
            OrchestratorConfig::DEFAULT_NOTIFICATION_DRAIN_TIMEOUT,
        )?,
    };

    let file_slack = file_slack.unwrap_or_default();
    let slack = match env.slack_webhook_url.clone().or(file_slack.webhook_url) {
        Some(webhook_url) if !webhook_url.trim().is_empty() => {
            validate_url("slack webhook_url", &webhook_url)?;
            Some(SlackConfig {
                webhook_url,
                error_channel: env
                    .slack_error_channel
                    .clone()
                    .or(file_slack.error_channel),
                changes_channel: env
                    .slack_changes_channel
                    .clone()
                    .or(file_slack.changes_channel),
            })
        }
        _ => None,
    };

    let providers = file_providers
        .into_iter()
        .map(|provider| {
            validate_url("provider url", &provider.url)?;
            Ok(ProviderConfig {
                name: provider.name.trim().to_string(),
                url: provider.url,
                bearer_token: provider.bearer_token,
            })
        })
        .collect::<Result<Vec<_>, ConfigLoadError>>()?;

    let config = Config {
        database,
        cache,
        orchestrator,
        slack,
        providers,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    let guard_warnings = validation::apply_guard_rails(&config)?;
    warnings.extend(guard_warnings);

    Ok((config, warnings))
}

fn resolve_duration(
    field: &'static str,
    env: Option<&str>,
    file: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match env.or(file) {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value: raw.to_string(),
                source,
            }
        }),
        None => Ok(default),
    }
}

fn validate_url(field: &'static str, raw: &str) -> Result<(), ConfigLoadError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|source| ConfigLoadError::InvalidUrl { field, source })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigLoadError::InvalidValue {
            field,
            value: raw.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// Why configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration `{value}` for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid URL for {field}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value `{value}` for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

/// Loaded configuration plus the non-fatal findings about it.
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Default search locations, relative to the working directory.
pub fn default_config_locations() -> &'static [PathBuf] {
    &DEFAULT_CONFIG_LOCATIONS
}
