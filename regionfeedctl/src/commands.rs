use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use regionfeed_config::{
    Config, SlackConfig, loader::default_config_locations, mask_url,
};
use regionfeed_core::{
    ChangeNotifier, FetchError, NoopNotifier, ProviderRegistry, RegionCache,
    RegionOrchestrator, RegionsError,
    cache::{InMemoryRegionCache, SqliteRegionCache},
    notify::SlackWebhookNotifier,
    provider::HttpJsonProvider,
};
use tracing::{info, warn};

const STATS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub async fn run(config: &Config, pretty: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config).await?;

    let outcome = orchestrator.run_detailed().await;
    let report = if pretty {
        serde_json::to_string_pretty(&outcome.report)
    } else {
        serde_json::to_string(&outcome.report)
    }
    .context("failed to serialize region report")?;
    println!("{report}");

    log_cache_stats(orchestrator.cache().as_ref()).await;
    shutdown(&orchestrator).await
}

pub async fn serve(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    crate::server::serve(orchestrator.clone(), addr).await?;
    shutdown(&orchestrator).await
}

pub async fn cache_stats(config: &Config) -> anyhow::Result<()> {
    if config.database.url.is_none() {
        bail!(
            "DATABASE_URL is not configured; there is no persistent cache to \
             inspect"
        );
    }
    let cache = open_persistent_cache(config).await?;
    let stats = cache.stats().await.context("failed to read cache stats")?;

    if stats.is_empty() {
        println!("No cache entries");
    }
    for status in &stats {
        println!(
            "{}\tcreated {}\texpires {}\t{}",
            status.provider,
            status.created_at.format(STATS_TIME_FORMAT),
            status.expires_at.format(STATS_TIME_FORMAT),
            status.label()
        );
    }

    cache.close().await.context("failed to close region cache")?;
    Ok(())
}

pub async fn test_notify(
    config: &Config,
    channel: Option<String>,
) -> anyhow::Result<()> {
    let Some(slack) = &config.slack else {
        bail!("SLACK_WEBHOOK_URL is not configured");
    };
    info!("Testing Slack webhook {}", mask_url(&slack.webhook_url));

    let notifier = slack_notifier(slack, http_client()?);

    notifier
        .send_text("🧪 Test message from regionfeedctl", channel.as_deref())
        .await
        .context("failed to send test message")?;

    notifier
        .notify_error(
            "test-provider",
            &RegionsError::Fetch(FetchError::other(
                "simulated fetch failure from regionfeedctl test-notify",
            )),
        )
        .await
        .context("failed to send test error notification")?;

    info!("Slack test notifications sent");
    Ok(())
}

pub fn check_config(config: &Config) -> anyhow::Result<()> {
    for line in config.describe() {
        println!("{line}");
    }
    if config.metadata.config_path.is_none() {
        let searched: Vec<String> = default_config_locations()
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        println!("searched: {}", searched.join(", "));
    }
    Ok(())
}

/// Orchestrator wired from configuration, shared by `run` and `serve`.
async fn build_orchestrator(
    config: &Config,
) -> anyhow::Result<RegionOrchestrator> {
    let client = http_client()?;
    let cache = open_cache(config).await;
    let notifier = build_notifier(config, &client);
    let registry = build_registry(config, &client)?;

    Ok(RegionOrchestrator::builder(registry)
        .cache(cache)
        .notifier(notifier)
        .config(config.orchestrator)
        .build())
}

/// Drain pending notifications and close the cache.
async fn shutdown(orchestrator: &RegionOrchestrator) -> anyhow::Result<()> {
    if !orchestrator.drain_notifications().await {
        warn!(
            "{} notification(s) still pending at exit",
            orchestrator.pending_notifications()
        );
    }
    orchestrator
        .cache()
        .close()
        .await
        .context("failed to close region cache")
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("regionfeed/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")
}

/// Cache for an orchestration run. An unreachable database degrades to an
/// in-memory cache for this process.
async fn open_cache(config: &Config) -> Arc<dyn RegionCache> {
    if config.database.url.is_none() {
        info!("No database configured, using in-memory region cache");
        return Arc::new(InMemoryRegionCache::new(config.cache_policy()));
    }

    match open_persistent_cache(config).await {
        Ok(cache) => cache,
        Err(err) => {
            warn!(
                "Cache unavailable, falling back to in-memory cache: {:#}",
                err
            );
            Arc::new(InMemoryRegionCache::new(config.cache_policy()))
        }
    }
}

async fn open_persistent_cache(
    config: &Config,
) -> anyhow::Result<Arc<dyn RegionCache>> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is not configured")?;
    info!("Using SQLite region cache at {}", mask_url(url));
    let cache = SqliteRegionCache::connect(url, config.cache_policy())
        .await
        .context("failed to open region cache database")?;
    Ok(Arc::new(cache))
}

fn slack_notifier(
    slack: &SlackConfig,
    client: reqwest::Client,
) -> SlackWebhookNotifier {
    SlackWebhookNotifier::new(client, slack.webhook_url.clone())
        .with_error_channel(slack.error_channel.clone())
        .with_changes_channel(slack.changes_channel.clone())
}

fn build_notifier(
    config: &Config,
    client: &reqwest::Client,
) -> Arc<dyn ChangeNotifier> {
    match &config.slack {
        Some(slack) => {
            info!(
                "Slack webhook URL configured: {}",
                mask_url(&slack.webhook_url)
            );
            Arc::new(slack_notifier(slack, client.clone()))
        }
        None => Arc::new(NoopNotifier),
    }
}

fn build_registry(
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        registry
            .register(
                provider.name.clone(),
                HttpJsonProvider::new(client.clone(), provider.url.clone())
                    .with_bearer_token(provider.bearer_token.clone()),
            )
            .with_context(|| {
                format!("failed to register provider {}", provider.name)
            })?;
    }
    Ok(registry)
}

async fn log_cache_stats(cache: &dyn RegionCache) {
    match cache.stats().await {
        Ok(stats) => {
            info!("Cache statistics ({} entries)", stats.len());
            for status in stats {
                info!(
                    "  {}: created {}, expires {} ({})",
                    status.provider,
                    status.created_at.format(STATS_TIME_FORMAT),
                    status.expires_at.format(STATS_TIME_FORMAT),
                    status.label()
                );
            }
        }
        Err(err) => warn!("Failed to read cache stats: {}", err),
    }
}
