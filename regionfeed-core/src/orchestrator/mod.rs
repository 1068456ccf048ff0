//! Concurrent cache-check-then-fetch over every registered provider.
//!
//! Each provider is resolved on its own task. A valid cache row short-circuits
//! the provider entirely; otherwise the fetch waits for a permit from a
//! semaphore sized to the configured pool, runs on a separate task so panics
//! and hangs stay contained, and its outcome is recorded in the cache and
//! handed to the notifier. Nothing a single provider does can fail the run.

mod config;
mod outcome;

pub use config::OrchestratorConfig;
pub use outcome::{ProviderOutcome, RunOutcome, RunSummary};

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheEntry, InMemoryRegionCache, RegionCache},
    error::{FetchError, RegionsError},
    hashing::regions_hash,
    notify::{ChangeNotifier, NoopNotifier, NotificationDispatcher},
    provider::{ProviderRegistry, RegionProvider},
    time::{TimeProvider, system_time},
    types::{AggregateReport, ProviderResult, Regions},
};

#[derive(Debug)]
pub struct RegionOrchestratorBuilder {
    registry: ProviderRegistry,
    cache: Option<Arc<dyn RegionCache>>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    config: OrchestratorConfig,
    time: Option<Arc<dyn TimeProvider>>,
}

impl RegionOrchestratorBuilder {
    /// Cache to consult and update. Defaults to an in-memory cache.
    pub fn cache(mut self, cache: Arc<dyn RegionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sink for change and error events. Defaults to [`NoopNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Pool size and timeouts.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for cache validity checks. Should match the cache's own
    /// clock when one is injected in tests.
    pub fn time_provider(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = Some(time);
        self
    }

    /// Finish wiring. Missing parts fall back to their defaults.
    pub fn build(self) -> RegionOrchestrator {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryRegionCache::default()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier));
        let permits = Arc::new(Semaphore::new(self.config.permits()));

        RegionOrchestrator {
            inner: Arc::new(Inner {
                registry: self.registry,
                cache,
                notifications: NotificationDispatcher::new(notifier),
                config: self.config,
                time: self.time.unwrap_or_else(system_time),
                permits,
            }),
        }
    }
}

/// Runs every registered provider and merges the results into one report.
#[derive(Clone)]
pub struct RegionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: ProviderRegistry,
    cache: Arc<dyn RegionCache>,
    notifications: NotificationDispatcher,
    config: OrchestratorConfig,
    time: Arc<dyn TimeProvider>,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for RegionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionOrchestrator")
            .field("providers", &self.inner.registry.len())
            .field("cache", &self.inner.cache)
            .field("config", &self.inner.config)
            .field("available_permits", &self.inner.permits.available_permits())
            .field("pending_notifications", &self.inner.notifications.pending())
            .finish()
    }
}

impl RegionOrchestrator {
    /// Start wiring an orchestrator over `registry`.
    pub fn builder(registry: ProviderRegistry) -> RegionOrchestratorBuilder {
        RegionOrchestratorBuilder {
            registry,
            cache: None,
            notifier: None,
            config: OrchestratorConfig::default(),
            time: None,
        }
    }

    /// The cache this orchestrator reads and writes.
    pub fn cache(&self) -> &Arc<dyn RegionCache> {
        &self.inner.cache
    }

    /// One pass over all providers. Every registered provider appears in the
    /// result exactly once.
    pub async fn run(&self) -> AggregateReport {
        self.run_detailed().await.report
    }

    /// [`run`](Self::run) plus how each provider's entry was produced.
    pub async fn run_detailed(&self) -> RunOutcome {
        let started = Instant::now();
        info!(
            "Fetching regions for {} providers (max {} concurrent)",
            self.inner.registry.len(),
            self.inner.config.permits()
        );

        let names: Vec<String> = self
            .inner
            .registry
            .names()
            .map(str::to_string)
            .collect();
        let handles = self.inner.registry.iter().map(|entry| {
            let inner = Arc::clone(&self.inner);
            let name = entry.name.clone();
            let provider = Arc::clone(&entry.provider);
            tokio::spawn(async move { inner.resolve(&name, provider).await })
        });
        let joined = join_all(handles).await;

        let mut report = AggregateReport::new();
        let mut outcomes = BTreeMap::new();
        for (name, joined) in names.into_iter().zip(joined) {
            let (regions, outcome) = match joined {
                Ok(resolved) => resolved,
                Err(err) => {
                    // resolve() contains provider panics itself; this only
                    // fires if the bookkeeping around it broke.
                    error!(
                        "Region task for provider {} aborted: {}",
                        name, err
                    );
                    (Regions::default(), ProviderOutcome::Empty)
                }
            };
            report.insert(ProviderResult::new(name.clone(), regions));
            outcomes.insert(name, outcome);
        }

        let outcome = RunOutcome {
            report,
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            "Regions run finished in {:?}: {}",
            outcome.elapsed,
            outcome.summary()
        );
        outcome
    }

    /// Wait (bounded by the configured drain timeout) for notifications that
    /// are still being delivered. Returns `false` on timeout.
    pub async fn drain_notifications(&self) -> bool {
        self.inner
            .notifications
            .drain(self.inner.config.notification_drain_timeout)
            .await
    }

    /// Notification deliveries still in flight.
    pub fn pending_notifications(&self) -> usize {
        self.inner.notifications.pending()
    }
}

impl Inner {
    async fn resolve(
        &self,
        name: &str,
        provider: Arc<dyn RegionProvider>,
    ) -> (Regions, ProviderOutcome) {
        let prior = match self.cache.get(name).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Cache lookup failed for provider {}: {}", name, err);
                None
            }
        };
        let prior_regions = prior.as_ref().and_then(decode_prior);

        if let (Some(entry), Some(regions)) = (&prior, &prior_regions)
            && entry.is_valid_at(self.time.utc_now())
        {
            debug!("Using cached regions for provider: {}", name);
            return (regions.clone(), ProviderOutcome::Cached);
        }

        // The semaphore is owned by `Inner` and never closed.
        let _permit = Arc::clone(&self.permits).acquire_owned().await.ok();

        let fetched = self
            .fetch_contained(provider)
            .await
            .map_err(RegionsError::from)
            .and_then(|regions| {
                regions_hash(&regions).map(|hash| (regions, hash))
            });

        match fetched {
            Ok((regions, hash)) => {
                let changed = self
                    .record(name, &prior, prior_regions, &regions, &hash)
                    .await;
                (regions, ProviderOutcome::Fetched { changed })
            }
            Err(err) => {
                error!(
                    "Failed to fetch regions for provider {}: {}",
                    name, err
                );
                self.notifications.error(name, err);
                match prior_regions {
                    Some(regions) => {
                        info!(
                            "Serving stale cached regions for provider: {}",
                            name
                        );
                        (regions, ProviderOutcome::StaleFallback)
                    }
                    None => (Regions::default(), ProviderOutcome::Empty),
                }
            }
        }
    }

    /// Change detection plus cache write for a successful fetch. Returns
    /// whether a change event was emitted.
    async fn record(
        &self,
        name: &str,
        prior: &Option<CacheEntry>,
        prior_regions: Option<Regions>,
        regions: &Regions,
        hash: &str,
    ) -> bool {
        let stored_hash = match self.cache.hash_of(name).await {
            Ok(hash) => hash,
            Err(err) => {
                warn!(
                    "Cache hash lookup failed for provider {}: {}",
                    name, err
                );
                prior.as_ref().map(|entry| entry.regions_hash.clone())
            }
        };

        let changed = stored_hash.as_deref() != Some(hash);
        if changed {
            info!("Regions changed for provider: {}", name);
            self.notifications.changed(
                name,
                prior_regions.unwrap_or_default(),
                regions.clone(),
            );
        }

        if let Err(err) = self.cache.put(name, regions, hash).await {
            warn!("Failed to cache regions for provider {}: {}", name, err);
        }
        changed
    }

    async fn fetch_contained(
        &self,
        provider: Arc<dyn RegionProvider>,
    ) -> Result<Regions, FetchError> {
        let timeout = self.config.fetch_timeout;
        let mut handle = tokio::spawn(async move { provider.fetch().await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(join_failure(err)),
            Err(_) => {
                handle.abort();
                Err(FetchError::TimedOut(timeout))
            }
        }
    }
}

fn decode_prior(entry: &CacheEntry) -> Option<Regions> {
    match entry.regions() {
        Ok(regions) => Some(regions),
        Err(err) => {
            warn!("Ignoring unreadable cache entry: {}", err);
            None
        }
    }
}

fn join_failure(err: JoinError) -> FetchError {
    match err.try_into_panic() {
        Ok(payload) => FetchError::Panicked(panic_message(payload.as_ref())),
        Err(err) => FetchError::other(err.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
