use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    CacheEntry, CachePolicy, CacheStatus, RegionCache, next_created_at,
};
use crate::{
    error::Result,
    hashing::canonical_payload,
    time::{TimeProvider, system_time},
    types::Regions,
};

/// Process-local cache. Used when no database is configured, and in tests.
#[derive(Clone, Debug)]
pub struct InMemoryRegionCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    policy: CachePolicy,
    time: Arc<dyn TimeProvider>,
}

impl InMemoryRegionCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_time_provider(policy, system_time())
    }

    /// Cache stamping rows with `time` instead of the system clock.
    pub fn with_time_provider(
        policy: CachePolicy,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            policy,
            time,
        }
    }

    /// Number of providers with a row.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InMemoryRegionCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

#[async_trait]
impl RegionCache for InMemoryRegionCache {
    async fn get(&self, provider: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().get(provider).cloned())
    }

    async fn put(
        &self,
        provider: &str,
        regions: &Regions,
        hash: &str,
    ) -> Result<CacheEntry> {
        let payload = canonical_payload(regions)?;

        let mut entries = self.entries.write();
        let previous = entries.get(provider).map(|entry| entry.created_at);
        let created_at = next_created_at(previous, self.time.utc_now());
        let entry = CacheEntry {
            provider: provider.to_string(),
            regions_hash: hash.to_string(),
            regions_payload: payload,
            created_at,
            expires_at: self.policy.expires_at(created_at),
        };
        entries.insert(provider.to_string(), entry.clone());

        debug!("Cached regions for provider: {}", provider);
        Ok(entry)
    }

    async fn hash_of(&self, provider: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .read()
            .get(provider)
            .map(|entry| entry.regions_hash.clone()))
    }

    async fn stats(&self) -> Result<Vec<CacheStatus>> {
        let now = self.time.utc_now();
        let mut rows: Vec<CacheStatus> = self
            .entries
            .read()
            .values()
            .map(|entry| CacheStatus::from_entry(entry, now))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
