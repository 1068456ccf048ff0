//! Last-known-good region cache with TTL and content hash bookkeeping.
//!
//! One row per provider. Rows are replaced on every successful fetch and are
//! never deleted; an expired row stays readable so it can be served when a
//! later fetch fails.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryRegionCache;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRegionCache;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{RegionsError, Result},
    types::Regions,
};

/// TTL used when none is configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bump applied when the clock has not moved since the previous write, so
/// `created_at` strictly increases per provider.
fn min_created_at_step() -> chrono::Duration {
    chrono::Duration::milliseconds(1)
}

/// How long a freshly written row stays valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
}

impl CachePolicy {
    /// Policy with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub(crate) fn expires_at(
        &self,
        created_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        // A TTL beyond chrono's range is effectively "never expires".
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// A cached region set for one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(sqlx::FromRow))]
pub struct CacheEntry {
    pub provider: String,
    pub regions_hash: String,
    pub regions_payload: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Decode the stored payload.
    pub fn regions(&self) -> Result<Regions> {
        serde_json::from_str(&self.regions_payload).map_err(|e| {
            RegionsError::CacheRead(format!(
                "failed to decode cached regions for {}: {e}",
                self.provider
            ))
        })
    }
}

/// Row summary for cache statistics listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub provider: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

impl CacheStatus {
    /// Status of `entry` as seen at `now`.
    pub fn from_entry(entry: &CacheEntry, now: DateTime<Utc>) -> Self {
        Self {
            provider: entry.provider.clone(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            valid: entry.is_valid_at(now),
        }
    }

    /// `Valid` or `Expired`.
    pub fn label(&self) -> &'static str {
        if self.valid { "Valid" } else { "Expired" }
    }
}

/// Persistence port for the region cache.
#[async_trait]
pub trait RegionCache: Send + Sync + std::fmt::Debug {
    /// Point lookup. `None` means the provider was never cached; an expired
    /// entry is still returned.
    async fn get(&self, provider: &str) -> Result<Option<CacheEntry>>;

    /// Replace the provider's row with a freshly stamped entry.
    async fn put(
        &self,
        provider: &str,
        regions: &Regions,
        hash: &str,
    ) -> Result<CacheEntry>;

    /// Stored content hash only, without the payload.
    async fn hash_of(&self, provider: &str) -> Result<Option<String>>;

    /// All rows, newest first.
    async fn stats(&self) -> Result<Vec<CacheStatus>>;

    /// Release connections. The in-memory cache has nothing to release.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn next_created_at(
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + min_created_at_step(),
        _ => now,
    }
}
