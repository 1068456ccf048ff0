use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    CacheEntry, CachePolicy, CacheStatus, RegionCache, next_created_at,
};
use crate::{
    error::{RegionsError, Result},
    hashing::canonical_payload,
    time::{TimeProvider, system_time},
    types::Regions,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// How long a writer waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS provider_regions_cache (
        provider TEXT PRIMARY KEY,
        regions_hash TEXT NOT NULL,
        regions_payload TEXT NOT NULL,
        created_at DATETIME NOT NULL,
        expires_at DATETIME NOT NULL
    )
"#;

const SELECT_ENTRY: &str = r#"
    SELECT provider, regions_hash, regions_payload, created_at, expires_at
    FROM provider_regions_cache
    WHERE provider = ?1
"#;

const SELECT_HASH: &str =
    "SELECT regions_hash FROM provider_regions_cache WHERE provider = ?1";

const SELECT_ALL: &str = r#"
    SELECT provider, regions_hash, regions_payload, created_at, expires_at
    FROM provider_regions_cache
"#;

const UPSERT_ENTRY: &str = r#"
    INSERT INTO provider_regions_cache
        (provider, regions_hash, regions_payload, created_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(provider) DO UPDATE SET
        regions_hash = excluded.regions_hash,
        regions_payload = excluded.regions_payload,
        created_at = excluded.created_at,
        expires_at = excluded.expires_at
"#;

fn write_error(err: sqlx::Error) -> RegionsError {
    RegionsError::CacheWrite(format!("failed to cache regions: {err}"))
}

/// SQLite-backed region cache.
///
/// Each `put` runs in an `IMMEDIATE` transaction, so writers sharing one
/// database file (in this process or another) queue on the database lock
/// instead of interleaving on the same row.
#[derive(Clone)]
pub struct SqliteRegionCache {
    pool: SqlitePool,
    policy: CachePolicy,
    time: Arc<dyn TimeProvider>,
    write_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for SqliteRegionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRegionCache")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("ttl", &self.policy.ttl)
            .finish()
    }
}

impl SqliteRegionCache {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://regions.db` or `sqlite::memory:`.
    pub async fn connect(url: &str, policy: CachePolicy) -> Result<Self> {
        Self::connect_with_time(url, policy, system_time()).await
    }

    /// [`connect`](Self::connect) with an injected clock.
    pub async fn connect_with_time(
        url: &str,
        policy: CachePolicy,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                RegionsError::CacheRead(format!("invalid database URL: {e}"))
            })?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        // Every pooled connection to `:memory:` would get its own database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            DEFAULT_MAX_CONNECTIONS
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                RegionsError::CacheRead(format!(
                    "failed to open cache database: {e}"
                ))
            })?;

        let cache = Self {
            pool,
            policy,
            time,
            write_lock: Arc::new(Mutex::new(())),
        };
        cache.ensure_schema().await?;

        info!("Region cache database ready (ttl {:?})", policy.ttl);
        Ok(cache)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                RegionsError::CacheWrite(format!(
                    "failed to create cache table: {e}"
                ))
            })?;
        Ok(())
    }

    /// Body of an open write transaction; commits on success.
    async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        provider: &str,
        hash: &str,
        payload: String,
    ) -> Result<CacheEntry> {
        let previous: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM provider_regions_cache WHERE provider = ?1",
        )
        .bind(provider)
        .fetch_optional(&mut *conn)
        .await
        .map_err(write_error)?;

        let created_at = next_created_at(previous, self.time.utc_now());
        let entry = CacheEntry {
            provider: provider.to_string(),
            regions_hash: hash.to_string(),
            regions_payload: payload,
            created_at,
            expires_at: self.policy.expires_at(created_at),
        };

        sqlx::query(UPSERT_ENTRY)
            .bind(&entry.provider)
            .bind(&entry.regions_hash)
            .bind(&entry.regions_payload)
            .bind(entry.created_at)
            .bind(entry.expires_at)
            .execute(&mut *conn)
            .await
            .map_err(write_error)?;

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(write_error)?;
        Ok(entry)
    }
}

#[async_trait]
impl RegionCache for SqliteRegionCache {
    async fn get(&self, provider: &str) -> Result<Option<CacheEntry>> {
        sqlx::query_as::<_, CacheEntry>(SELECT_ENTRY)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                RegionsError::CacheRead(format!("failed to query cache: {e}"))
            })
    }

    async fn put(
        &self,
        provider: &str,
        regions: &Regions,
        hash: &str,
    ) -> Result<CacheEntry> {
        let payload = canonical_payload(regions)?;

        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await.map_err(write_error)?;

        // A deferred transaction that reads first cannot wait for the write
        // lock; it fails with SQLITE_BUSY instead.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(write_error)?;

        match self.upsert(&mut conn, provider, hash, payload).await {
            Ok(entry) => {
                debug!("Cached regions for provider: {}", provider);
                Ok(entry)
            }
            Err(err) => {
                if let Err(rollback) =
                    sqlx::query("ROLLBACK").execute(&mut *conn).await
                {
                    warn!("Failed to roll back cache write: {}", rollback);
                    // Never hand a connection with an open transaction back
                    // to the pool.
                    drop(conn.detach());
                }
                Err(err)
            }
        }
    }

    async fn hash_of(&self, provider: &str) -> Result<Option<String>> {
        sqlx::query_scalar(SELECT_HASH)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                RegionsError::CacheRead(format!(
                    "failed to check regions hash: {e}"
                ))
            })
    }

    async fn stats(&self) -> Result<Vec<CacheStatus>> {
        let entries = sqlx::query_as::<_, CacheEntry>(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                RegionsError::CacheRead(format!(
                    "failed to query cache stats: {e}"
                ))
            })?;

        // Timestamps are stored as text, so order on the decoded values.
        let now = self.time.utc_now();
        let mut rows: Vec<CacheStatus> = entries
            .iter()
            .map(|entry| CacheStatus::from_entry(entry, now))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
