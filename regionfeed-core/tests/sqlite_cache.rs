#![cfg(feature = "sqlite")]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use regionfeed_core::{
    CachePolicy, FetchError, ProviderOutcome, ProviderRegistry, RegionCache,
    RegionOrchestrator, Regions, cache::SqliteRegionCache,
    hashing::regions_hash, provider::provider_fn, time::ManualTimeProvider,
};
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("regions.db").display())
}

async fn open(
    dir: &TempDir,
    clock: Arc<ManualTimeProvider>,
) -> SqliteRegionCache {
    SqliteRegionCache::connect_with_time(
        &database_url(dir),
        CachePolicy::new(TTL),
        clock,
    )
    .await
    .unwrap()
}

fn sample() -> Regions {
    Regions::default()
        .with_storage("us-east-1", "US East (N. Virginia)")
        .with_storage("eu-central-1", "EU (Frankfurt)")
        .with_compute("nbg1", "Nuremberg")
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let cache = open(&dir, clock).await;
    let regions = sample();
    let hash = regions_hash(&regions).unwrap();

    let written = cache.put("Hetzner", &regions, &hash).await.unwrap();
    let read = cache.get("Hetzner").await.unwrap().unwrap();

    assert_eq!(read.regions().unwrap(), regions);
    assert_eq!(read.regions_hash, hash);
    assert_eq!(read.created_at, written.created_at);
    assert_eq!(
        read.expires_at - read.created_at,
        chrono::Duration::from_std(TTL).unwrap()
    );
    assert_eq!(cache.hash_of("Hetzner").await.unwrap(), Some(hash));
}

#[tokio::test]
async fn unknown_provider_is_absent() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir, Arc::new(ManualTimeProvider::default())).await;

    assert!(cache.get("Nobody").await.unwrap().is_none());
    assert!(cache.hash_of("Nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn put_replaces_row_and_advances_created_at() {
    let dir = TempDir::new().unwrap();
    // Frozen clock: consecutive writes see the same wall time.
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let cache = open(&dir, clock).await;
    let regions = sample();
    let hash = regions_hash(&regions).unwrap();

    let first = cache.put("Wasabi", &regions, &hash).await.unwrap();
    let second = cache.put("Wasabi", &regions, &hash).await.unwrap();
    let stored = cache.get("Wasabi").await.unwrap().unwrap();

    assert!(second.created_at > first.created_at);
    assert!(second.expires_at > first.expires_at);
    assert_eq!(stored.created_at, second.created_at);
    assert_eq!(cache.stats().await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_rows_remain_readable() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let cache = open(&dir, clock.clone()).await;
    let regions = sample();

    cache
        .put("Linode", &regions, &regions_hash(&regions).unwrap())
        .await
        .unwrap();
    clock.advance(chrono::Duration::hours(25));

    let entry = cache.get("Linode").await.unwrap().unwrap();
    let stats = cache.stats().await.unwrap();

    assert_eq!(entry.regions().unwrap(), regions);
    assert!(!stats[0].valid);
    assert_eq!(stats[0].label(), "Expired");
}

#[tokio::test]
async fn stats_list_newest_first() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let cache = open(&dir, clock.clone()).await;
    let regions = Regions::default();
    let hash = regions_hash(&regions).unwrap();

    cache.put("Older", &regions, &hash).await.unwrap();
    clock.advance(chrono::Duration::minutes(5));
    cache.put("Newer", &regions, &hash).await.unwrap();

    let stats = cache.stats().await.unwrap();
    let names: Vec<_> = stats.iter().map(|s| s.provider.as_str()).collect();

    assert_eq!(names, vec!["Newer", "Older"]);
    assert!(stats.iter().all(|s| s.valid));
}

#[tokio::test]
async fn rows_survive_reopening() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let regions = sample();

    let cache = open(&dir, clock.clone()).await;
    cache
        .put("Vultr", &regions, &regions_hash(&regions).unwrap())
        .await
        .unwrap();
    cache.close().await.unwrap();

    let reopened = open(&dir, clock).await;
    let entry = reopened.get("Vultr").await.unwrap().unwrap();
    assert_eq!(entry.regions().unwrap(), regions);
}

#[tokio::test]
async fn orchestrator_serves_stale_sqlite_row_on_failure() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualTimeProvider::new(Utc::now()));
    let cache = Arc::new(open(&dir, clock.clone()).await);
    let regions = sample();
    cache
        .put("Scaleway", &regions, &regions_hash(&regions).unwrap())
        .await
        .unwrap();
    clock.advance(chrono::Duration::hours(48));

    let registry = ProviderRegistry::new()
        .with(
            "Scaleway",
            provider_fn(|| async {
                Err::<Regions, _>(FetchError::other("503 from status page"))
            }),
        )
        .unwrap();
    let orchestrator = RegionOrchestrator::builder(registry)
        .cache(cache.clone())
        .time_provider(clock)
        .build();

    let outcome = orchestrator.run_detailed().await;

    assert_eq!(outcome.report.get("Scaleway"), Some(&regions));
    assert_eq!(
        outcome.outcome("Scaleway"),
        Some(ProviderOutcome::StaleFallback)
    );
}

#[tokio::test]
async fn in_memory_url_connects() {
    let cache =
        SqliteRegionCache::connect("sqlite::memory:", CachePolicy::default())
            .await
            .unwrap();
    let regions = sample();

    cache
        .put("Backblaze", &regions, &regions_hash(&regions).unwrap())
        .await
        .unwrap();

    assert!(cache.get("Backblaze").await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writers_sharing_a_file_are_serialized() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);
    let policy = CachePolicy::new(TTL);
    let first = SqliteRegionCache::connect(&url, policy).await.unwrap();
    let second = SqliteRegionCache::connect(&url, policy).await.unwrap();
    let regions = sample();
    let hash = regions_hash(&regions).unwrap();

    let writes = (0..200).map(|i| {
        let cache = if i % 2 == 0 {
            first.clone()
        } else {
            second.clone()
        };
        let regions = regions.clone();
        let hash = hash.clone();
        tokio::spawn(async move { cache.put("Hetzner", &regions, &hash).await })
    });
    let results: Vec<_> = join_all(writes)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let failures: Vec<_> =
        results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert!(
        failures.is_empty(),
        "{} puts failed, first: {:?}",
        failures.len(),
        failures.first()
    );

    // Every write saw the previous one, so no two share a timestamp.
    let created: BTreeSet<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|entry| entry.created_at)
        .collect();
    assert_eq!(created.len(), 200);

    let stats = second.stats().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].created_at, *created.iter().next_back().unwrap());
}
