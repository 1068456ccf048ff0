//! # Regionfeed Core
//!
//! Concurrent aggregation of cloud provider region listings, backed by a
//! last-known-good cache and best-effort change notifications.
//!
//! ## Overview
//!
//! - **Orchestrator**: resolves every registered provider under a bounded
//!   worker pool and merges the results into an [`AggregateReport`]
//! - **Cache**: one row per provider with a TTL and a SHA-256 content hash,
//!   served directly while valid and as a fallback once expired
//! - **Notifications**: fire-and-forget error and change events, with a
//!   Slack webhook adapter
//!
//! ## Feature Flags
//!
//! - `sqlite` (default): SQLite-backed [`cache::SqliteRegionCache`]
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use regionfeed_core::{
//!     FetchError, ProviderRegistry, RegionOrchestrator, Regions,
//!     cache::InMemoryRegionCache, provider::provider_fn,
//! };
//!
//! async fn aggregate() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ProviderRegistry::new().with(
//!         "Example",
//!         provider_fn(|| async {
//!             Ok::<_, FetchError>(
//!                 Regions::default().with_storage("us-1", "US East"),
//!             )
//!         }),
//!     )?;
//!
//!     let orchestrator = RegionOrchestrator::builder(registry)
//!         .cache(Arc::new(InMemoryRegionCache::default()))
//!         .build();
//!     let report = orchestrator.run().await;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     orchestrator.drain_notifications().await;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Region cache port plus in-memory and SQLite implementations
pub mod cache;

/// Error types
pub mod error;

/// Content hashing for change detection
pub mod hashing;

/// Change and error notification sinks
pub mod notify;

/// Concurrent provider orchestration
pub mod orchestrator;

/// Provider fetch port and registry
pub mod provider;

/// Clock abstraction
pub mod time;

/// Region data model
pub mod types;

pub use cache::{CacheEntry, CachePolicy, CacheStatus, RegionCache};
pub use error::{FetchError, RegionsError, Result};
pub use notify::{ChangeNotifier, NoopNotifier, NotificationDispatcher};
pub use orchestrator::{
    OrchestratorConfig, ProviderOutcome, RegionOrchestrator, RunOutcome,
    RunSummary,
};
pub use provider::{ProviderRegistry, RegionProvider};
pub use types::{AggregateReport, ProviderResult, Regions};
