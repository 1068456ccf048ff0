use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::types::AggregateReport;

/// How a provider's entry in the report was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ProviderOutcome {
    /// Served from a valid cache entry; the provider was not called.
    Cached,
    /// Fetched live. `changed` is true when the content hash differed from
    /// the stored one, or nothing was stored yet.
    Fetched { changed: bool },
    /// Fetch failed; the last cached payload (possibly expired) was used.
    StaleFallback,
    /// Fetch failed and nothing was cached.
    Empty,
}

/// Report plus per-provider bookkeeping for one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub report: AggregateReport,
    pub outcomes: BTreeMap<String, ProviderOutcome>,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// How `provider`'s entry was produced.
    pub fn outcome(&self, provider: &str) -> Option<ProviderOutcome> {
        self.outcomes.get(provider).copied()
    }

    /// Counts per outcome kind.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            providers: self.outcomes.len(),
            ..RunSummary::default()
        };
        for outcome in self.outcomes.values() {
            match outcome {
                ProviderOutcome::Cached => summary.cached += 1,
                ProviderOutcome::Fetched { changed } => {
                    summary.fetched += 1;
                    if *changed {
                        summary.changed += 1;
                    }
                }
                ProviderOutcome::StaleFallback => summary.stale += 1,
                ProviderOutcome::Empty => summary.empty += 1,
            }
        }
        summary
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub providers: usize,
    pub cached: usize,
    pub fetched: usize,
    pub changed: usize,
    pub stale: usize,
    pub empty: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} providers: {} cached, {} fetched ({} changed), {} stale, \
             {} empty",
            self.providers,
            self.cached,
            self.fetched,
            self.changed,
            self.stale,
            self.empty
        )
    }
}
