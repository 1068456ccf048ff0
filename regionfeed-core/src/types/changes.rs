use std::fmt;

use super::regions::{RegionMap, Regions};

/// Maximum number of individual changes spelled out in a rendered summary.
const MAX_LISTED_CHANGES: usize = 5;

/// One difference between two region maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionChange {
    Added { code: String, label: String },
    Removed { code: String, label: String },
    Relabelled { code: String, old: String, new: String },
}

impl fmt::Display for RegionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { code, label } => write!(f, "+ {code}: {label}"),
            Self::Removed { code, label } => write!(f, "- {code}: {label}"),
            Self::Relabelled { code, old, new } => {
                write!(f, "~ {code}: {old} → {new}")
            }
        }
    }
}

/// Diff of a single region map. Entries are grouped as added, removed,
/// relabelled, each in code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionChanges {
    pub changes: Vec<RegionChange>,
}

impl RegionChanges {
    /// Diff `old` against `new`.
    pub fn between(old: &RegionMap, new: &RegionMap) -> Self {
        let added = new
            .iter()
            .filter(|(code, _)| !old.contains_key(*code))
            .map(|(code, label)| RegionChange::Added {
                code: code.clone(),
                label: label.clone(),
            });

        let removed = old
            .iter()
            .filter(|(code, _)| !new.contains_key(*code))
            .map(|(code, label)| RegionChange::Removed {
                code: code.clone(),
                label: label.clone(),
            });

        let relabelled = new.iter().filter_map(|(code, label)| {
            old.get(code)
                .filter(|previous| *previous != label)
                .map(|previous| RegionChange::Relabelled {
                    code: code.clone(),
                    old: previous.clone(),
                    new: label.clone(),
                })
        });

        Self {
            changes: added.chain(removed).chain(relabelled).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

impl fmt::Display for RegionChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |items: &[RegionChange]| {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self.changes.len() {
            0 => f.write_str("No changes detected"),
            n if n > MAX_LISTED_CHANGES => write!(
                f,
                "{n} changes detected (showing first \
                 {MAX_LISTED_CHANGES}): [{}]...",
                render(&self.changes[..MAX_LISTED_CHANGES])
            ),
            n => write!(f, "{n} changes: [{}]", render(&self.changes)),
        }
    }
}

/// Old/new comparison of a provider's full region set, as carried by a
/// "changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSummary {
    pub storage_before: usize,
    pub storage_after: usize,
    pub compute_before: usize,
    pub compute_after: usize,
    pub storage: RegionChanges,
    pub compute: RegionChanges,
}

impl ChangeSummary {
    /// Counts and per-map diffs of `old` against `new`.
    pub fn between(old: &Regions, new: &Regions) -> Self {
        Self {
            storage_before: old.storage.len(),
            storage_after: new.storage.len(),
            compute_before: old.compute.len(),
            compute_after: new.compute.len(),
            storage: RegionChanges::between(&old.storage, &new.storage),
            compute: RegionChanges::between(&old.compute, &new.compute),
        }
    }

    /// Multi-line description used in notification bodies.
    pub fn details(&self) -> String {
        let mut lines = Vec::with_capacity(2);
        if !self.storage.is_empty() {
            lines.push(format!("*Storage regions:* {}", self.storage));
        }
        if !self.compute.is_empty() {
            lines.push(format!("*Compute regions:* {}", self.compute));
        }

        if lines.is_empty() {
            "No specific changes detected".to_string()
        } else {
            lines.join("\n")
        }
    }
}
