use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Region code to human readable label.
///
/// Ordered so that serialization is canonical; the content hash relies on it.
pub type RegionMap = BTreeMap<String, String>;

/// Regions exposed by one provider, split by capability.
///
/// Both maps are always present. An empty map means "no regions of this
/// kind", never "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regions {
    #[serde(default)]
    pub storage: RegionMap,
    #[serde(default)]
    pub compute: RegionMap,
}

impl Regions {
    /// Regions from explicit storage and compute maps.
    pub fn new(storage: RegionMap, compute: RegionMap) -> Self {
        Self { storage, compute }
    }

    /// Add a storage region.
    pub fn with_storage<K: Into<String>, V: Into<String>>(
        mut self,
        code: K,
        label: V,
    ) -> Self {
        self.storage.insert(code.into(), label.into());
        self
    }

    /// Add a compute region.
    pub fn with_compute<K: Into<String>, V: Into<String>>(
        mut self,
        code: K,
        label: V,
    ) -> Self {
        self.compute.insert(code.into(), label.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty() && self.compute.is_empty()
    }
}

/// Output unit of a single provider resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_name: String,
    pub regions: Regions,
}

impl ProviderResult {
    /// Pair `regions` with the provider that produced them.
    pub fn new<S: Into<String>>(provider_name: S, regions: Regions) -> Self {
        Self {
            provider_name: provider_name.into(),
            regions,
        }
    }
}

/// Merged output of one orchestration run, keyed by provider name.
///
/// Serializes as a plain JSON object of objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateReport(BTreeMap<String, Regions>);

impl AggregateReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value when the provider was already present.
    pub fn insert(&mut self, result: ProviderResult) -> Option<Regions> {
        self.0.insert(result.provider_name, result.regions)
    }

    /// Regions reported for `provider`, if it was part of the run.
    pub fn get(&self, provider: &str) -> Option<&Regions> {
        self.0.get(provider)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in provider name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Regions)> {
        self.0.iter()
    }
}

impl FromIterator<ProviderResult> for AggregateReport {
    fn from_iter<I: IntoIterator<Item = ProviderResult>>(iter: I) -> Self {
        let mut report = Self::new();
        for result in iter {
            report.insert(result);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_maps_deserialize_as_empty() {
        let regions: Regions =
            serde_json::from_str(r#"{"storage":{"us-1":"US East"}}"#)
                .expect("partial payload should decode");
        assert_eq!(regions.storage.len(), 1);
        assert!(regions.compute.is_empty());
    }

    #[test]
    fn empty_regions_serialize_both_maps() {
        let json = serde_json::to_string(&Regions::default()).unwrap();
        assert_eq!(json, r#"{"storage":{},"compute":{}}"#);
    }

    #[test]
    fn report_serializes_as_object_of_objects() {
        let report: AggregateReport = [
            ProviderResult::new(
                "A",
                Regions::default().with_storage("us-1", "US East"),
            ),
            ProviderResult::new("B", Regions::default()),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "A": {"storage": {"us-1": "US East"}, "compute": {}},
                "B": {"storage": {}, "compute": {}},
            })
        );
    }
}
