pub mod changes;
pub mod regions;

pub use changes::{ChangeSummary, RegionChange, RegionChanges};
pub use regions::{AggregateReport, ProviderResult, RegionMap, Regions};
