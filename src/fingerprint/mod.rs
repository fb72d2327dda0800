//! Wi-Fi fingerprinting: stored samples, aggregated radio map, matching and
//! position estimation.

pub mod estimator;
pub mod knn;
pub mod radio_map;
pub mod store;

pub use estimator::{confidence_radius, estimate, EstimationStrategy};
pub use knn::{knn_match, KnnOptions};
pub use radio_map::RadioMap;
pub use store::{record_scan, FingerprintStore, InMemoryStore, JsonFileStore};
