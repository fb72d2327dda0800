// config.rs — Tunable parameters for every stage of the positioning pipeline
//
// All sections default to the values the field deployment was tuned with, so
// an empty JSON object `{}` is a valid config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PositioningError, Result};
use crate::fingerprint::EstimationStrategy;
use crate::motion::floor_detector::FloorDetectorConfig;
use crate::motion::step_detector::StepDetectorConfig;
use crate::types::LatLng;

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Number of strongest live access points compared per cycle.
    pub knn_number: usize,
    /// Range filter radius around the displayed position, metres.
    pub max_distance: f64,
    pub use_weighting: bool,
    /// Compare against the stored mean (true) or median (false).
    pub use_mean: bool,
    pub algorithm: EstimationStrategy,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            knn_number: 4,
            max_distance: 10.0,
            use_weighting: false,
            use_mean: true,
            algorithm: EstimationStrategy::Weighted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    // ── Wi-Fi interpolation weights ──
    pub indoor_weight: f64,
    pub outdoor_weight: f64,

    // ── Accuracy display ──
    pub accuracy_scale: f64,

    // ── Starting state ──
    pub initial_position: LatLng,
    pub initial_floor: i64,
    pub upper_floor: i64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            indoor_weight: 0.2,
            outdoor_weight: 1.0,
            accuracy_scale: 0.5,
            initial_position: LatLng::new(55.922082, -3.172315),
            initial_floor: 0,
            upper_floor: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded input queue; producers drop samples when it is full.
    pub queue_capacity: usize,
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            event_capacity: 256,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub knn: KnnConfig,
    pub step: StepDetectorConfig,
    pub floor: FloorDetectorConfig,
    pub fusion: FusionConfig,
    pub runtime: RuntimeConfig,
}

impl PositioningConfig {
    /// Read and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: &str) -> Result<()> {
            Err(PositioningError::InvalidConfig(msg.to_string()))
        }

        if self.knn.knn_number < 1 {
            return invalid("knn.knn_number must be at least 1");
        }
        if !(self.knn.max_distance >= 0.0) {
            return invalid("knn.max_distance must be non-negative");
        }

        let s = &self.step;
        if !(s.min_freq > 0.0 && s.min_freq < s.max_freq) {
            return invalid("step frequencies must satisfy 0 < min_freq < max_freq");
        }
        if !(s.max_top > 0.0) {
            return invalid("step.max_top must be positive");
        }
        if !(s.integration_divisor > 0.0) {
            return invalid("step.integration_divisor must be positive");
        }

        let f = &self.floor;
        if !(0.0..=1.0).contains(&f.smoothing_alpha) {
            return invalid("floor.smoothing_alpha must be within [0, 1]");
        }
        if f.window_len < 2 {
            return invalid("floor.window_len must be at least 2");
        }
        if !(f.sample_interval_secs > 0.0) {
            return invalid("floor.sample_interval_secs must be positive");
        }
        if !(f.reference_pressure_hpa > 0.0) {
            return invalid("floor.reference_pressure_hpa must be positive");
        }

        let fu = &self.fusion;
        if !(0.0..=1.0).contains(&fu.indoor_weight) || !(0.0..=1.0).contains(&fu.outdoor_weight) {
            return invalid("fusion weights must be within [0, 1]");
        }
        if !fu.initial_position.is_finite() {
            return invalid("fusion.initial_position must be finite");
        }

        if self.runtime.queue_capacity == 0 || self.runtime.event_capacity == 0 {
            return invalid("runtime capacities must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PositioningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.knn.knn_number, 4);
        assert_eq!(config.knn.algorithm, EstimationStrategy::Weighted);
        assert_eq!(config.step.min_freq, 3.0);
        assert_eq!(config.floor.window_len, 30);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "knn": { "knn_number": 6, "algorithm": "centroid" }, "step": { "max_top": 12.0 } }"#;
        let config: PositioningConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.knn.knn_number, 6);
        assert_eq!(config.knn.algorithm, EstimationStrategy::Centroid);
        assert_eq!(config.knn.max_distance, 10.0);
        assert_eq!(config.step.max_top, 12.0);
        assert_eq!(config.step.max_freq, 9.0);
        assert_eq!(config.fusion.indoor_weight, 0.2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PositioningConfig::default();
        config.knn.knn_number = 0;
        assert!(matches!(config.validate(), Err(PositioningError::InvalidConfig(_))));

        let mut config = PositioningConfig::default();
        config.step.min_freq = 10.0;
        assert!(config.validate().is_err());

        let mut config = PositioningConfig::default();
        config.fusion.indoor_weight = 1.5;
        assert!(config.validate().is_err());

        let mut config = PositioningConfig::default();
        config.floor.window_len = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "indoor_tracker_cfg_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "fusion": { "accuracy_scale": 1.0 } }"#).unwrap();
        let config = PositioningConfig::load(&path).unwrap();
        assert_eq!(config.fusion.accuracy_scale, 1.0);
        let _ = fs::remove_file(&path);
    }
}
