// engine.rs — Synchronous positioning engine
//
// One `feed_*` method per input stream. Each call runs to completion and
// returns the presentation events it produced; nothing here spawns, blocks,
// or touches the filesystem after construction. `runtime` wraps this in a
// single-writer task.

use serde::{Deserialize, Serialize};

use crate::config::PositioningConfig;
use crate::error::{PositioningError, Result};
use crate::fingerprint::{
    confidence_radius, estimate, knn_match, EstimationStrategy, FingerprintStore, KnnOptions,
    RadioMap,
};
use crate::fusion::{FusionController, PositionEvent};
use crate::motion::{FloorDetector, HeadingTracker, StepDetector};
use crate::types::{AccelData, AccessPointReading, BaroData, Candidate, LatLng, OrientationData};

/// Point-in-time view of the engine, also returned by the runtime on shutdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub position: LatLng,
    pub floor: i64,
    pub is_indoors: bool,
    pub heading_deg: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub steps_accepted: u64,
    pub steps_rejected: u64,
    pub scans_processed: u64,
    pub floor_changes: u64,
    /// Events produced by inputs routed through `apply`.
    pub events_emitted: u64,
    pub radio_map_locations: usize,
}

pub struct PositioningEngine {
    config: PositioningConfig,
    radio_map: RadioMap,
    steps: StepDetector,
    heading: HeadingTracker,
    floors: FloorDetector,
    fusion: FusionController,

    last_direction: Option<f64>,
    scans_processed: u64,
    floor_changes: u64,
    events_emitted: u64,
}

impl PositioningEngine {
    pub fn new(config: PositioningConfig, radio_map: RadioMap) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            steps: StepDetector::new(config.step.clone()),
            heading: HeadingTracker::new(),
            floors: FloorDetector::new(config.floor.clone()),
            fusion: FusionController::new(config.fusion.clone()),
            radio_map,
            config,
            last_direction: None,
            scans_processed: 0,
            floor_changes: 0,
            events_emitted: 0,
        })
    }

    /// Preload the radio map from a store, once, at session start.
    pub fn from_store<S: FingerprintStore + ?Sized>(config: PositioningConfig, store: &S) -> Result<Self> {
        let map = RadioMap::build(&store.all_samples()?);
        Self::new(config, map)
    }

    /// Rebuild the radio map after the store was edited.
    pub fn reload_radio_map<S: FingerprintStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        self.set_radio_map(RadioMap::build(&store.all_samples()?));
        Ok(())
    }

    pub fn set_radio_map(&mut self, radio_map: RadioMap) {
        log::info!("Radio map replaced: {} locations", radio_map.len());
        self.radio_map = radio_map;
    }

    pub fn radio_map(&self) -> &RadioMap {
        &self.radio_map
    }

    pub fn config(&self) -> &PositioningConfig {
        &self.config
    }

    pub fn set_step_thresholds(&mut self, min_freq: f64, max_freq: f64, max_top: f64) -> Result<()> {
        if !(min_freq > 0.0 && min_freq < max_freq && max_top > 0.0) {
            return Err(PositioningError::InvalidConfig(format!(
                "step thresholds min {} max {} top {}",
                min_freq, max_freq, max_top
            )));
        }
        self.config.step.min_freq = min_freq;
        self.config.step.max_freq = max_freq;
        self.config.step.max_top = max_top;
        self.steps.set_thresholds(min_freq, max_freq, max_top);
        Ok(())
    }

    pub fn set_knn(&mut self, knn_number: usize, max_distance: f64, algorithm: EstimationStrategy) -> Result<()> {
        if knn_number < 1 || !(max_distance >= 0.0) {
            return Err(PositioningError::InvalidConfig(format!(
                "knn number {} max distance {}",
                knn_number, max_distance
            )));
        }
        self.config.knn.knn_number = knn_number;
        self.config.knn.max_distance = max_distance;
        self.config.knn.algorithm = algorithm;
        Ok(())
    }

    fn knn_options(&self) -> KnnOptions {
        let knn = &self.config.knn;
        KnnOptions {
            use_weighting: knn.use_weighting,
            k: knn.knn_number,
            use_mean: knn.use_mean,
            current_position: self.fusion.displayed(),
            current_floor: self.fusion.floor(),
            // Until indoors the displayed position is only a guess
            ignore_max_range: !self.fusion.is_indoors(),
            max_range: knn.max_distance,
        }
    }

    /// Collapse candidates with the configured strategy, falling back to `best`
    /// when there are too few for it.
    fn estimate_position(&self, candidates: &[Candidate]) -> Option<LatLng> {
        let strategy = self.config.knn.algorithm;
        match estimate(candidates, strategy) {
            Ok(p) => Some(p),
            Err(PositioningError::InsufficientData { available, .. }) if available > 0 => {
                log::debug!(
                    "{} needs more candidates than {}, using best match",
                    strategy,
                    available
                );
                estimate(candidates, EstimationStrategy::Best).ok()
            }
            Err(e) => {
                log::warn!("Position estimate failed: {}", e);
                None
            }
        }
    }

    pub fn feed_scan(&mut self, scan: &[AccessPointReading]) -> Vec<PositionEvent> {
        self.scans_processed += 1;
        let candidates = knn_match(&self.radio_map, scan, &self.knn_options());

        let fix = self
            .estimate_position(&candidates)
            .zip(confidence_radius(&candidates));
        let events = self.fusion.apply_wifi(fix);
        self.heading.set_frozen(self.fusion.is_indoors());
        events
    }

    pub fn feed_accel(&mut self, accel: &AccelData) -> Vec<PositionEvent> {
        if !self.fusion.is_indoors() {
            return Vec::new();
        }
        let heading = self.heading.heading().unwrap_or(0.0);
        match self.steps.process_sample(accel, heading) {
            Some(step) => self.fusion.apply_step(&step),
            None => Vec::new(),
        }
    }

    /// Gyro-only orientation: drives heading and the step detector's pitch.
    pub fn feed_game_rotation(&mut self, orientation: &OrientationData) -> Vec<PositionEvent> {
        self.heading.update_gyro(orientation.yaw);
        self.steps.set_pitch(orientation.pitch);
        self.direction_event()
    }

    /// Magnetometer-backed orientation: calibrates the heading offset while outdoors.
    pub fn feed_rotation(&mut self, orientation: &OrientationData) -> Vec<PositionEvent> {
        if self.heading.update_magnetic(orientation.yaw) {
            self.direction_event()
        } else {
            Vec::new()
        }
    }

    fn direction_event(&mut self) -> Vec<PositionEvent> {
        match self.heading.heading() {
            Some(degrees) if self.last_direction != Some(degrees) => {
                self.last_direction = Some(degrees);
                vec![PositionEvent::DirectionChanged { degrees }]
            }
            _ => Vec::new(),
        }
    }

    pub fn feed_pressure(&mut self, baro: &BaroData) -> Vec<PositionEvent> {
        // The altitude baseline keeps building while outdoors
        let Some(change) = self.floors.process(baro) else {
            return Vec::new();
        };
        let events = self.fusion.apply_floor(change);
        if !events.is_empty() {
            self.floor_changes += 1;
        }
        events
    }

    pub(crate) fn count_emitted(&mut self, events: Vec<PositionEvent>) -> Vec<PositionEvent> {
        self.events_emitted += events.len() as u64;
        events
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            position: self.fusion.displayed(),
            floor: self.fusion.floor(),
            is_indoors: self.fusion.is_indoors(),
            heading_deg: self.heading.heading(),
            accuracy_m: self.fusion.accuracy(),
            steps_accepted: self.steps.accepted_count(),
            steps_rejected: self.steps.rejected_count(),
            scans_processed: self.scans_processed,
            floor_changes: self.floor_changes,
            events_emitted: self.events_emitted,
            radio_map_locations: self.radio_map.len(),
        }
    }
}
