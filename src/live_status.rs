use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::EngineSnapshot;

/// Status file rewritten periodically while a session runs.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_time_secs: f64,
    pub uptime_seconds: u64,
    // Position
    pub lat: f64,
    pub lng: f64,
    pub floor: i64,
    pub is_indoors: bool,
    pub heading_deg: Option<f64>,
    pub accuracy_m: Option<f64>,
    // Counters
    pub scans_processed: u64,
    pub steps_accepted: u64,
    pub steps_rejected: u64,
    pub floor_changes: u64,
    pub events_emitted: u64,
    pub inputs_dropped: u64,
    pub radio_map_locations: usize,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            session_time_secs: 0.0,
            uptime_seconds: 0,
            lat: 0.0,
            lng: 0.0,
            floor: 0,
            is_indoors: false,
            heading_deg: None,
            accuracy_m: None,
            scans_processed: 0,
            steps_accepted: 0,
            steps_rejected: 0,
            floor_changes: 0,
            events_emitted: 0,
            inputs_dropped: 0,
            radio_map_locations: 0,
        }
    }

    /// Copy the engine-side fields from a snapshot.
    pub fn update_from(&mut self, snapshot: &EngineSnapshot) {
        self.timestamp = current_timestamp();
        self.lat = snapshot.position.lat;
        self.lng = snapshot.position.lng;
        self.floor = snapshot.floor;
        self.is_indoors = snapshot.is_indoors;
        self.heading_deg = snapshot.heading_deg;
        self.accuracy_m = snapshot.accuracy_m;
        self.scans_processed = snapshot.scans_processed;
        self.steps_accepted = snapshot.steps_accepted;
        self.steps_rejected = snapshot.steps_rejected;
        self.floor_changes = snapshot.floor_changes;
        self.events_emitted = snapshot.events_emitted;
        self.radio_map_locations = snapshot.radio_map_locations;
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
