// floor_detector.rs — Barometric floor-change detection
//
// Smoothed pressure is sampled into an altitude window every
// `sample_interval_secs`. When the newest altitude differs from the oldest
// by more than `altitude_threshold_m` a floor change fires and the window is
// cleared, so the next change needs a fresh baseline.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::geo::{pressure_to_altitude, PRESSURE_STANDARD_ATMOSPHERE};
use crate::types::BaroData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorDetectorConfig {
    /// Weight kept from the previous smoothed pressure.
    pub smoothing_alpha: f64,
    pub sample_interval_secs: f64,
    /// Altitude window length (30 × 0.5 s ≈ 15 s).
    pub window_len: usize,
    pub altitude_threshold_m: f64,
    pub reference_pressure_hpa: f64,
}

impl Default for FloorDetectorConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.9,
            sample_interval_secs: 0.5,
            window_len: 30,
            altitude_threshold_m: 2.0,
            reference_pressure_hpa: PRESSURE_STANDARD_ATMOSPHERE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloorChange {
    Up,
    Down,
}

pub struct FloorDetector {
    config: FloorDetectorConfig,
    smoothed: Option<f64>,
    last_sample_time: f64,
    altitudes: VecDeque<f64>,
}

impl FloorDetector {
    pub fn new(config: FloorDetectorConfig) -> Self {
        let capacity = config.window_len + 1;
        Self {
            config,
            smoothed: None,
            last_sample_time: 0.0,
            altitudes: VecDeque::with_capacity(capacity),
        }
    }

    /// Current smoothed pressure, hPa.
    pub fn smoothed_pressure(&self) -> Option<f64> {
        self.smoothed
    }

    pub fn window_len(&self) -> usize {
        self.altitudes.len()
    }

    pub fn process(&mut self, baro: &BaroData) -> Option<FloorChange> {
        let alpha = self.config.smoothing_alpha;
        let pressure = match self.smoothed {
            None => {
                self.last_sample_time = baro.timestamp;
                baro.pressure_hpa
            }
            Some(prev) => alpha * prev + (1.0 - alpha) * baro.pressure_hpa,
        };
        self.smoothed = Some(pressure);

        if baro.timestamp - self.last_sample_time < self.config.sample_interval_secs {
            return None;
        }
        self.last_sample_time = baro.timestamp;

        let altitude = pressure_to_altitude(self.config.reference_pressure_hpa, pressure);
        self.altitudes.push_back(altitude);
        if self.altitudes.len() > self.config.window_len {
            self.altitudes.pop_front();
        }

        let oldest = *self.altitudes.front()?;
        let delta = altitude - oldest;
        let change = if delta > self.config.altitude_threshold_m {
            FloorChange::Up
        } else if delta < -self.config.altitude_threshold_m {
            FloorChange::Down
        } else {
            return None;
        };

        log::info!("Floor change {:?}: {:+.2} m over {} samples", change, delta, self.altitudes.len());
        self.altitudes.clear();
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pressure that reads `metres` higher than `base_hpa`.
    fn pressure_above(base_hpa: f64, metres: f64) -> f64 {
        let alt = pressure_to_altitude(PRESSURE_STANDARD_ATMOSPHERE, base_hpa) + metres;
        PRESSURE_STANDARD_ATMOSPHERE * (1.0 - alt / 44330.0).powf(5.255)
    }

    fn feed(detector: &mut FloorDetector, from: usize, to: usize, pressure: f64) -> Vec<FloorChange> {
        (from..to)
            .filter_map(|i| {
                detector.process(&BaroData {
                    timestamp: i as f64 * 0.1,
                    pressure_hpa: pressure,
                })
            })
            .collect()
    }

    #[test]
    fn test_constant_pressure_is_silent() {
        let mut detector = FloorDetector::new(FloorDetectorConfig::default());
        assert!(feed(&mut detector, 0, 400, 1000.0).is_empty());
        assert_eq!(detector.window_len(), 30);
    }

    #[test]
    fn test_climb_emits_single_up() {
        let mut detector = FloorDetector::new(FloorDetectorConfig::default());
        assert!(feed(&mut detector, 0, 200, 1000.0).is_empty());

        let upstairs = pressure_above(1000.0, 3.0);
        let events = feed(&mut detector, 200, 400, upstairs);
        assert_eq!(events, vec![FloorChange::Up]);
    }

    #[test]
    fn test_window_clears_after_event() {
        let mut detector = FloorDetector::new(FloorDetectorConfig::default());
        feed(&mut detector, 0, 200, 1000.0);
        let upstairs = pressure_above(1000.0, 3.0);
        let mut fired_at = None;
        for i in 200..400 {
            let event = detector.process(&BaroData { timestamp: i as f64 * 0.1, pressure_hpa: upstairs });
            if event.is_some() {
                fired_at = Some(i);
                break;
            }
        }
        assert!(fired_at.is_some());
        assert_eq!(detector.window_len(), 0);
    }

    #[test]
    fn test_descent_emits_down() {
        let mut detector = FloorDetector::new(FloorDetectorConfig::default());
        feed(&mut detector, 0, 200, 1000.0);
        let downstairs = pressure_above(1000.0, -3.0);
        assert_eq!(feed(&mut detector, 200, 400, downstairs), vec![FloorChange::Down]);
    }

    #[test]
    fn test_first_sample_initialises_without_smoothing() {
        let mut detector = FloorDetector::new(FloorDetectorConfig::default());
        detector.process(&BaroData { timestamp: 0.0, pressure_hpa: 990.0 });
        assert_eq!(detector.smoothed_pressure(), Some(990.0));
        detector.process(&BaroData { timestamp: 0.1, pressure_hpa: 1000.0 });
        let p = detector.smoothed_pressure().unwrap();
        assert!((p - 991.0).abs() < 1e-9);
    }
}
