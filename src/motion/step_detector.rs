//! Step detection and per-step displacement for dead reckoning.
//!
//! Works on linear (gravity-removed) acceleration rotated by the device pitch
//! into two components: a vertical one that times the step and a forward one
//! whose integral over the rising phase gives the step length.
//!
//! A step is a rise of vertical acceleration above `rising_threshold`
//! followed by a fall below `falling_threshold`. It is accepted when the
//! rise-to-fall frequency lies strictly between `min_freq` and `max_freq`,
//! the peak stayed under `max_top` (shake rejection), and the forward
//! acceleration never saturated.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::types::AccelData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    /// Vertical acceleration that starts a step (m/s²).
    pub rising_threshold: f64,
    /// Vertical acceleration that ends it (m/s²).
    pub falling_threshold: f64,
    /// Forward acceleration above this marks the step as shaking.
    pub saturation_threshold: f64,
    /// Forward samples with magnitude at or below this are not integrated.
    pub forward_deadband: f64,
    /// Each forward sample contributes `forward / integration_divisor` metres.
    pub integration_divisor: f64,
    /// Step frequency bounds, Hz (exclusive).
    pub min_freq: f64,
    pub max_freq: f64,
    /// Peak vertical acceleration ceiling (exclusive).
    pub max_top: f64,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            rising_threshold: 4.0,
            falling_threshold: 0.0,
            saturation_threshold: 4.0,
            forward_deadband: 0.5,
            integration_divisor: 15.0,
            min_freq: 3.0,
            max_freq: 9.0,
            max_top: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    Rising,
}

/// One accepted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Timestamp of the falling edge, seconds.
    pub timestamp: f64,
    /// Step length, metres.
    pub distance: f64,
    /// Walking direction, degrees clockwise from north.
    pub heading_deg: f64,
    pub frequency: f64,
    pub peak: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRejection {
    Frequency,
    Shake,
    Saturated,
}

pub struct StepDetector {
    config: StepDetectorConfig,
    phase: StepPhase,
    pitch_deg: f64,

    rise_start: f64,
    peak: f64,
    distance: f64,
    saturated: bool,

    accepted: u64,
    rejected: u64,
    last_rejection: Option<StepRejection>,
}

impl StepDetector {
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            config,
            phase: StepPhase::Idle,
            pitch_deg: 0.0,
            rise_start: 0.0,
            peak: 0.0,
            distance: 0.0,
            saturated: false,
            accepted: 0,
            rejected: 0,
            last_rejection: None,
        }
    }

    pub fn config(&self) -> &StepDetectorConfig {
        &self.config
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Latest device pitch, degrees. Applied to every following sample.
    pub fn set_pitch(&mut self, pitch_deg: f64) {
        self.pitch_deg = pitch_deg;
    }

    /// Retune frequency bounds and shake ceiling without losing step state.
    pub fn set_thresholds(&mut self, min_freq: f64, max_freq: f64, max_top: f64) {
        self.config.min_freq = min_freq;
        self.config.max_freq = max_freq;
        self.config.max_top = max_top;
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    pub fn last_rejection(&self) -> Option<StepRejection> {
        self.last_rejection
    }

    /// Vertical and forward acceleration for the current pitch.
    pub fn rotate(&self, accel: &AccelData) -> (f64, f64) {
        let (sin_p, cos_p) = self.pitch_deg.to_radians().sin_cos();
        let a = Vector3::new(accel.x, accel.y, accel.z);
        let up = Vector3::new(0.0, sin_p, cos_p);
        let forward = Vector3::new(0.0, -cos_p, sin_p);
        (up.dot(&a), forward.dot(&a))
    }

    /// Feed one linear-acceleration sample; returns a step on an accepted falling edge.
    pub fn process_sample(&mut self, accel: &AccelData, heading_deg: f64) -> Option<StepEvent> {
        let (vertical, forward) = self.rotate(accel);

        if self.phase == StepPhase::Rising && forward.abs() > self.config.forward_deadband {
            self.distance += forward / self.config.integration_divisor;
            if forward > self.config.saturation_threshold {
                self.saturated = true;
            }
        }

        if vertical > self.config.rising_threshold {
            if self.phase == StepPhase::Idle {
                self.phase = StepPhase::Rising;
                self.rise_start = accel.timestamp;
            }
            self.peak = self.peak.max(vertical);
            None
        } else if vertical < self.config.falling_threshold && self.phase == StepPhase::Rising {
            let event = self.evaluate(accel.timestamp, heading_deg);
            self.phase = StepPhase::Idle;
            self.peak = 0.0;
            self.distance = 0.0;
            self.saturated = false;
            event
        } else {
            None
        }
    }

    fn evaluate(&mut self, timestamp: f64, heading_deg: f64) -> Option<StepEvent> {
        let elapsed_ms = (timestamp - self.rise_start) * 1000.0;
        let frequency = 1000.0 / elapsed_ms;

        let rejection = if !(frequency > self.config.min_freq && frequency < self.config.max_freq) {
            Some(StepRejection::Frequency)
        } else if !(self.peak < self.config.max_top) {
            Some(StepRejection::Shake)
        } else if self.saturated {
            Some(StepRejection::Saturated)
        } else {
            None
        };

        if let Some(reason) = rejection {
            self.rejected += 1;
            self.last_rejection = Some(reason);
            log::debug!(
                "Step rejected ({:?}): freq {:.2} Hz, peak {:.2}",
                reason,
                frequency,
                self.peak
            );
            return None;
        }

        self.accepted += 1;
        log::debug!(
            "Step accepted: {:.3} m at {:.1}°, freq {:.2} Hz",
            self.distance,
            heading_deg,
            frequency
        );
        Some(StepEvent {
            timestamp,
            distance: self.distance,
            heading_deg,
            frequency,
            peak: self.peak,
        })
    }
}
