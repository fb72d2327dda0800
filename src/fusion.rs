// fusion.rs — Owns the displayed position and blends Wi-Fi fixes with steps
//
// Wi-Fi fixes pull the displayed position toward them: fully on the first fix,
// then damped once indoors. Steps move it directly. Both paths go through
// `&mut self`, so the caller serialises them (see `runtime`).

use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;
use crate::geo;
use crate::motion::{FloorChange, StepEvent};
use crate::types::LatLng;

// ─── Events ──────────────────────────────────────────────────────────────────

/// Presentation-facing notifications, emitted at the rate updates are computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    PositionChanged { lat: f64, lng: f64 },
    DirectionChanged { degrees: f64 },
    AccuracyChanged { radius: f64 },
    FloorChanged { change: FloorChange, floor: i64 },
    /// `false` means the position indicator should be hidden.
    IndoorStatusChanged { indoors: bool },
}

impl PositionEvent {
    fn position(p: LatLng) -> Self {
        Self::PositionChanged { lat: p.lat, lng: p.lng }
    }
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct FusionController {
    config: FusionConfig,
    displayed: LatLng,
    is_indoors: bool,
    floor: i64,
    accuracy: Option<f64>,
}

impl FusionController {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            displayed: config.initial_position,
            floor: config.initial_floor,
            is_indoors: false,
            accuracy: None,
            config,
        }
    }

    pub fn displayed(&self) -> LatLng {
        self.displayed
    }

    pub fn is_indoors(&self) -> bool {
        self.is_indoors
    }

    pub fn floor(&self) -> i64 {
        self.floor
    }

    /// Last accuracy radius in metres, once a fix has been applied.
    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    /// Apply one Wi-Fi cycle. `None` means no radio-map location survived matching.
    pub fn apply_wifi(&mut self, fix: Option<(LatLng, f64)>) -> Vec<PositionEvent> {
        let mut events = Vec::new();

        let Some((estimate, confidence)) = fix else {
            self.accuracy = None;
            if self.is_indoors {
                self.is_indoors = false;
                log::info!("Lost indoor fix, hiding position");
                events.push(PositionEvent::IndoorStatusChanged { indoors: false });
            }
            return events;
        };

        let weight = if self.is_indoors {
            self.config.indoor_weight
        } else {
            self.config.outdoor_weight
        };
        self.displayed = geo::interpolate(self.displayed, estimate, weight);

        if !self.is_indoors {
            self.is_indoors = true;
            log::info!(
                "Indoor fix acquired at ({:.6}, {:.6})",
                self.displayed.lat,
                self.displayed.lng
            );
            events.push(PositionEvent::IndoorStatusChanged { indoors: true });
        }

        let radius = confidence * self.config.accuracy_scale;
        self.accuracy = Some(radius);
        events.push(PositionEvent::position(self.displayed));
        events.push(PositionEvent::AccuracyChanged { radius });
        events
    }

    /// Move by one accepted step. Ignored until the first indoor fix.
    pub fn apply_step(&mut self, step: &StepEvent) -> Vec<PositionEvent> {
        if !self.is_indoors {
            return Vec::new();
        }
        self.displayed = geo::offset_by_step(self.displayed, step.heading_deg, step.distance);
        vec![PositionEvent::position(self.displayed)]
    }

    /// Switch between the two surveyed floors. Ignored until the first indoor fix.
    pub fn apply_floor(&mut self, change: FloorChange) -> Vec<PositionEvent> {
        if !self.is_indoors {
            return Vec::new();
        }
        self.floor = match change {
            FloorChange::Up => self.config.upper_floor,
            FloorChange::Down => self.config.initial_floor,
        };
        vec![PositionEvent::FloorChanged {
            change,
            floor: self.floor,
        }]
    }
}
