use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Planar or geographic coordinate pair, degrees when geographic.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

// ─── Fingerprint data ────────────────────────────────────────────────────────

/// A surveyed point inside a building.
///
/// Two locations are the same physical point only when latitude, longitude,
/// floor and room all match exactly. `building` is carried along but does not
/// take part in identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub floor: i64,
    pub room: String,
    pub building: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(floor: i64, room: &str, building: &str, lat: f64, lng: f64) -> Self {
        Self {
            floor,
            room: room.to_string(),
            building: building.to_string(),
            lat,
            lng,
        }
    }

    pub fn coordinate(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

// -0.0 and 0.0 are the same coordinate
fn coord_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        coord_bits(self.lat) == coord_bits(other.lat)
            && coord_bits(self.lng) == coord_bits(other.lng)
            && self.floor == other.floor
            && self.room == other.room
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.floor.hash(state);
        coord_bits(self.lat).hash(state);
        coord_bits(self.lng).hash(state);
        self.room.hash(state);
    }
}

/// One stored signal observation, as read back from the fingerprint store.
///
/// Records written by older tools may be partial; missing fields deserialize
/// to values that `is_well_formed` rejects so aggregation can skip them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub bssid: String,
    #[serde(default)]
    pub ssid: String,
    #[serde(default = "missing_level", deserialize_with = "level_or_missing")]
    pub level: f64,
    #[serde(default)]
    pub timestamp: i64,
}

fn missing_level() -> f64 {
    f64::NAN
}

// Non-finite levels are written out as `null`; read them back as missing.
fn level_or_missing<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl RawSample {
    pub fn new(location: Location, bssid: &str, ssid: &str, level: f64, timestamp: i64) -> Self {
        Self {
            location: Some(location),
            bssid: bssid.to_string(),
            ssid: ssid.to_string(),
            level,
            timestamp,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match &self.location {
            Some(loc) => {
                !self.bssid.is_empty()
                    && self.level.is_finite()
                    && loc.lat.is_finite()
                    && loc.lng.is_finite()
            }
            None => false,
        }
    }
}

/// One access point as reported by a live Wi-Fi scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessPointReading {
    pub bssid: String,
    #[serde(default)]
    pub ssid: String,
    pub level: f64,
}

impl AccessPointReading {
    pub fn new(bssid: &str, ssid: &str, level: f64) -> Self {
        Self {
            bssid: bssid.to_string(),
            ssid: ssid.to_string(),
            level,
        }
    }
}

/// Result of one scan cycle, consumed immediately.
pub type LiveScan = Vec<AccessPointReading>;

/// Mean and median level of one access point at one location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSignal {
    pub bssid: String,
    pub ssid: String,
    pub mean: f64,
    pub median: f64,
    pub location: Location,
}

/// A ranked radio-map location for one matching cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub location: Location,
    /// Weighted euclidean distance in signal space, never negative.
    pub score: f64,
}

impl Candidate {
    pub fn coordinate(&self) -> LatLng {
        self.location.coordinate()
    }
}

// ─── Motion sensor samples ───────────────────────────────────────────────────

/// Linear (gravity-removed) acceleration in the device frame, m/s².
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccelData {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Device orientation in degrees, each in [0, 360).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrientationData {
    pub timestamp: f64,
    pub yaw: f64,
    pub roll: f64,
    pub pitch: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaroData {
    pub timestamp: f64,
    pub pressure_hpa: f64,
}
