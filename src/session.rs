// session.rs — Recorded sensor sessions (.json or .json.gz) for replay
//
// A session is a flat, timestamp-ordered list of readings. Each reading may
// carry any subset of the input streams captured at that instant.

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::runtime::SensorInput;
use crate::types::{AccelData, AccessPointReading, BaroData, OrientationData};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: f64,
    #[serde(default)]
    pub scan: Option<Vec<AccessPointReading>>,
    #[serde(default)]
    pub accel: Option<AccelData>,
    #[serde(default)]
    pub game_rotation: Option<OrientationData>,
    #[serde(default)]
    pub rotation: Option<OrientationData>,
    #[serde(default)]
    pub baro: Option<BaroData>,
}

impl Reading {
    /// Engine inputs for this reading. Orientation goes first so steps use the
    /// pitch and heading captured alongside them.
    pub fn into_inputs(self) -> Vec<SensorInput> {
        let mut inputs = Vec::new();
        if let Some(o) = self.game_rotation {
            inputs.push(SensorInput::GameRotation(o));
        }
        if let Some(o) = self.rotation {
            inputs.push(SensorInput::Rotation(o));
        }
        if let Some(a) = self.accel {
            inputs.push(SensorInput::Accel(a));
        }
        if let Some(b) = self.baro {
            inputs.push(SensorInput::Pressure(b));
        }
        if let Some(scan) = self.scan {
            inputs.push(SensorInput::Scan(scan));
        }
        inputs
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionLog {
    pub readings: Vec<Reading>,
}

impl SessionLog {
    pub fn duration_secs(&self) -> f64 {
        match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    pub fn scan_count(&self) -> usize {
        self.readings.iter().filter(|r| r.scan.is_some()).count()
    }
}

/// Load a session, gunzipping when the file name ends in `.gz`.
pub fn load_session(path: &Path) -> Result<SessionLog> {
    let file = File::open(path)?;
    let mut session: SessionLog = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    session
        .readings
        .sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap_or(std::cmp::Ordering::Equal));
    log::info!(
        "Loaded session {}: {} readings, {} scans, {:.1}s",
        path.display(),
        session.readings.len(),
        session.scan_count(),
        session.duration_secs()
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const SESSION: &str = r#"{
        "readings": [
            { "timestamp": 1.0, "scan": [ { "bssid": "aa", "ssid": "x", "level": -50.0 } ] },
            { "timestamp": 0.5,
              "game_rotation": { "timestamp": 0.5, "yaw": 10.0, "roll": 0.0, "pitch": 20.0 },
              "accel": { "timestamp": 0.5, "x": 0.0, "y": 0.1, "z": 4.5 } },
            { "timestamp": 1.5, "baro": { "timestamp": 1.5, "pressure_hpa": 1001.2 } }
        ]
    }"#;

    #[test]
    fn test_load_plain_and_gz() {
        let dir = std::env::temp_dir();
        let plain = dir.join(format!("indoor_session_{}.json", std::process::id()));
        std::fs::write(&plain, SESSION).unwrap();

        let gz_path = dir.join(format!("indoor_session_{}.json.gz", std::process::id()));
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(SESSION.as_bytes()).unwrap();
        encoder.finish().unwrap();

        for path in [&plain, &gz_path] {
            let session = load_session(path).unwrap();
            assert_eq!(session.readings.len(), 3);
            // Sorted by timestamp on load
            assert_eq!(session.readings[0].timestamp, 0.5);
            assert_eq!(session.scan_count(), 1);
            assert_eq!(session.duration_secs(), 1.0);
        }

        let _ = std::fs::remove_file(&plain);
        let _ = std::fs::remove_file(&gz_path);
    }

    #[test]
    fn test_orientation_precedes_accel() {
        let session: SessionLog = serde_json::from_str(SESSION).unwrap();
        let inputs = session.readings[1].clone().into_inputs();
        assert_eq!(inputs.len(), 2);
        assert!(matches!(inputs[0], SensorInput::GameRotation(_)));
        assert!(matches!(inputs[1], SensorInput::Accel(_)));
    }
}
