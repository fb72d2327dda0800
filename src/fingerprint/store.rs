use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PositioningError, Result};
use crate::types::{AccessPointReading, Location, RawSample};

/// Persistence seam for surveyed samples.
///
/// The engine only ever reads through `all_samples`, once per session and
/// again after edits; writes come from the survey tooling.
pub trait FingerprintStore {
    fn all_samples(&self) -> Result<Vec<RawSample>>;
    fn add_sample(&mut self, sample: RawSample) -> Result<()>;
    /// Remove a location and every sample taken there. Returns removed sample count.
    fn delete_location(&mut self, location: &Location) -> Result<usize>;
    fn delete_all(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    samples: Vec<RawSample>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FingerprintStore for InMemoryStore {
    fn all_samples(&self) -> Result<Vec<RawSample>> {
        Ok(self.samples.clone())
    }

    fn add_sample(&mut self, sample: RawSample) -> Result<()> {
        self.samples.push(sample);
        Ok(())
    }

    fn delete_location(&mut self, location: &Location) -> Result<usize> {
        let before = self.samples.len();
        self.samples
            .retain(|s| s.location.as_ref().map_or(true, |l| l != location));
        Ok(before - self.samples.len())
    }

    fn delete_all(&mut self) -> Result<()> {
        self.samples.clear();
        Ok(())
    }
}

/// On-disk layout of a fingerprint file. Entries are decoded one at a time
/// so a single partial record cannot fail the whole load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FingerprintFile {
    samples: Vec<Value>,
}

/// Fingerprint store backed by a pretty-printed JSON file.
///
/// Every write rewrites the whole file; survey data sets are small. Entries
/// that do not decode as a sample are skipped on load but written back
/// unchanged until `delete_all`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
    unreadable: Vec<Value>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            log::info!("Fingerprint file {} not found, starting empty", path.display());
            return Ok(Self {
                path,
                inner: InMemoryStore::new(),
                unreadable: Vec::new(),
            });
        }

        let text = fs::read_to_string(&path)?;
        let file: FingerprintFile = serde_json::from_str(&text)?;
        let mut samples = Vec::with_capacity(file.samples.len());
        let mut unreadable = Vec::new();
        for entry in file.samples {
            match serde_json::from_value::<RawSample>(entry.clone()) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    log::debug!("Skipping stored entry: {}", e);
                    unreadable.push(entry);
                }
            }
        }
        if !unreadable.is_empty() {
            log::warn!("{} unreadable entries in {}", unreadable.len(), path.display());
        }
        log::info!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self {
            path,
            inner: InMemoryStore::with_samples(samples),
            unreadable,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in the file that could not be read as samples.
    pub fn unreadable_entries(&self) -> usize {
        self.unreadable.len()
    }

    fn save(&self) -> Result<()> {
        let mut samples = self
            .inner
            .all_samples()?
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        samples.extend(self.unreadable.iter().cloned());
        let file = FingerprintFile { samples };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl FingerprintStore for JsonFileStore {
    fn all_samples(&self) -> Result<Vec<RawSample>> {
        self.inner.all_samples()
    }

    fn add_sample(&mut self, sample: RawSample) -> Result<()> {
        self.inner.add_sample(sample)?;
        self.save()
    }

    fn delete_location(&mut self, location: &Location) -> Result<usize> {
        let removed = self.inner.delete_location(location)?;
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    fn delete_all(&mut self) -> Result<()> {
        self.inner.delete_all()?;
        self.unreadable.clear();
        self.save()
    }
}

/// Store one live scan taken at a known location, one sample per access point.
///
/// Returns the number of samples written. Readings without a BSSID or with a
/// non-finite level are skipped.
pub fn record_scan<S: FingerprintStore + ?Sized>(
    store: &mut S,
    location: &Location,
    scan: &[AccessPointReading],
    timestamp: i64,
) -> Result<usize> {
    if !location.lat.is_finite() || !location.lng.is_finite() {
        return Err(PositioningError::Store(format!(
            "location '{}' has non-finite coordinates",
            location.room
        )));
    }

    let mut written = 0;
    for reading in scan.iter().filter(|r| !r.bssid.is_empty() && r.level.is_finite()) {
        store.add_sample(RawSample::new(
            location.clone(),
            &reading.bssid,
            &reading.ssid,
            reading.level,
            timestamp,
        ))?;
        written += 1;
    }
    log::debug!("Recorded {} samples at {} (floor {})", written, location.room, location.floor);
    Ok(written)
}
