// radio_map.rs — Aggregates raw survey samples into per-location fingerprints
//
// Locations keep the order in which they first appear in the sample list and
// each location's signals are ordered strongest-first by mean level, so two
// builds from the same samples compare equal.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{AggregatedSignal, Location, RawSample};

#[derive(Clone, Debug, PartialEq)]
pub struct LocationFingerprint {
    pub location: Location,
    /// One entry per access point, unique by BSSID.
    pub signals: Vec<AggregatedSignal>,
}

impl LocationFingerprint {
    pub fn signal(&self, bssid: &str) -> Option<&AggregatedSignal> {
        self.signals.iter().find(|s| s.bssid == bssid)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RadioMap {
    entries: Vec<LocationFingerprint>,
    index: HashMap<Location, usize>,
    skipped: usize,
}

/// Per-(location, AP) accumulator used while grouping.
struct SignalGroup {
    ssid: String,
    levels: Vec<f64>,
}

impl RadioMap {
    /// Group samples by location then by BSSID and compute mean and median levels.
    ///
    /// Samples missing a location, BSSID or finite level are counted and skipped.
    pub fn build(samples: &[RawSample]) -> Self {
        let mut order: Vec<Location> = Vec::new();
        let mut groups: HashMap<Location, BTreeMap<String, SignalGroup>> = HashMap::new();
        let mut skipped = 0usize;

        for sample in samples {
            if !sample.is_well_formed() {
                skipped += 1;
                continue;
            }
            let Some(location) = sample.location.as_ref() else {
                skipped += 1;
                continue;
            };

            let per_ap = groups.entry(location.clone()).or_insert_with(|| {
                order.push(location.clone());
                BTreeMap::new()
            });
            per_ap
                .entry(sample.bssid.clone())
                .or_insert_with(|| SignalGroup {
                    ssid: sample.ssid.clone(),
                    levels: Vec::new(),
                })
                .levels
                .push(sample.level);
        }

        let mut entries = Vec::with_capacity(order.len());
        let mut index = HashMap::with_capacity(order.len());
        for location in order {
            let Some(per_ap) = groups.remove(&location) else {
                continue;
            };
            let mut signals: Vec<AggregatedSignal> = per_ap
                .into_iter()
                .map(|(bssid, group)| AggregatedSignal {
                    bssid,
                    ssid: group.ssid,
                    mean: mean(&group.levels),
                    median: median(&group.levels),
                    location: location.clone(),
                })
                .collect();
            signals.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(Ordering::Equal));

            index.insert(location.clone(), entries.len());
            entries.push(LocationFingerprint { location, signals });
        }

        let map = Self {
            entries,
            index,
            skipped,
        };
        log::info!(
            "Radio map built: {} locations, {} signals, {} samples skipped",
            map.len(),
            map.signal_count(),
            skipped
        );
        map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationFingerprint> {
        self.entries.iter()
    }

    pub fn get(&self, location: &Location) -> Option<&LocationFingerprint> {
        self.index.get(location).map(|&i| &self.entries[i])
    }

    /// Total number of aggregated signals across all locations.
    pub fn signal_count(&self) -> usize {
        self.entries.iter().map(|e| e.signals.len()).sum()
    }

    /// Samples rejected as malformed during the last build.
    pub fn skipped_samples(&self) -> usize {
        self.skipped
    }

    pub fn floors(&self) -> BTreeSet<i64> {
        self.entries.iter().map(|e| e.location.floor).collect()
    }
}

pub fn mean(levels: &[f64]) -> f64 {
    if levels.is_empty() {
        return f64::NAN;
    }
    levels.iter().sum::<f64>() / levels.len() as f64
}

pub fn median(levels: &[f64]) -> f64 {
    if levels.is_empty() {
        return f64::NAN;
    }
    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
