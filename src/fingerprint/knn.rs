// knn.rs — Weighted nearest-neighbour ranking of radio-map locations
//
// Not a voting classifier: every location on the current floor that shares
// all of the strongest live access points is scored by a (optionally
// weighted) euclidean distance in signal space and returned best-first.

use std::cmp::Ordering;

use crate::geo;
use crate::types::{AccessPointReading, Candidate, LatLng};

use super::radio_map::RadioMap;

#[derive(Clone, Debug, PartialEq)]
pub struct KnnOptions {
    pub use_weighting: bool,
    /// Strongest live access points to compare. Values below 1 are treated as 1.
    pub k: usize,
    /// Compare against stored mean levels (true) or medians (false).
    pub use_mean: bool,
    pub current_position: LatLng,
    pub current_floor: i64,
    pub ignore_max_range: bool,
    /// Metres from `current_position`; only consulted when `ignore_max_range` is false.
    pub max_range: f64,
}

impl Default for KnnOptions {
    fn default() -> Self {
        Self {
            use_weighting: false,
            k: 4,
            use_mean: true,
            current_position: LatLng::default(),
            current_floor: 0,
            ignore_max_range: true,
            max_range: 10.0,
        }
    }
}

/// Rank radio-map locations against a live scan, best match first.
///
/// A location is only returned when every one of the compared live access
/// points is present in its fingerprint. An empty map or scan yields an
/// empty list.
pub fn knn_match(map: &RadioMap, scan: &[AccessPointReading], options: &KnnOptions) -> Vec<Candidate> {
    if map.is_empty() || scan.is_empty() {
        return Vec::new();
    }

    let mut strongest: Vec<&AccessPointReading> = scan.iter().collect();
    strongest.sort_by(|a, b| b.level.partial_cmp(&a.level).unwrap_or(Ordering::Equal));
    strongest.truncate(options.k.max(1));
    let compared = strongest.len();

    let mut candidates = Vec::new();
    for entry in map.iter().filter(|e| e.location.floor == options.current_floor) {
        let range_weight = if options.ignore_max_range && !options.use_weighting {
            1.0
        } else {
            let distance = geo::distance_m(options.current_position, entry.location.coordinate());
            if !options.ignore_max_range && distance > options.max_range {
                continue;
            }
            if options.use_weighting {
                // A location under the user gets the largest finite weight
                (1.0 / (distance * distance / 100.0)).min(f64::MAX)
            } else {
                1.0
            }
        };

        let mut sum = 0.0;
        let mut matched = 0usize;
        for live in &strongest {
            let Some(stored) = entry.signal(&live.bssid) else {
                continue;
            };
            let stored_level = if options.use_mean { stored.mean } else { stored.median };
            let signal_weight = if options.use_weighting && live.level != 0.0 {
                (1.0 / live.level).abs()
            } else {
                1.0
            };
            let diff = live.level - stored_level;
            sum += diff * diff * signal_weight * range_weight;
            matched += 1;
        }

        if matched != compared {
            continue;
        }
        candidates.push(Candidate {
            location: entry.location.clone(),
            score: sum.sqrt(),
        });
    }

    candidates.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
    log::debug!(
        "KNN: {} of {} locations matched {} access points on floor {}",
        candidates.len(),
        map.len(),
        compared,
        options.current_floor
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, RawSample};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn loc(room: &str, floor: i64, lat: f64) -> Location {
        Location::new(floor, room, "FJB", lat, -3.17)
    }

    fn samples_at(location: &Location, readings: &[(&str, f64)]) -> Vec<RawSample> {
        readings
            .iter()
            .map(|(bssid, level)| RawSample::new(location.clone(), bssid, "eduroam", *level, 0))
            .collect()
    }

    fn reading(bssid: &str, level: f64) -> AccessPointReading {
        AccessPointReading::new(bssid, "eduroam", level)
    }

    #[test]
    fn test_location_missing_an_ap_is_rejected() {
        let full = loc("full", 0, 55.9220);
        let partial = loc("partial", 0, 55.9221);
        let mut samples = samples_at(&full, &[("a", -50.0), ("b", -60.0), ("c", -70.0), ("d", -80.0)]);
        samples.extend(samples_at(&partial, &[("a", -50.0), ("b", -60.0), ("c", -70.0)]));
        let map = RadioMap::build(&samples);

        let scan = vec![reading("a", -51.0), reading("b", -61.0), reading("c", -71.0), reading("d", -81.0)];
        let result = knn_match(&map, &scan, &KnnOptions::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location, full);
        assert_abs_diff_eq!(result[0].score, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_only_top_k_live_aps_are_compared() {
        let a = loc("A", 0, 55.9220);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0), ("b", -60.0)]));
        // "weak" is not in the fingerprint but falls outside the top 2
        let scan = vec![reading("weak", -90.0), reading("a", -50.0), reading("b", -63.0)];
        let options = KnnOptions { k: 2, ..KnnOptions::default() };
        let result = knn_match(&map, &scan, &options);
        assert_eq!(result.len(), 1);
        assert_abs_diff_eq!(result[0].score, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scan_shorter_than_k_uses_all() {
        let a = loc("A", 0, 55.9220);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0), ("b", -60.0)]));
        let result = knn_match(&map, &[reading("a", -54.0)], &KnnOptions::default());
        assert_eq!(result.len(), 1);
        assert_abs_diff_eq!(result[0].score, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_other_floor_is_filtered() {
        let ground = loc("G", 0, 55.9220);
        let first = loc("F", 1, 55.9220);
        let mut samples = samples_at(&ground, &[("a", -50.0)]);
        samples.extend(samples_at(&first, &[("a", -50.0)]));
        let map = RadioMap::build(&samples);

        let options = KnnOptions { current_floor: 1, ..KnnOptions::default() };
        let result = knn_match(&map, &[reading("a", -50.0)], &options);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location.floor, 1);
    }

    #[test]
    fn test_range_filter() {
        let near = loc("near", 0, 55.92200);
        let far = loc("far", 0, 55.92300); // ~111 m north
        let mut samples = samples_at(&near, &[("a", -50.0)]);
        samples.extend(samples_at(&far, &[("a", -50.0)]));
        let map = RadioMap::build(&samples);

        let mut options = KnnOptions {
            current_position: LatLng::new(55.92200, -3.17),
            ignore_max_range: false,
            max_range: 10.0,
            ..KnnOptions::default()
        };
        let result = knn_match(&map, &[reading("a", -50.0)], &options);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location, near);

        options.ignore_max_range = true;
        assert_eq!(knn_match(&map, &[reading("a", -50.0)], &options).len(), 2);
    }

    #[test]
    fn test_location_exactly_at_max_range_is_kept() {
        let current = LatLng::new(55.92200, -3.17);
        let edge = loc("edge", 0, 55.92209);
        let map = RadioMap::build(&samples_at(&edge, &[("a", -50.0)]));
        let options = KnnOptions {
            current_position: current,
            ignore_max_range: false,
            max_range: geo::distance_m(current, edge.coordinate()),
            ..KnnOptions::default()
        };
        let result = knn_match(&map, &[reading("a", -50.0)], &options);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].location, edge);

        let tighter = KnnOptions { max_range: options.max_range - 1e-6, ..options };
        assert!(knn_match(&map, &[reading("a", -50.0)], &tighter).is_empty());
    }

    #[test]
    fn test_weighting_scales_by_signal_and_range() {
        let current = LatLng::new(55.92200, -3.17);
        let a = loc("A", 0, 55.92210);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0)]));
        let options = KnnOptions {
            use_weighting: true,
            current_position: current,
            ..KnnOptions::default()
        };
        // diff² = 100, signal weight 1/60, range weight 100 / d²
        let d = geo::distance_m(current, a.coordinate());
        let result = knn_match(&map, &[reading("a", -60.0)], &options);
        assert_eq!(result.len(), 1);
        assert_abs_diff_eq!(result[0].score, (100.0f64 / 60.0 * 100.0 / (d * d)).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_sub_metre_range_weight_follows_distance() {
        let current = LatLng::new(55.92200, -3.17);
        let near = loc("near", 0, 55.92200 + 0.2 * geo::LAT_DEG_PER_METER);
        let mid = loc("mid", 0, 55.92200 + 0.9 * geo::LAT_DEG_PER_METER);
        let mut samples = samples_at(&near, &[("a", -50.0)]);
        samples.extend(samples_at(&mid, &[("a", -50.0)]));
        let map = RadioMap::build(&samples);
        let options = KnnOptions {
            use_weighting: true,
            current_position: current,
            ..KnnOptions::default()
        };

        let result = knn_match(&map, &[reading("a", -51.0)], &options);
        assert_eq!(result.len(), 2);
        // The nearer point has the larger range weight, so the larger score
        assert_eq!(result[0].location, mid);
        assert_eq!(result[1].location, near);
        for candidate in &result {
            let d = geo::distance_m(current, candidate.location.coordinate());
            let expected = (1.0f64 / 51.0 * 100.0 / (d * d)).sqrt();
            assert_abs_diff_eq!(candidate.score, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_weighting_at_zero_distance_is_finite() {
        let current = LatLng::new(55.92200, -3.17);
        let a = loc("A", 0, 55.92200);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0)]));
        let options = KnnOptions {
            use_weighting: true,
            current_position: current,
            ..KnnOptions::default()
        };
        let result = knn_match(&map, &[reading("a", -50.0)], &options);
        assert_eq!(result.len(), 1);
        assert_abs_diff_eq!(result[0].score, 0.0);
    }

    #[test]
    fn test_median_option() {
        let a = loc("A", 0, 55.9220);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0), ("a", -52.0), ("a", -90.0)]));
        let options = KnnOptions { use_mean: false, ..KnnOptions::default() };
        let result = knn_match(&map, &[reading("a", -52.0)], &options);
        assert_abs_diff_eq!(result[0].score, 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        let a = loc("A", 0, 55.9220);
        let map = RadioMap::build(&samples_at(&a, &[("a", -50.0)]));
        assert!(knn_match(&map, &[], &KnnOptions::default()).is_empty());
        assert!(knn_match(&RadioMap::default(), &[reading("a", -50.0)], &KnnOptions::default()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_candidates_sorted_ascending(
            stored in prop::collection::vec(prop::collection::vec(-95.0f64..-30.0, 3), 1..20),
            live in prop::collection::vec(-95.0f64..-30.0, 3),
            weighted in any::<bool>(),
        ) {
            let mut samples = Vec::new();
            for (i, levels) in stored.iter().enumerate() {
                let location = loc(&format!("R{}", i), 0, 55.9220 + i as f64 * 0.00001);
                for (j, level) in levels.iter().enumerate() {
                    samples.push(RawSample::new(location.clone(), &format!("ap{}", j), "x", *level, 0));
                }
            }
            let map = RadioMap::build(&samples);
            let scan: Vec<AccessPointReading> = live
                .iter()
                .enumerate()
                .map(|(j, level)| reading(&format!("ap{}", j), *level))
                .collect();
            let options = KnnOptions {
                use_weighting: weighted,
                current_position: LatLng::new(55.9220, -3.17),
                ..KnnOptions::default()
            };

            let result = knn_match(&map, &scan, &options);
            prop_assert_eq!(result.len(), stored.len());
            for pair in result.windows(2) {
                prop_assert!(pair[0].score <= pair[1].score);
            }
            prop_assert!(result.iter().all(|c| c.score >= 0.0));
        }
    }
}
