use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PositioningError, Result};
use crate::types::{Candidate, LatLng};

/// How a ranked candidate list collapses into one coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationStrategy {
    /// Coordinate of the best candidate.
    Best,
    /// Plain average of the three best candidates.
    Centroid,
    /// Inverse-distance weighted average of every candidate.
    Weighted,
}

impl EstimationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Centroid => "centroid",
            Self::Weighted => "weighted",
        }
    }

    fn min_candidates(&self) -> usize {
        match self {
            Self::Centroid => 3,
            Self::Best | Self::Weighted => 1,
        }
    }
}

impl fmt::Display for EstimationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimationStrategy {
    type Err = PositioningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "centroid" => Ok(Self::Centroid),
            "weighted" => Ok(Self::Weighted),
            other => Err(PositioningError::InvalidConfig(format!(
                "unknown estimation strategy '{}'",
                other
            ))),
        }
    }
}

/// Collapse candidates (sorted best-first) into a single coordinate.
pub fn estimate(candidates: &[Candidate], strategy: EstimationStrategy) -> Result<LatLng> {
    let needed = strategy.min_candidates();
    if candidates.len() < needed {
        return Err(PositioningError::InsufficientData {
            strategy: strategy.as_str(),
            needed,
            available: candidates.len(),
        });
    }

    match strategy {
        EstimationStrategy::Best => Ok(candidates[0].coordinate()),
        EstimationStrategy::Centroid => {
            let top = &candidates[..3];
            let lat = top.iter().map(|c| c.location.lat).sum::<f64>() / 3.0;
            let lng = top.iter().map(|c| c.location.lng).sum::<f64>() / 3.0;
            Ok(LatLng::new(lat, lng))
        }
        EstimationStrategy::Weighted => {
            // A perfect match would be an infinite weight
            if let Some(exact) = candidates.iter().find(|c| c.score == 0.0) {
                return Ok(exact.coordinate());
            }
            let mut sum_w = 0.0;
            let mut lat = 0.0;
            let mut lng = 0.0;
            for c in candidates {
                let w = 1.0 / c.score;
                sum_w += w;
                lat += c.location.lat * w;
                lng += c.location.lng * w;
            }
            Ok(LatLng::new(lat / sum_w, lng / sum_w))
        }
    }
}

/// Uncertainty radius in signal-distance units: the best candidate's score.
pub fn confidence_radius(candidates: &[Candidate]) -> Option<f64> {
    candidates.first().map(|c| c.score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn candidate(lat: f64, lng: f64, score: f64) -> Candidate {
        Candidate {
            location: Location::new(0, "R", "FJB", lat, lng),
            score,
        }
    }

    #[test]
    fn test_best_takes_first() {
        let c = vec![candidate(1.0, 2.0, 0.5), candidate(3.0, 4.0, 0.7)];
        assert_eq!(estimate(&c, EstimationStrategy::Best).unwrap(), LatLng::new(1.0, 2.0));
    }

    #[test]
    fn test_centroid_averages_first_three() {
        let c = vec![
            candidate(0.0, 0.0, 1.0),
            candidate(3.0, 6.0, 2.0),
            candidate(6.0, 3.0, 3.0),
            candidate(100.0, 100.0, 4.0),
        ];
        let p = estimate(&c, EstimationStrategy::Centroid).unwrap();
        assert_abs_diff_eq!(p.lat, 3.0);
        assert_abs_diff_eq!(p.lng, 3.0);
    }

    #[test]
    fn test_centroid_needs_three() {
        let c = vec![candidate(0.0, 0.0, 1.0), candidate(1.0, 1.0, 2.0)];
        match estimate(&c, EstimationStrategy::Centroid) {
            Err(PositioningError::InsufficientData { needed, available, .. }) => {
                assert_eq!(needed, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        assert!(estimate(&[], EstimationStrategy::Best).is_err());
        assert!(estimate(&[], EstimationStrategy::Weighted).is_err());
    }

    #[test]
    fn test_weighted_closer_point_dominates() {
        // weights 1 and 1/2: (0·1 + 3·0.5) / 1.5 = 1.0
        let c = vec![candidate(0.0, 0.0, 1.0), candidate(3.0, 0.0, 2.0)];
        let p = estimate(&c, EstimationStrategy::Weighted).unwrap();
        assert_abs_diff_eq!(p.lat, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.lng, 0.0, epsilon = 1e-12);

        // Same scores, points swapped: result sits two thirds of the way toward (3,0)
        let c = vec![candidate(3.0, 0.0, 1.0), candidate(0.0, 0.0, 2.0)];
        let p = estimate(&c, EstimationStrategy::Weighted).unwrap();
        assert_abs_diff_eq!(p.lat, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_zero_distance_short_circuits() {
        let c = vec![candidate(5.0, 5.0, 0.0), candidate(0.0, 0.0, 1.0)];
        assert_eq!(estimate(&c, EstimationStrategy::Weighted).unwrap(), LatLng::new(5.0, 5.0));
    }

    #[test]
    fn test_confidence_radius_is_best_score() {
        assert_eq!(confidence_radius(&[]), None);
        let c = vec![candidate(0.0, 0.0, 4.5), candidate(1.0, 1.0, 6.0)];
        assert_eq!(confidence_radius(&c), Some(4.5));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Centroid".parse::<EstimationStrategy>().unwrap(), EstimationStrategy::Centroid);
        assert!("median".parse::<EstimationStrategy>().is_err());
        let json = serde_json::to_string(&EstimationStrategy::Weighted).unwrap();
        assert_eq!(json, "\"weighted\"");
    }

    proptest! {
        #[test]
        fn prop_weighted_stays_inside_bounds(
            points in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0, 0.1f64..50.0), 1..15)
        ) {
            let mut c: Vec<Candidate> = points.iter().map(|(lat, lng, s)| candidate(*lat, *lng, *s)).collect();
            c.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap());
            let p = estimate(&c, EstimationStrategy::Weighted).unwrap();
            let min_lat = c.iter().map(|x| x.location.lat).fold(f64::INFINITY, f64::min);
            let max_lat = c.iter().map(|x| x.location.lat).fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(p.lat >= min_lat - 1e-9 && p.lat <= max_lat + 1e-9);
        }
    }
}
