//! How far a path strays from the straight line to its final answer.

use super::{quadrant_of, same_half, FeatureSet};
use crate::geometry::{point_to_line, point_to_point, Point, Segment};
use crate::path::NormalizedPath;

pub const CUMULATIVE_DIVERGENCE: &str = "cumulativeDivergence";
pub const AVERAGE_DIVERGENCE: &str = "averageDivergence";
pub const TOTAL_DISTANCE: &str = "totalDistance";
pub const PATH_CROSSING: &str = "pathCrossing";
pub const MAX_DIVERGENCE: &str = "maxDivergence";
pub const OTHER_QUADRANT: &str = "otherQuadrant";
pub const OTHER_QUAD_EARLY: &str = "otherQuadEarly";
pub const OTHER_QUAD_LATE: &str = "otherQuadLate";
pub const QUAD_TOTAL_DISTANCE: [&str; 4] = [
    "quadTotalDistance1",
    "quadTotalDistance2",
    "quadTotalDistance3",
    "quadTotalDistance4",
];
pub const QUAD_MAX_DISTANCE: &str = "quadMaxDistance";
pub const QUAD_MAX_INDEX: &str = "quadMaxIndex";
pub const NUM_BACK_AND_FORTH: &str = "numBackAndForth";

/// Divergence, crossing and quadrant-dwell features.
pub fn analyze_divergence(path: &NormalizedPath) -> FeatureSet {
    let mut features = FeatureSet::new();
    let Some(end) = path.last() else {
        return features;
    };

    let early = path.duration() / 3.0;
    let late = early * 2.0;
    let home = if end.x > 0.0 { 1 } else { 4 };

    // The ideal answer runs from the stimulus straight to the final sample.
    let ideal_start = Point::ORIGIN;
    let ideal_end = end.point();

    let mut cumulative = 0.0;
    let mut total_distance = 0.0;
    let mut max_divergence: f64 = 0.0;
    let mut crossings = 0usize;

    let mut other_quadrant = false;
    let mut other_early = false;
    let mut other_late = false;
    let mut quad_total = [0.0f64; 4];
    let mut quad_run = 0.0;
    let mut quad_max = 0.0;
    let mut quad_max_index = 0u8;

    let mut segments: Vec<Segment> = Vec::with_capacity(path.len());
    let mut visits: Vec<u8> = Vec::new();
    let mut last = ideal_start;

    for sample in path.samples() {
        let current = sample.point();
        let divergence = point_to_line(&ideal_start, &ideal_end, &current);
        let step = point_to_point(&current, &last);

        cumulative += divergence;
        total_distance += step;
        max_divergence = max_divergence.max(divergence);

        // The preceding segment always touches this one at `last`.
        let segment = Segment::new(last, current);
        if let Some((_, earlier)) = segments.split_last() {
            crossings += earlier.iter().filter(|s| s.intersects(&segment)).count();
        }
        segments.push(segment);

        let quad = quadrant_of(&current);
        quad_total[usize::from(quad - 1)] += step;

        match visits.last() {
            None => {
                visits.push(quad);
                quad_run = step;
                quad_max = step;
                quad_max_index = quad;
            }
            Some(&previous) => {
                if previous != quad {
                    visits.push(quad);
                    if !same_half(home, quad) {
                        other_quadrant = true;
                        other_early |= sample.t < early;
                        other_late |= sample.t > late;
                    }
                    quad_run = step;
                } else {
                    quad_run += step;
                }

                if quad_run > quad_max {
                    quad_max = quad_run;
                    quad_max_index = quad;
                }
            }
        }

        last = current;
    }

    let back_and_forth = visits
        .windows(2)
        .filter(|w| !same_half(w[0], w[1]))
        .count();

    features.insert_series(CUMULATIVE_DIVERGENCE, cumulative);
    features.insert_series(AVERAGE_DIVERGENCE, cumulative / path.len() as f64);
    features.insert_series(TOTAL_DISTANCE, total_distance);
    features.insert_series(PATH_CROSSING, crossings as f64);
    features.insert_series(MAX_DIVERGENCE, max_divergence);
    features.insert_bool(OTHER_QUADRANT, other_quadrant);
    features.insert_bool(OTHER_QUAD_EARLY, other_early);
    features.insert_bool(OTHER_QUAD_LATE, other_late);
    for (label, distance) in QUAD_TOTAL_DISTANCE.iter().zip(quad_total) {
        features.insert_series(label, distance);
    }
    features.insert_series(QUAD_MAX_DISTANCE, quad_max);
    features.insert_class(QUAD_MAX_INDEX, i64::from(quad_max_index));
    features.insert_series(NUM_BACK_AND_FORTH, back_and_forth as f64);

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{diagonal_path, path};

    #[test]
    fn test_straight_path_has_no_divergence() {
        let f = analyze_divergence(&diagonal_path(10, 100.0));

        assert_eq!(f.series(MAX_DIVERGENCE), Some(0.0));
        assert_eq!(f.series(CUMULATIVE_DIVERGENCE), Some(0.0));
        assert_eq!(f.series(PATH_CROSSING), Some(0.0));
        assert_eq!(f.series(NUM_BACK_AND_FORTH), Some(0.0));
        assert_eq!(f.flag(OTHER_QUADRANT), Some(false));

        let total = f.series(TOTAL_DISTANCE).unwrap();
        assert!((total - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_self_intersections_counted() {
        let p = path(&[
            (0.0, 0.0, 0.0),
            (0.6, 0.2, 100.0),
            (0.6, 0.6, 200.0),
            (0.3, 0.0, 300.0),
            (1.0, 1.0, 400.0),
        ]);
        let f = analyze_divergence(&p);
        assert_eq!(f.series(PATH_CROSSING), Some(3.0));
        assert!(f.series(MAX_DIVERGENCE).unwrap() > 0.0);
    }

    #[test]
    fn test_quadrant_switching() {
        let p = path(&[
            (0.0, 0.0, 0.0),
            (-0.3, 0.2, 100.0),
            (0.2, 0.4, 200.0),
            (-0.2, 0.7, 300.0),
            (1.0, 1.0, 400.0),
        ]);
        let f = analyze_divergence(&p);

        assert_eq!(f.series(NUM_BACK_AND_FORTH), Some(4.0));
        assert_eq!(f.flag(OTHER_QUADRANT), Some(true));
        assert_eq!(f.flag(OTHER_QUAD_EARLY), Some(true));
        assert_eq!(f.flag(OTHER_QUAD_LATE), Some(true));
        assert_eq!(f.class(QUAD_MAX_INDEX), Some(1));

        let q3 = f.series(QUAD_TOTAL_DISTANCE[2]).unwrap();
        assert!((q3 - 0.13f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_average_is_cumulative_over_samples() {
        let p = path(&[(0.0, 0.0, 0.0), (0.0, 0.5, 50.0), (1.0, 1.0, 100.0)]);
        let f = analyze_divergence(&p);
        let cumulative = f.series(CUMULATIVE_DIVERGENCE).unwrap();
        let average = f.series(AVERAGE_DIVERGENCE).unwrap();
        assert!((average - cumulative / 3.0).abs() < 1e-12);
        assert!((cumulative - 0.5 * std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }
}
