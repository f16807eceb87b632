//! Velocity profile of a path.

use statrs::statistics::Statistics;

use super::{FeatureError, FeatureSet};
use crate::geometry::point_to_point;
use crate::path::{NormalizedPath, NormalizedSample};

pub const EARLY_SPEED: &str = "earlySpeed";
pub const LATE_SPEED: &str = "lateSpeed";
pub const AVERAGE_SPEED: &str = "averageSpeed";
pub const MAX_SPEED: &str = "maxSpeed";
pub const SPEED_VARIANCE: &str = "variance";

/// Instantaneous velocity at every sample, paired with the sample time.
///
/// The first sample is measured from the origin at time zero. A zero time
/// step is treated as one millisecond.
pub fn velocities(path: &NormalizedPath) -> Vec<(f64, f64)> {
    let mut previous = NormalizedSample {
        x: 0.0,
        y: 0.0,
        t: 0.0,
    };

    path.samples()
        .iter()
        .map(|sample| {
            let distance = point_to_point(&previous.point(), &sample.point());
            let elapsed = match sample.t - previous.t {
                dt if dt == 0.0 => 1.0,
                dt => dt,
            };
            previous = *sample;
            (distance / elapsed, sample.t)
        })
        .collect()
}

/// Early, late and overall speed features.
///
/// Fails when the first or last third of the path's duration holds no
/// samples, which happens when every sample shares one timestamp.
pub fn analyze_speed(path: &NormalizedPath) -> Result<FeatureSet, FeatureError> {
    let mut features = FeatureSet::new();
    if path.is_empty() {
        return Ok(features);
    }

    let early_cut = path.duration() / 3.0;
    let late_cut = early_cut * 2.0;

    let speeds = velocities(path);
    let all: Vec<f64> = speeds.iter().map(|(v, _)| *v).collect();
    let early: Vec<f64> = speeds
        .iter()
        .filter(|(_, t)| *t < early_cut)
        .map(|(v, _)| *v)
        .collect();
    let late: Vec<f64> = speeds
        .iter()
        .filter(|(_, t)| *t > late_cut)
        .map(|(v, _)| *v)
        .collect();

    if early.is_empty() {
        return Err(FeatureError::EmptySpeedWindow { window: "early" });
    }
    if late.is_empty() {
        return Err(FeatureError::EmptySpeedWindow { window: "late" });
    }

    let variance = if all.len() > 1 { all.iter().variance() } else { 0.0 };

    features.insert_series(EARLY_SPEED, early.iter().mean());
    features.insert_series(LATE_SPEED, late.iter().mean());
    features.insert_series(AVERAGE_SPEED, all.iter().mean());
    features.insert_series(MAX_SPEED, Statistics::max(&all));
    features.insert_series(SPEED_VARIANCE, variance);

    Ok(features)
}
