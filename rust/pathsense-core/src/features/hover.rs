//! Hover detection: sustained dwell in a tight cluster of coordinates.
//!
//! A window opens at a start sample and extends until the elapsed time
//! exceeds the hover period. The window is a hover when every sample lies
//! within the hover radius of the window centroid. Accepted hovers whose
//! centroid is within the association distance of the previous accepted
//! hover are the same dwell and are not counted again.

use serde::{Deserialize, Serialize};

use super::{quadrant_of, FeatureSet};
use crate::config::HoverConfig;
use crate::geometry::{point_to_point, Point};
use crate::path::{NormalizedPath, NormalizedSample};

pub const EARLY_HOVER: &str = "earlyHover";
pub const LATE_HOVER: &str = "lateHover";
pub const NUM_HOVER: &str = "numHover";
pub const STIMULUS_HOVER: &str = "stimulusHover";
pub const TARGET_HOVER: &str = "targetHover";
pub const OTHER_HOVER: &str = "otherHover";
pub const UPPER_HOVER: &str = "upperHover";
pub const LOWER_HOVER: &str = "lowerHover";
pub const OTHER_QUAD_HOVER: &str = "otherQuadHover";

/// A detected dwell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverEvent {
    pub center: Point,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl HoverEvent {
    pub fn midpoint_ms(&self) -> f64 {
        (self.start_ms + self.end_ms) / 2.0
    }
}

fn centroid(window: &[NormalizedSample]) -> Point {
    let n = window.len() as f64;
    let (sx, sy) = window
        .iter()
        .fold((0.0, 0.0), |(sx, sy), s| (sx + s.x, sy + s.y));
    Point::new(sx / n, sy / n)
}

/// Finds the distinct hover events of a path in time order.
pub fn detect_hovers(path: &NormalizedPath, config: &HoverConfig) -> Vec<HoverEvent> {
    let samples = path.samples();
    let mut events = Vec::new();
    let mut last_center: Option<Point> = None;
    let mut start = 0;
    let mut end = 0;

    while start < samples.len() && end < samples.len() {
        if samples[end].t - samples[start].t <= config.period_ms {
            end += 1;
            continue;
        }

        while start < end && samples[end].t - samples[start].t > config.period_ms {
            let window = &samples[start..=end];
            let center = centroid(window);

            if window
                .iter()
                .any(|s| point_to_point(&s.point(), &center) > config.radius)
            {
                start += 1;
                break;
            }

            let repeated = last_center
                .is_some_and(|prev| point_to_point(&prev, &center) < config.association_distance);
            if !repeated {
                events.push(HoverEvent {
                    center,
                    start_ms: samples[start].t,
                    end_ms: samples[end].t,
                });
                last_center = Some(center);
            }
            start += 1;
        }
    }

    events
}

/// Hover count, timing and association features.
pub fn analyze_hover(path: &NormalizedPath, config: &HoverConfig) -> FeatureSet {
    let mut features = FeatureSet::new();
    let Some(end) = path.last() else {
        return features;
    };

    let early_cut = path.duration() / 3.0;
    let late_cut = early_cut * 2.0;

    let stimulus = Point::ORIGIN;
    let (target, other, home) = if end.x > 0.0 {
        (Point::new(1.0, 1.0), Point::new(-1.0, 1.0), 1)
    } else {
        (Point::new(-1.0, 1.0), Point::new(1.0, 1.0), 4)
    };
    let near = |a: &Point, b: &Point| point_to_point(a, b) < config.association_distance;

    let events = detect_hovers(path, config);

    let mut early = false;
    let mut late = false;
    let mut stimulus_hover = false;
    let mut target_hover = false;
    let mut other_hover = false;
    let mut upper = false;
    let mut lower = false;
    let mut other_quad = false;

    for event in &events {
        let mid = event.midpoint_ms();
        early |= mid < early_cut;
        late |= mid > late_cut;

        stimulus_hover |= near(&stimulus, &event.center);
        target_hover |= near(&target, &event.center);
        other_hover |= near(&other, &event.center);

        let quad = quadrant_of(&event.center);
        let is_upper = matches!(quad, 1 | 4);
        upper |= is_upper;
        lower |= !is_upper;
        other_quad |= is_upper && quad != home;
    }

    features.insert_bool(EARLY_HOVER, early);
    features.insert_bool(LATE_HOVER, late);
    features.insert_series(NUM_HOVER, events.len() as f64);
    features.insert_bool(STIMULUS_HOVER, stimulus_hover);
    features.insert_bool(TARGET_HOVER, target_hover);
    features.insert_bool(OTHER_HOVER, other_hover);
    features.insert_bool(UPPER_HOVER, upper);
    features.insert_bool(LOWER_HOVER, lower);
    features.insert_bool(OTHER_QUAD_HOVER, other_quad);

    features
}
