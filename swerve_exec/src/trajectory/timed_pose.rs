//! Time indexed trajectory samples

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::PoseWithMotion;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path sample with the time, speed and acceleration at which it is
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedPose {
    pub state: PoseWithMotion,

    /// Arc length from the start of the path.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Units: seconds
    pub time_s: f64,

    /// Speed along the path.
    ///
    /// Units: meters/second
    pub velocity_ms: f64,

    /// Acceleration along the path, constant until the next sample.
    ///
    /// Units: meters/second^2
    pub accel_mss: f64,
}

/// A time parameterised path.
///
/// Time and arc length never decrease from one sample to the next.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    points: Vec<TimedPose>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TimedPose {
    /// The sample `time_s` along the constant acceleration segment from this
    /// sample to `next`.
    pub fn interpolate_at(&self, next: &TimedPose, time_s: f64) -> TimedPose {
        let dt = (time_s - self.time_s).max(0.0);
        let velocity_ms = self.velocity_ms + self.accel_mss * dt;
        let ds = self.velocity_ms * dt + 0.5 * self.accel_mss * dt * dt;

        let span = next.distance_m - self.distance_m;
        let frac = if span > 0.0 {
            (ds / span).max(0.0).min(1.0)
        } else {
            0.0
        };

        TimedPose {
            state: self.state.interpolate(&next.state, frac),
            distance_m: self.distance_m + span * frac,
            time_s,
            velocity_ms,
            accel_mss: self.accel_mss,
        }
    }
}

impl Trajectory {
    pub fn new(points: Vec<TimedPose>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[TimedPose] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&TimedPose> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TimedPose> {
        self.points.last()
    }

    /// Units: seconds
    pub fn total_time_s(&self) -> f64 {
        self.points.last().map(|p| p.time_s).unwrap_or(0.0)
    }

    /// The sample at `time_s`, clamped to the ends of the trajectory. `None`
    /// only for an empty trajectory.
    pub fn sample(&self, time_s: f64) -> Option<TimedPose> {
        let first = self.points.first()?;
        let last = self.points.last()?;

        if time_s <= first.time_s {
            return Some(*first);
        }
        if time_s >= last.time_s {
            return Some(*last);
        }

        // Index of the first sample after time_s
        let i = self.points.partition_point(|p| p.time_s <= time_s);
        let prev = &self.points[i - 1];
        let next = &self.points[i];

        Some(prev.interpolate_at(next, time_s))
    }
}
