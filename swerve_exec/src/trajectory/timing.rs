//! Time parameterisation of paths

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use super::{MinMaxAcceleration, Path, PathPoint, TimedPose, TimingConstraint, Trajectory};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Segments whose mean speed is below this cannot be timed.
///
/// Units: meters/second
const STALL_VELOCITY_MS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Retimes paths under a set of timing constraints.
#[derive(Default)]
pub struct ScheduleGenerator {
    constraints: Vec<Box<dyn TimingConstraint>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimingError {
    #[error("Timing limit {name} must be finite and positive, found {value}")]
    InvalidLimits { name: &'static str, value: f64 },

    #[error("The path cannot be traversed, speed is zero over segment {0}")]
    Stalled(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScheduleGenerator {
    pub fn new(constraints: Vec<Box<dyn TimingConstraint>>) -> Self {
        Self { constraints }
    }

    pub fn add(&mut self, constraint: Box<dyn TimingConstraint>) {
        self.constraints.push(constraint);
    }

    /// Smallest max velocity over all constraints and `max_velocity_ms`.
    fn max_velocity(&self, point: &PathPoint, max_velocity_ms: f64) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.max_velocity(&point.state))
            .fold(max_velocity_ms, f64::min)
    }

    /// Intersection of every constraint's bracket and `±max_accel_mss`.
    fn accel_limits(&self, point: &PathPoint, velocity_ms: f64, max_accel_mss: f64) -> MinMaxAcceleration {
        self.constraints
            .iter()
            .map(|c| c.min_max_acceleration(&point.state, velocity_ms))
            .fold(
                MinMaxAcceleration::new(-max_accel_mss, max_accel_mss),
                |acc, a| acc.intersect(&a),
            )
    }

    /// Assign a speed, acceleration and time to every sample of `path`.
    ///
    /// The forward pass limits acceleration from the start, the backward pass
    /// limits deceleration into the end. Between samples the acceleration is
    /// constant.
    pub fn time_parameterize(
        &self,
        path: &Path,
        start_velocity_ms: f64,
        end_velocity_ms: f64,
        max_velocity_ms: f64,
        max_accel_mss: f64,
    ) -> Result<Trajectory, TimingError> {
        check_limit("max_velocity_ms", max_velocity_ms)?;
        check_limit("max_accel_mss", max_accel_mss)?;

        let points = path.points();
        let n = points.len();
        if n == 0 {
            return Ok(Trajectory::default());
        }

        let limits: Vec<f64> = points
            .iter()
            .map(|p| self.max_velocity(p, max_velocity_ms))
            .collect();

        // Forward pass
        let mut velocity = vec![0.0; n];
        velocity[0] = start_velocity_ms.max(0.0).min(limits[0]);
        for i in 1..n {
            let ds = points[i].distance_m - points[i - 1].distance_m;
            let accel = self
                .accel_limits(&points[i - 1], velocity[i - 1], max_accel_mss)
                .max_mss
                .max(0.0);
            let reachable = (velocity[i - 1].powi(2) + 2.0 * accel * ds).max(0.0).sqrt();
            velocity[i] = reachable.min(limits[i]);
        }

        // Backward pass
        velocity[n - 1] = velocity[n - 1].min(end_velocity_ms.max(0.0));
        for i in (0..n - 1).rev() {
            let ds = points[i + 1].distance_m - points[i].distance_m;
            let decel = (-self
                .accel_limits(&points[i + 1], velocity[i + 1], max_accel_mss)
                .min_mss)
                .max(0.0);
            let reachable = (velocity[i + 1].powi(2) + 2.0 * decel * ds).max(0.0).sqrt();
            velocity[i] = velocity[i].min(reachable);
        }

        // Integrate time assuming constant acceleration over each segment
        let mut timed = Vec::with_capacity(n);
        let mut time_s = 0.0;
        for i in 0..n {
            let accel_mss = if i + 1 < n {
                let ds = points[i + 1].distance_m - points[i].distance_m;
                let mean = 0.5 * (velocity[i] + velocity[i + 1]);
                if ds <= 0.0 {
                    0.0
                } else if mean < STALL_VELOCITY_MS {
                    debug!("Trajectory stalled at segment {}", i);
                    return Err(TimingError::Stalled(i));
                } else {
                    let dt = ds / mean;
                    (velocity[i + 1] - velocity[i]) / dt
                }
            } else {
                0.0
            };

            timed.push(TimedPose {
                state: points[i].state,
                distance_m: points[i].distance_m,
                time_s,
                velocity_ms: velocity[i],
                accel_mss,
            });

            if i + 1 < n {
                let ds = points[i + 1].distance_m - points[i].distance_m;
                if ds > 0.0 {
                    time_s += ds / (0.5 * (velocity[i] + velocity[i + 1]));
                }
            }
        }

        debug!(
            "Timed path of {:.3} m over {:.3} s",
            path.length_m(),
            time_s
        );

        Ok(Trajectory::new(timed))
    }
}

fn check_limit(name: &'static str, value: f64) -> Result<(), TimingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TimingError::InvalidLimits { name, value })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Pose2;
    use crate::trajectory::CentripetalConstraint;
    use nalgebra::Vector2;
    use std::f64::consts::{FRAC_PI_2, SQRT_2};

    fn peak_velocity(t: &Trajectory) -> f64 {
        t.points().iter().map(|p| p.velocity_ms).fold(0.0, f64::max)
    }

    #[test]
    fn test_straight_trapezoid() {
        let path = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(4.0, 0.0, 0.0), 0.25).unwrap();
        let t = ScheduleGenerator::default()
            .time_parameterize(&path, 0.0, 0.0, 1.0, 1.0)
            .unwrap();

        // 0.5 m to reach cruise, 3 m cruising, 0.5 m to stop
        assert!((peak_velocity(&t) - 1.0).abs() < 1e-9);
        assert!((t.total_time_s() - 5.0).abs() < 1e-6);

        let first = t.first().unwrap();
        let last = t.last().unwrap();
        assert_eq!(first.velocity_ms, 0.0);
        assert_eq!(last.velocity_ms, 0.0);

        // Time and distance never go backwards
        for w in t.points().windows(2) {
            assert!(w[1].time_s >= w[0].time_s);
            assert!(w[1].distance_m >= w[0].distance_m);
        }
    }

    #[test]
    fn test_short_path_triangle() {
        let path = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(0.5, 0.0, 0.0), 0.125).unwrap();
        let t = ScheduleGenerator::default()
            .time_parameterize(&path, 0.0, 0.0, 10.0, 1.0)
            .unwrap();

        // Accelerate for half the path, brake for the other half
        assert!((peak_velocity(&t) - 0.5f64.sqrt()).abs() < 1e-9);
        assert!((t.total_time_s() - SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_quarter_circle_centripetal() {
        let path = Path::arc(Vector2::zeros(), 1.0, 0.0, FRAC_PI_2, 0.0, 0.01).unwrap();
        let generator = ScheduleGenerator::new(vec![Box::new(CentripetalConstraint::new(2.0))]);
        let t = generator
            .time_parameterize(&path, SQRT_2, SQRT_2, 10.0, 100.0)
            .unwrap();

        for p in t.points() {
            assert!((p.velocity_ms - SQRT_2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stalled() {
        let path = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(1.0, 0.0, 0.0), 0.5).unwrap();

        struct Frozen;
        impl TimingConstraint for Frozen {
            fn max_velocity(&self, _state: &crate::trajectory::PoseWithMotion) -> f64 {
                0.0
            }
        }

        let generator = ScheduleGenerator::new(vec![Box::new(Frozen)]);
        assert_eq!(
            generator.time_parameterize(&path, 0.0, 0.0, 1.0, 1.0),
            Err(TimingError::Stalled(0))
        );
    }

    #[test]
    fn test_invalid_limits() {
        let path = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(1.0, 0.0, 0.0), 0.5).unwrap();
        assert!(matches!(
            ScheduleGenerator::default().time_parameterize(&path, 0.0, 0.0, 0.0, 1.0),
            Err(TimingError::InvalidLimits { name: "max_velocity_ms", .. })
        ));
    }
}
