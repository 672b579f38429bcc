//! Paths indexed by arc length

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

// Internal
use super::TrajectoryError;
use crate::geom::Pose2;
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pose on a path with its spatial derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseWithMotion {
    pub pose: Pose2,

    /// Direction of travel, which for a holonomic drive is independent of
    /// the heading. `None` when not translating.
    ///
    /// Units: radians
    pub course_rad: Option<f64>,

    /// Change in course per meter travelled, positive to the left.
    ///
    /// Units: radians/meter
    pub curvature_radpm: f64,

    /// Change in heading per meter travelled.
    ///
    /// Units: radians/meter
    pub heading_rate_radpm: f64,
}

/// A path sample and its arc length from the start of the path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathPoint {
    pub state: PoseWithMotion,

    /// Units: meters
    pub distance_m: f64,
}

/// An ordered sequence of samples along a curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<PathPoint>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseWithMotion {
    pub fn new(
        pose: Pose2,
        course_rad: Option<f64>,
        curvature_radpm: f64,
        heading_rate_radpm: f64,
    ) -> Self {
        Self {
            pose,
            course_rad,
            curvature_radpm,
            heading_rate_radpm,
        }
    }

    /// Linear interpolation, angles taking the short way round.
    pub fn interpolate(&self, other: &PoseWithMotion, frac: f64) -> PoseWithMotion {
        let lerp = |a: f64, b: f64| a + (b - a) * frac;
        let lerp_angle = |a: f64, b: f64| angle_modulus(a + angle_modulus(b - a) * frac);

        let course_rad = match (self.course_rad, other.course_rad) {
            (Some(a), Some(b)) => Some(lerp_angle(a, b)),
            (a, b) => a.or(b),
        };

        PoseWithMotion {
            pose: Pose2 {
                position_m: self.pose.position_m + (other.pose.position_m - self.pose.position_m) * frac,
                heading_rad: lerp_angle(self.pose.heading_rad, other.pose.heading_rad),
            },
            course_rad,
            curvature_radpm: lerp(self.curvature_radpm, other.curvature_radpm),
            heading_rate_radpm: lerp(self.heading_rate_radpm, other.heading_rate_radpm),
        }
    }
}

impl Path {
    /// Build a path from samples, measuring arc length along the straight
    /// lines between them.
    pub fn new(states: Vec<PoseWithMotion>) -> Result<Self, TrajectoryError> {
        if states.len() < 2 {
            return Err(TrajectoryError::TooFewSamples(states.len()));
        }

        let mut points = Vec::with_capacity(states.len());
        let mut distance_m = 0.0;
        let mut prev: Option<&PoseWithMotion> = None;

        for state in states.iter() {
            if let Some(p) = prev {
                distance_m += p.pose.distance_m(&state.pose);
            }
            points.push(PathPoint {
                state: *state,
                distance_m,
            });
            prev = Some(state);
        }

        if distance_m <= 0.0 {
            return Err(TrajectoryError::ZeroLength);
        }

        Ok(Self { points })
    }

    /// A straight line from `start` to `end`, the heading turning uniformly
    /// along it.
    pub fn straight(start: Pose2, end: Pose2, step_m: f64) -> Result<Self, TrajectoryError> {
        if step_m <= 0.0 {
            return Err(TrajectoryError::InvalidStep(step_m));
        }

        let delta = end.position_m - start.position_m;
        let length = delta.norm();
        if length <= 0.0 {
            return Err(TrajectoryError::ZeroLength);
        }

        let course = delta.y.atan2(delta.x);
        let turn = angle_modulus(end.heading_rad - start.heading_rad);
        let n = (length / step_m).ceil().max(1.0) as usize;

        let states = (0..=n)
            .map(|i| {
                let frac = i as f64 / n as f64;
                PoseWithMotion::new(
                    Pose2::new(
                        start.x_m() + delta.x * frac,
                        start.y_m() + delta.y * frac,
                        start.heading_rad + turn * frac,
                    ),
                    Some(course),
                    0.0,
                    turn / length,
                )
            })
            .collect();

        Self::new(states)
    }

    /// A circular arc about `center_m`, starting at `start_angle_rad` round
    /// the circle and sweeping `sweep_rad`, positive anticlockwise. The
    /// heading is held at `heading_rad`.
    pub fn arc(
        center_m: Vector2<f64>,
        radius_m: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
        heading_rad: f64,
        step_m: f64,
    ) -> Result<Self, TrajectoryError> {
        if step_m <= 0.0 {
            return Err(TrajectoryError::InvalidStep(step_m));
        }

        let length = radius_m * sweep_rad.abs();
        if length <= 0.0 {
            return Err(TrajectoryError::ZeroLength);
        }

        let direction = sweep_rad.signum();
        let n = (length / step_m).ceil().max(1.0) as usize;

        let states = (0..=n)
            .map(|i| {
                let angle = start_angle_rad + sweep_rad * i as f64 / n as f64;
                let (sin, cos) = angle.sin_cos();
                PoseWithMotion::new(
                    Pose2::new(
                        center_m.x + radius_m * cos,
                        center_m.y + radius_m * sin,
                        heading_rad,
                    ),
                    Some(angle_modulus(angle + direction * FRAC_PI_2)),
                    direction / radius_m,
                    0.0,
                )
            })
            .collect();

        Self::new(states)
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total arc length.
    pub fn length_m(&self) -> f64 {
        self.points.last().map(|p| p.distance_m).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_straight() {
        let path = Path::straight(Pose2::new(0.0, 0.0, 0.0), Pose2::new(2.0, 0.0, 1.0), 0.25).unwrap();

        assert_eq!(path.len(), 9);
        assert!((path.length_m() - 2.0).abs() < 1e-9);

        let mid = &path.points()[4];
        assert!((mid.distance_m - 1.0).abs() < 1e-9);
        assert!((mid.state.pose.heading_rad - 0.5).abs() < 1e-9);
        assert!((mid.state.heading_rate_radpm - 0.5).abs() < 1e-12);
        assert_eq!(mid.state.course_rad, Some(0.0));
    }

    #[test]
    fn test_quarter_arc() {
        // Left turn from (1, 0) to (0, 1)
        let path = Path::arc(Vector2::zeros(), 1.0, 0.0, PI / 2.0, 0.0, 0.01).unwrap();

        let first = path.points()[0].state;
        assert!((first.course_rad.unwrap() - PI / 2.0).abs() < 1e-12);
        assert!((first.curvature_radpm - 1.0).abs() < 1e-12);

        let last = path.points()[path.len() - 1].state;
        assert!(last.pose.is_near(&Pose2::new(0.0, 1.0, 0.0), 1e-9));

        // Chords are a little shorter than the arc
        assert!((path.length_m() - PI / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid() {
        assert_eq!(
            Path::new(vec![]).unwrap_err(),
            TrajectoryError::TooFewSamples(0)
        );
        assert_eq!(
            Path::straight(Pose2::default(), Pose2::default(), 0.1).unwrap_err(),
            TrajectoryError::ZeroLength
        );
        assert!(Path::straight(Pose2::default(), Pose2::new(1.0, 0.0, 0.0), 0.0).is_err());
    }

    #[test]
    fn test_interpolate_wraps() {
        let a = PoseWithMotion::new(Pose2::new(0.0, 0.0, 3.0), Some(3.0), 0.0, 0.0);
        let b = PoseWithMotion::new(Pose2::new(1.0, 0.0, -3.0), Some(-3.0), 1.0, 0.0);

        let m = a.interpolate(&b, 0.5);
        assert!((m.pose.x_m() - 0.5).abs() < 1e-12);
        assert!(angle_modulus(m.pose.heading_rad - PI).abs() < 1e-9);
        assert!((m.curvature_radpm - 0.5).abs() < 1e-12);
    }
}
