//! Timing constraints
//!
//! Each constraint bounds the speed along a path at a given sample, and may
//! also bound the acceleration along it. A set of constraints composes by
//! taking the smallest velocity and the intersection of the acceleration
//! brackets.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;

// Internal
use super::PoseWithMotion;
use crate::kinematics::{ChassisSpeeds, SwerveKinodynamics, SPEED_EPSILON_MS};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Curvatures and rates below this are treated as zero.
const SMALL: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

pub trait TimingConstraint {
    /// Max speed along the path at this sample.
    ///
    /// Units: meters/second
    fn max_velocity(&self, state: &PoseWithMotion) -> f64;

    /// Acceleration bracket along the path at this sample and speed.
    fn min_max_acceleration(&self, _state: &PoseWithMotion, _velocity_ms: f64) -> MinMaxAcceleration {
        MinMaxAcceleration::NO_LIMITS
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Units: meters/second^2
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxAcceleration {
    pub min_mss: f64,
    pub max_mss: f64,
}

/// Lateral acceleration `v^2 * curvature` below a limit.
#[derive(Debug, Clone, Copy)]
pub struct CentripetalConstraint {
    max_lateral_mss: f64,
}

/// No wheel faster than the max drive velocity, and no wheel accelerating
/// faster than the drive allows, for the motion at each sample.
#[derive(Debug, Clone)]
pub struct SwerveDriveDynamicsConstraint {
    kinodynamics: Arc<SwerveKinodynamics>,
}

/// Lateral and longitudinal acceleration below the tipping limit.
#[derive(Debug, Clone)]
pub struct CapsizeConstraint {
    kinodynamics: Arc<SwerveKinodynamics>,
    scale: f64,
}

/// Spin rate below a fraction of the drive's max spin rate.
#[derive(Debug, Clone)]
pub struct YawRateConstraint {
    max_omega_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MinMaxAcceleration {
    pub const NO_LIMITS: MinMaxAcceleration = MinMaxAcceleration {
        min_mss: f64::NEG_INFINITY,
        max_mss: f64::INFINITY,
    };

    pub fn new(min_mss: f64, max_mss: f64) -> Self {
        Self { min_mss, max_mss }
    }

    pub fn intersect(&self, other: &MinMaxAcceleration) -> MinMaxAcceleration {
        MinMaxAcceleration {
            min_mss: self.min_mss.max(other.min_mss),
            max_mss: self.max_mss.min(other.max_mss),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_mss <= self.max_mss
    }
}

impl CentripetalConstraint {
    pub fn new(max_lateral_mss: f64) -> Self {
        Self { max_lateral_mss }
    }
}

impl TimingConstraint for CentripetalConstraint {
    fn max_velocity(&self, state: &PoseWithMotion) -> f64 {
        let k = state.curvature_radpm.abs();
        if k < SMALL {
            return f64::INFINITY;
        }
        (self.max_lateral_mss / k).sqrt()
    }
}

impl SwerveDriveDynamicsConstraint {
    pub fn new(kinodynamics: Arc<SwerveKinodynamics>) -> Self {
        Self { kinodynamics }
    }

    /// Fastest wheel speed per unit path speed.
    fn max_wheel_ratio(&self, state: &PoseWithMotion) -> f64 {
        let course = match state.course_rad {
            Some(c) => c,
            None => return 1.0,
        };

        // Unit speed along the course, in the robot frame
        let robot_course = course - state.pose.heading_rad;
        let unit = ChassisSpeeds::new(
            robot_course.cos(),
            robot_course.sin(),
            state.heading_rate_radpm,
        );

        let states = self
            .kinodynamics
            .kinematics()
            .to_module_states(&unit, &[None; crate::kinematics::NUM_MODULES]);

        states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(SPEED_EPSILON_MS, f64::max)
    }
}

impl TimingConstraint for SwerveDriveDynamicsConstraint {
    fn max_velocity(&self, state: &PoseWithMotion) -> f64 {
        self.kinodynamics.max_drive_velocity_ms() / self.max_wheel_ratio(state)
    }

    fn min_max_acceleration(&self, state: &PoseWithMotion, _velocity_ms: f64) -> MinMaxAcceleration {
        let ratio = self.max_wheel_ratio(state);
        MinMaxAcceleration::new(
            -self.kinodynamics.max_drive_deceleration_mss() / ratio,
            self.kinodynamics.max_drive_acceleration_mss() / ratio,
        )
    }
}

impl CapsizeConstraint {
    /// `scale` in (0, 1] leaves a margin below the tipping limit.
    pub fn new(kinodynamics: Arc<SwerveKinodynamics>, scale: f64) -> Self {
        Self {
            kinodynamics,
            scale,
        }
    }

    fn limit_mss(&self) -> f64 {
        self.kinodynamics.max_capsize_accel_mss() * self.scale
    }
}

impl TimingConstraint for CapsizeConstraint {
    fn max_velocity(&self, state: &PoseWithMotion) -> f64 {
        let k = state.curvature_radpm.abs();
        if k < SMALL {
            return f64::INFINITY;
        }
        (self.limit_mss() / k).sqrt()
    }

    /// The total acceleration stays within the limit, so the tangential part
    /// gets whatever the centripetal part leaves.
    fn min_max_acceleration(&self, state: &PoseWithMotion, velocity_ms: f64) -> MinMaxAcceleration {
        let limit = self.limit_mss();
        let centripetal = velocity_ms * velocity_ms * state.curvature_radpm.abs();
        let tangential = (limit * limit - centripetal * centripetal).max(0.0).sqrt();
        MinMaxAcceleration::new(-tangential, tangential)
    }
}

impl YawRateConstraint {
    /// Limit the spin rate to `scale` times the drive's max spin rate.
    pub fn new(kinodynamics: &SwerveKinodynamics, scale: f64) -> Self {
        Self {
            max_omega_rads: kinodynamics.max_angle_speed_rads() * scale,
        }
    }
}

impl TimingConstraint for YawRateConstraint {
    fn max_velocity(&self, state: &PoseWithMotion) -> f64 {
        let rate = state.heading_rate_radpm.abs();
        if rate < SMALL {
            return f64::INFINITY;
        }
        self.max_omega_rads / rate
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Pose2;
    use crate::kinematics::presets;
    use std::f64::consts::SQRT_2;

    fn turning(curvature: f64, heading_rate: f64) -> PoseWithMotion {
        PoseWithMotion::new(Pose2::default(), Some(0.0), curvature, heading_rate)
    }

    #[test]
    fn test_centripetal() {
        let c = CentripetalConstraint::new(2.0);
        assert!((c.max_velocity(&turning(1.0, 0.0)) - SQRT_2).abs() < 1e-12);
        assert!(c.max_velocity(&turning(0.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_drive_dynamics() {
        let kd = Arc::new(SwerveKinodynamics::new(presets::for_test()).unwrap());
        let c = SwerveDriveDynamicsConstraint::new(kd);

        // Translating only, every wheel at path speed
        assert!((c.max_velocity(&turning(0.0, 0.0)) - 1.0).abs() < 1e-9);

        // Spinning as well makes the outside wheels faster
        assert!(c.max_velocity(&turning(0.0, 1.0)) < 1.0);

        let a = c.min_max_acceleration(&turning(0.0, 0.0), 0.5);
        assert!((a.max_mss - 1.0).abs() < 1e-9);
        assert!((a.min_mss + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_capsize() {
        let kd = Arc::new(SwerveKinodynamics::new(presets::for_test()).unwrap());
        let limit = kd.max_capsize_accel_mss();
        let c = CapsizeConstraint::new(kd, 1.0);

        assert!((c.max_velocity(&turning(1.0, 0.0)) - limit.sqrt()).abs() < 1e-9);

        // All the grip used going round the corner
        let a = c.min_max_acceleration(&turning(1.0, 0.0), limit.sqrt());
        assert!(a.max_mss.abs() < 1e-6);
    }

    #[test]
    fn test_yaw_rate() {
        let kd = SwerveKinodynamics::new(presets::for_test()).unwrap();
        let c = YawRateConstraint::new(&kd, 0.5);

        let expected = kd.max_angle_speed_rads() * 0.5 / 2.0;
        assert!((c.max_velocity(&turning(0.0, 2.0)) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_intersect() {
        let a = MinMaxAcceleration::new(-2.0, 3.0).intersect(&MinMaxAcceleration::new(-5.0, 1.0));
        assert_eq!(a, MinMaxAcceleration::new(-2.0, 1.0));
        assert!(a.is_valid());
    }
}
