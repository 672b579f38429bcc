//! Full state of the robot on the field

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::{
    geom::Pose2, kinematics::ChassisSpeeds, profile::ProfileState, trajectory::TimedPose,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position, velocity and acceleration of each field axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SwerveState {
    pub x: ProfileState,
    pub y: ProfileState,
    pub theta: ProfileState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveState {
    pub fn new(x: ProfileState, y: ProfileState, theta: ProfileState) -> Self {
        Self { x, y, theta }
    }

    /// State at `pose` moving with field-relative `velocity`.
    pub fn from_pose(pose: &Pose2, velocity: &ChassisSpeeds) -> Self {
        Self {
            x: ProfileState::new(pose.x_m(), velocity.vx_ms),
            y: ProfileState::new(pose.y_m(), velocity.vy_ms),
            theta: ProfileState::new(pose.heading_rad, velocity.omega_rads),
        }
    }

    /// State of a trajectory sample, including the centripetal part of its
    /// acceleration.
    pub fn from_timed_pose(sample: &TimedPose) -> Self {
        let motion = &sample.state;
        let v = sample.velocity_ms;
        let a = sample.accel_mss;

        let (sin, cos) = motion.course_rad.unwrap_or(0.0).sin_cos();
        let centripetal = v * v * motion.curvature_radpm;

        Self {
            x: ProfileState::with_accel(
                motion.pose.x_m(),
                v * cos,
                a * cos - centripetal * sin,
            ),
            y: ProfileState::with_accel(
                motion.pose.y_m(),
                v * sin,
                a * sin + centripetal * cos,
            ),
            theta: ProfileState::with_accel(
                motion.pose.heading_rad,
                motion.heading_rate_radpm * v,
                motion.heading_rate_radpm * a,
            ),
        }
    }

    pub fn pose(&self) -> Pose2 {
        Pose2::new(self.x.x, self.y.x, self.theta.x)
    }

    /// Field-relative velocity.
    pub fn velocity(&self) -> ChassisSpeeds {
        ChassisSpeeds::new(self.x.v, self.y.v, self.theta.v)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trajectory::PoseWithMotion;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_from_timed_pose_turning() {
        // Moving along +y at 2 m/s on a left turn of radius 0.5
        let sample = TimedPose {
            state: PoseWithMotion {
                pose: Pose2::new(1.0, 2.0, 0.3),
                course_rad: Some(FRAC_PI_2),
                curvature_radpm: 2.0,
                heading_rate_radpm: 0.5,
            },
            distance_m: 0.0,
            time_s: 1.0,
            velocity_ms: 2.0,
            accel_mss: 1.0,
        };

        let s = SwerveState::from_timed_pose(&sample);

        assert!(s.x.v.abs() < 1e-12);
        assert!((s.y.v - 2.0).abs() < 1e-12);

        // Centripetal 8 m/s^2 towards -x
        assert!((s.x.a + 8.0).abs() < 1e-12);
        assert!((s.y.a - 1.0).abs() < 1e-12);

        assert!((s.theta.v - 1.0).abs() < 1e-12);
        assert!((s.theta.a - 0.5).abs() < 1e-12);
        assert!(s.pose().is_near(&Pose2::new(1.0, 2.0, 0.3), 1e-12));
    }
}
