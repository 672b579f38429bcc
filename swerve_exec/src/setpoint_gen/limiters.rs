//! Per-tick limits on the change in module velocity
//!
//! Each limiter returns the largest fraction `s` in `[0, 1]` of the way from
//! the previous setpoint towards the desired one that it allows.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;

// Internal
use super::solver::{find_drive_max_s, find_steering_max_s};
use super::ModuleVelocities;
use crate::kinematics::{ChassisSpeeds, SwerveKinodynamics, NUM_MODULES};
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const MAX_STEER_ITERATIONS: usize = 8;

const MAX_DRIVE_ITERATIONS: usize = 10;

/// Translational speeds below this have no defined direction.
///
/// Units: meters/second
const DIRECTION_EPSILON_MS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limits the steering rate of moving modules.
#[derive(Debug, Clone)]
pub struct SteeringRateLimiter {
    limits: Arc<SwerveKinodynamics>,
    telemetry: Telemetry,
}

/// Limits each module's drive acceleration and deceleration.
///
/// Accelerating, the limit is the lesser of the configured maximum and what
/// the motor can deliver at its current speed. Decelerating, it is the
/// configured maximum deceleration.
#[derive(Debug, Clone)]
pub struct DriveAccelLimiter {
    limits: Arc<SwerveKinodynamics>,
    telemetry: Telemetry,
}

/// Limits the sideways acceleration of the chassis, the change in velocity
/// perpendicular to the current direction of travel.
#[derive(Debug, Clone)]
pub struct CentripetalLimiter {
    limits: Arc<SwerveKinodynamics>,
    telemetry: Telemetry,
}

/// Limits the total acceleration of each wheel to what the chassis can bear
/// without tipping.
#[derive(Debug, Clone)]
pub struct CapsizeAccelLimiter {
    limits: Arc<SwerveKinodynamics>,
    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteeringRateLimiter {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        Self {
            limits,
            telemetry: telemetry.child("steering_rate_limiter"),
        }
    }

    /// Modules with a steering override, or which are stopped at either end,
    /// are not limited here.
    pub(crate) fn enforce_steering_limit(
        &self,
        prev: &ModuleVelocities,
        desired: &ModuleVelocities,
        overrides: &[Option<f64>; NUM_MODULES],
        dt: f64,
    ) -> f64 {
        let max_step_rad = dt * self.limits.max_steering_velocity_rads();
        let mut min_s: f64 = 1.0;

        for i in 0..NUM_MODULES {
            if overrides[i].is_some() {
                continue;
            }

            let (h0, h1) = match (prev.heading_rad[i], desired.heading_rad[i]) {
                (Some(h0), Some(h1)) => (h0, h1),
                _ => continue,
            };

            let s = find_steering_max_s(
                prev.vx_ms[i],
                prev.vy_ms[i],
                h0,
                desired.vx_ms[i],
                desired.vy_ms[i],
                h1,
                max_step_rad,
                MAX_STEER_ITERATIONS,
            );
            min_s = min_s.min(s);
        }

        self.telemetry.log_f64(Level::Trace, "s", || min_s);
        min_s
    }
}

impl DriveAccelLimiter {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        Self {
            limits,
            telemetry: telemetry.child("drive_accel_limiter"),
        }
    }

    pub(crate) fn enforce_wheel_accel_limit(
        &self,
        prev: &ModuleVelocities,
        desired: &ModuleVelocities,
        dt: f64,
    ) -> f64 {
        let mut min_s: f64 = 1.0;

        for i in 0..NUM_MODULES {
            let prev_speed = prev.vx_ms[i].hypot(prev.vy_ms[i]);
            let desired_speed = desired.vx_ms[i].hypot(desired.vy_ms[i]);

            let max_step_ms = if desired_speed > prev_speed {
                self.limits.max_drive_accel_at(prev_speed) * dt
            } else {
                self.limits.max_drive_deceleration_mss() * dt
            };

            let s = find_drive_max_s(
                prev.vx_ms[i],
                prev.vy_ms[i],
                prev_speed,
                desired.vx_ms[i],
                desired.vy_ms[i],
                desired_speed,
                max_step_ms,
                MAX_DRIVE_ITERATIONS,
            );
            min_s = min_s.min(s);
        }

        self.telemetry.log_f64(Level::Trace, "s", || min_s);
        min_s
    }
}

impl CentripetalLimiter {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        Self {
            limits,
            telemetry: telemetry.child("centripetal_limiter"),
        }
    }

    pub fn enforce_centripetal_limit(
        &self,
        prev: &ChassisSpeeds,
        desired: &ChassisSpeeds,
        dt: f64,
    ) -> f64 {
        let v0 = prev.translation();
        let speed = v0.norm();
        if speed < DIRECTION_EPSILON_MS {
            return 1.0;
        }

        let dv = desired.translation() - v0;
        let sideways_ms = (v0.x * dv.y - v0.y * dv.x).abs() / speed;
        let max_ms = self.limits.max_capsize_accel_mss() * dt;

        let s = if sideways_ms <= max_ms {
            1.0
        } else {
            max_ms / sideways_ms
        };

        self.telemetry.log_f64(Level::Trace, "s", || s);
        s
    }
}

impl CapsizeAccelLimiter {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        Self {
            limits,
            telemetry: telemetry.child("capsize_limiter"),
        }
    }

    pub(crate) fn enforce_capsize_limit(
        &self,
        prev: &ModuleVelocities,
        desired: &ModuleVelocities,
        dt: f64,
    ) -> f64 {
        let max_ms = self.limits.max_capsize_accel_mss() * dt;
        let mut min_s: f64 = 1.0;

        for i in 0..NUM_MODULES {
            let dv = (desired.vx_ms[i] - prev.vx_ms[i]).hypot(desired.vy_ms[i] - prev.vy_ms[i]);
            if dv > max_ms {
                min_s = min_s.min(max_ms / dv);
            }
        }

        self.telemetry.log_f64(Level::Trace, "s", || min_s);
        min_s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::{presets, ModuleState};

    fn limits(l: crate::kinematics::KinodynamicLimits) -> Arc<SwerveKinodynamics> {
        Arc::new(SwerveKinodynamics::new(l).unwrap())
    }

    fn velocities(speed: f64, angle: f64) -> ModuleVelocities {
        ModuleVelocities::from_states(&[ModuleState::new(speed, Some(angle)); NUM_MODULES])
    }

    #[test]
    fn test_drive_accel() {
        let l = DriveAccelLimiter::new(limits(presets::high_capsize()), &Telemetry::disabled());

        // 10 m/s^2 for 0.02 s is 0.2 of the 5 m/s asked for
        let s = l.enforce_wheel_accel_limit(&velocities(0.0, 0.0), &velocities(5.0, 0.0), 0.02);
        assert!((s - 0.04).abs() < 1e-6, "{}", s);
    }

    #[test]
    fn test_drive_decel_is_separate() {
        let l = DriveAccelLimiter::new(limits(presets::decel_case()), &Telemetry::disabled());

        let s = l.enforce_wheel_accel_limit(&velocities(1.0, 0.0), &velocities(0.0, 0.0), 0.02);
        assert!((s - 0.2).abs() < 1e-6, "{}", s);

        let s = l.enforce_wheel_accel_limit(&velocities(0.0, 0.0), &velocities(1.0, 0.0), 0.02);
        assert!((s - 0.02).abs() < 1e-6, "{}", s);
    }

    #[test]
    fn test_capsize() {
        let l = CapsizeAccelLimiter::new(limits(presets::low_capsize()), &Telemetry::disabled());

        // 9.81 * 0.25 / 2 * 0.02
        let max = 9.81 * 0.25 / 2.0 * 0.02;
        let s = l.enforce_capsize_limit(&velocities(0.0, 0.0), &velocities(1.0, 0.0), 0.02);
        assert!((s - max).abs() < 1e-9, "{}", s);
    }

    #[test]
    fn test_centripetal() {
        let l = CentripetalLimiter::new(limits(presets::low_capsize()), &Telemetry::disabled());
        let max = 9.81 * 0.25 / 2.0 * 0.02;

        // Speeding up along the direction of travel is not limited
        let prev = ChassisSpeeds::new(1.0, 0.0, 0.0);
        assert_eq!(
            l.enforce_centripetal_limit(&prev, &ChassisSpeeds::new(2.0, 0.0, 0.0), 0.02),
            1.0
        );

        // Turning is
        let s = l.enforce_centripetal_limit(&prev, &ChassisSpeeds::new(1.0, 1.0, 0.0), 0.02);
        assert!((s - max).abs() < 1e-9, "{}", s);

        // From rest there is no direction to turn away from
        assert_eq!(
            l.enforce_centripetal_limit(
                &ChassisSpeeds::zero(),
                &ChassisSpeeds::new(0.0, 1.0, 0.0),
                0.02
            ),
            1.0
        );
    }

    #[test]
    fn test_steering_rate() {
        let l = SteeringRateLimiter::new(limits(presets::for_test_2()), &Telemetry::disabled());

        // 1 rad/s for 0.02 s out of a quarter turn
        let s = l.enforce_steering_limit(
            &velocities(1.0, 0.0),
            &velocities(1.0, std::f64::consts::FRAC_PI_2),
            &[None; NUM_MODULES],
            0.02,
        );
        let heading = s.atan2(1.0 - s);
        assert!((heading - 0.02).abs() < 1e-4, "{} {}", s, heading);

        // Overridden modules are skipped
        let s = l.enforce_steering_limit(
            &velocities(1.0, 0.0),
            &velocities(1.0, std::f64::consts::FRAC_PI_2),
            &[Some(0.0); NUM_MODULES],
            0.02,
        );
        assert_eq!(s, 1.0);
    }
}
