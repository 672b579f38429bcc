//! Hold the drive while a stopped module steers
//!
//! If any module is stopped and misaligned with the direction it is about to
//! drive in, all modules are held at zero speed until it is aligned.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::PI;
use std::sync::Arc;

// Internal
use crate::kinematics::{should_flip, ModuleState, SwerveKinodynamics, NUM_MODULES};
use util::{
    maths::angle_modulus,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Modules slower than this are treated as stopped.
///
/// Units: meters/second
pub const STOPPED_EPSILON_MS: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SteeringOverride {
    limits: Arc<SwerveKinodynamics>,
    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteeringOverride {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        Self {
            limits,
            telemetry: telemetry.child("steering_override"),
        }
    }

    /// Returns the scale factor, either 0 or 1, and the steering angle to
    /// force on each stopped module.
    ///
    /// Stopped modules which can align within `dt` are overridden to their
    /// desired (unflipped) angle. Those which cannot are stepped one tick of
    /// steering rotation towards it, in the flipped direction if shorter,
    /// and force the scale to zero.
    pub fn override_if_stopped(
        &self,
        desired: &[ModuleState; NUM_MODULES],
        prev: &[ModuleState; NUM_MODULES],
        dt: f64,
    ) -> (f64, [Option<f64>; NUM_MODULES]) {
        let max_step_rad = dt * self.limits.max_steering_velocity_rads();
        let mut s: f64 = 1.0;
        let mut overrides = [None; NUM_MODULES];

        for i in 0..NUM_MODULES {
            if !prev[i].is_stopped(STOPPED_EPSILON_MS) {
                continue;
            }

            // Both stopped, stay where we are
            if desired[i].is_stopped(STOPPED_EPSILON_MS) {
                overrides[i] = prev[i].angle_rad;
                continue;
            }

            let (desired_angle, prev_angle) = match (desired[i].angle_rad, prev[i].angle_rad) {
                (Some(d), Some(p)) => (d, p),
                _ => continue,
            };

            let rotation = required_rotation(desired_angle, prev_angle);
            if rotation.abs() <= max_step_rad {
                overrides[i] = Some(desired_angle);
            } else {
                overrides[i] = Some(angle_modulus(prev_angle + rotation.signum() * max_step_rad));
                s = 0.0;
            }
        }

        self.telemetry.log_f64(Level::Trace, "s", || s);
        (s, overrides)
    }
}

/// Rotation needed to align a module at `prev_rad` with `desired_rad`,
/// allowing the wheel to reverse.
fn required_rotation(desired_rad: f64, prev_rad: f64) -> f64 {
    let rotation = desired_rad - prev_rad;
    if should_flip(rotation) {
        angle_modulus(rotation + PI)
    } else {
        angle_modulus(rotation)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::{presets, KinodynamicLimits};
    use std::f64::consts::FRAC_PI_2;

    fn limits() -> Arc<SwerveKinodynamics> {
        Arc::new(
            SwerveKinodynamics::new(KinodynamicLimits {
                max_steering_velocity_rads: 10.0,
                ..presets::high_capsize()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_stopped_and_misaligned() {
        let o = SteeringOverride::new(limits(), &Telemetry::disabled());
        let prev = [ModuleState::at_rest(0.0); NUM_MODULES];
        let desired = [ModuleState::new(1.0, Some(FRAC_PI_2)); NUM_MODULES];

        let (s, overrides) = o.override_if_stopped(&desired, &prev, 0.02);
        assert_eq!(s, 0.0);
        for a in overrides.iter() {
            assert!((a.unwrap() - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_flipped_rotation_is_shorter() {
        let o = SteeringOverride::new(limits(), &Telemetry::disabled());
        let prev = [ModuleState::at_rest(0.0); NUM_MODULES];
        let desired = [ModuleState::new(1.0, Some(2.0 * FRAC_PI_2 - 0.1)); NUM_MODULES];

        // Reversing the wheel only needs 0.1 rad, well within one step
        let (s, overrides) = o.override_if_stopped(&desired, &prev, 0.02);
        assert_eq!(s, 1.0);
        assert!((overrides[0].unwrap() - (PI - 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_moving_modules_not_overridden() {
        let o = SteeringOverride::new(limits(), &Telemetry::disabled());
        let prev = [ModuleState::new(1.0, Some(0.0)); NUM_MODULES];
        let desired = [ModuleState::new(1.0, Some(FRAC_PI_2)); NUM_MODULES];

        let (s, overrides) = o.override_if_stopped(&desired, &prev, 0.02);
        assert_eq!(s, 1.0);
        assert!(overrides.iter().all(|o| o.is_none()));
    }

    #[test]
    fn test_both_stopped_keeps_angle() {
        let o = SteeringOverride::new(limits(), &Telemetry::disabled());
        let prev = [ModuleState::at_rest(0.4); NUM_MODULES];
        let desired = [ModuleState::at_rest(1.0); NUM_MODULES];

        let (s, overrides) = o.override_if_stopped(&desired, &prev, 0.02);
        assert_eq!(s, 1.0);
        assert!((overrides[0].unwrap() - 0.4).abs() < 1e-12);
    }
}
