//! Per-module states, positions, deltas and rates

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

// Internal
use super::SPEED_EPSILON_MS;
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed and steering angle of a single module.
///
/// The angle is `None` when it is indeterminate: the module has never moved
/// and no previous angle is known. A module with nonzero speed always has an
/// angle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleState {
    /// Units: meters/second
    pub speed_ms: f64,

    /// Units: radians, in (-pi, pi]
    pub angle_rad: Option<f64>,
}

/// Distance travelled and steering angle of a single module.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModulePosition {
    pub distance_m: f64,
    pub angle_rad: Option<f64>,
}

/// Change in a module's position over some interval, with the angle the
/// module had at the end of it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleDelta {
    pub distance_m: f64,
    pub angle_rad: Option<f64>,
}

/// Drive acceleration and steering rate of a single module. Only meaningful
/// for a moving module.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleRate {
    pub accel_mss: f64,
    pub steer_rate_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleState {
    pub fn new(speed_ms: f64, angle_rad: Option<f64>) -> Self {
        Self {
            speed_ms,
            angle_rad: angle_rad.map(angle_modulus),
        }
    }

    /// A stopped module pointing at `angle_rad`.
    pub fn at_rest(angle_rad: f64) -> Self {
        Self::new(0.0, Some(angle_rad))
    }

    pub fn is_stopped(&self, epsilon_ms: f64) -> bool {
        self.speed_ms.abs() <= epsilon_ms
    }

    /// Velocity of the wheel's contact point in the robot frame. A module
    /// with no angle contributes nothing.
    pub fn velocity(&self) -> Vector2<f64> {
        match self.angle_rad {
            Some(a) => Vector2::new(self.speed_ms * a.cos(), self.speed_ms * a.sin()),
            None => Vector2::zeros(),
        }
    }

    /// Minimise the steering rotation needed to reach this state from a
    /// module currently at `current_angle_rad`.
    ///
    /// If the module would have to rotate by more than a quarter turn the
    /// speed is reversed and the angle rotated by half a turn instead. Below
    /// the speed epsilon the current angle is kept, whether or not it is
    /// known.
    pub fn optimize(&self, current_angle_rad: Option<f64>) -> ModuleState {
        if self.speed_ms.abs() < SPEED_EPSILON_MS {
            return ModuleState {
                speed_ms: 0.0,
                angle_rad: current_angle_rad.map(angle_modulus),
            };
        }

        match (self.angle_rad, current_angle_rad) {
            (Some(desired), Some(current)) => {
                if should_flip(desired - current) {
                    ModuleState::new(-self.speed_ms, Some(desired + PI))
                } else {
                    ModuleState::new(self.speed_ms, Some(desired))
                }
            }
            _ => *self,
        }
    }
}

impl ModulePosition {
    pub fn new(distance_m: f64, angle_rad: Option<f64>) -> Self {
        Self {
            distance_m,
            angle_rad,
        }
    }
}

impl ModuleDelta {
    pub fn new(distance_m: f64, angle_rad: Option<f64>) -> Self {
        Self {
            distance_m,
            angle_rad,
        }
    }

    /// Displacement of the wheel in the robot frame.
    pub fn displacement(&self) -> Vector2<f64> {
        match self.angle_rad {
            Some(a) => Vector2::new(self.distance_m * a.cos(), self.distance_m * a.sin()),
            None => Vector2::zeros(),
        }
    }
}

/// True if a rotation of `rotation_rad` is better achieved by reversing the
/// wheel.
pub fn should_flip(rotation_rad: f64) -> bool {
    angle_modulus(rotation_rad).abs() > FRAC_PI_2
}

/// The delta between two positions of the same module. A module whose angle
/// is unknown contributes a zero-length, angle-less delta.
pub fn module_position_delta(start: &ModulePosition, end: &ModulePosition) -> ModuleDelta {
    match (start.angle_rad, end.angle_rad) {
        (Some(_), Some(a)) => ModuleDelta::new(end.distance_m - start.distance_m, Some(a)),
        _ => ModuleDelta::new(0.0, None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_optimize_flips_large_rotation() {
        let desired = ModuleState::new(2.0, Some(PI));
        let optimized = desired.optimize(Some(0.1));

        assert!((optimized.speed_ms + 2.0).abs() < 1e-12);
        assert!(optimized.angle_rad.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_optimize_keeps_small_rotation() {
        let desired = ModuleState::new(2.0, Some(1.0));
        assert_eq!(desired.optimize(Some(0.0)), desired);
    }

    #[test]
    fn test_optimize_stopped_keeps_current() {
        let desired = ModuleState::new(0.0, Some(1.0));

        assert_eq!(desired.optimize(Some(-0.5)), ModuleState::at_rest(-0.5));
        assert_eq!(desired.optimize(None), ModuleState::new(0.0, None));
    }

    #[test]
    fn test_optimize_minimal_rotation() {
        let n = 37;
        for i in 0..n {
            for j in 0..n {
                let desired_angle = -PI + 2.0 * PI * (i as f64) / (n as f64 - 1.0);
                let current = -PI + 2.0 * PI * (j as f64) / (n as f64 - 1.0);

                let optimized = ModuleState::new(1.0, Some(desired_angle)).optimize(Some(current));
                let rotation = angle_modulus(optimized.angle_rad.unwrap() - current);

                assert!(
                    rotation.abs() <= FRAC_PI_2 + 1e-12,
                    "desired {} current {} rotation {}",
                    desired_angle,
                    current,
                    rotation
                );

                // Same wheel velocity either way
                let v0 = ModuleState::new(1.0, Some(desired_angle)).velocity();
                assert!((optimized.velocity() - v0).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn test_position_delta() {
        let start = ModulePosition::new(1.0, Some(0.0));
        let end = ModulePosition::new(1.5, Some(0.2));

        assert_eq!(module_position_delta(&start, &end), ModuleDelta::new(0.5, Some(0.2)));
        assert_eq!(
            module_position_delta(&ModulePosition::new(1.0, None), &end),
            ModuleDelta::new(0.0, None)
        );
    }
}
