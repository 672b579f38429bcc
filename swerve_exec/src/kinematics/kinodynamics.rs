//! Kinodynamic limits of the drivetrain
//!
//! [`KinodynamicLimits`] holds the raw, configurable numbers. Building a
//! [`SwerveKinodynamics`] from them validates them, derives the limits that
//! follow from the geometry and constructs the kinematics.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::{
    KinematicsError, ModuleState, SecondOrderKinematics, SwerveDriveKinematics, NUM_MODULES,
    SPEED_EPSILON_MS,
};
use crate::profile::TrapezoidProfile;
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: meters/second^2
pub const GRAVITY_MSS: f64 = 9.81;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configurable limits and geometry of a swerve drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinodynamicLimits {
    /// Units: meters/second
    pub max_drive_velocity_ms: f64,

    /// Drive acceleration available at zero speed, falling linearly to zero
    /// at the max drive velocity.
    ///
    /// Units: meters/second^2
    pub stall_acceleration_mss: f64,

    /// Units: meters/second^2
    pub max_drive_acceleration_mss: f64,

    /// Units: meters/second^2
    pub max_drive_deceleration_mss: f64,

    /// Units: radians/second
    pub max_steering_velocity_rads: f64,

    /// Units: radians/second^2
    pub max_steering_acceleration_radss: f64,

    /// Units: meters
    pub front_track_m: f64,

    /// Units: meters
    pub back_track_m: f64,

    /// Distance between the front and back axles.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// Distance from the robot's centre forward to the front axle.
    ///
    /// Units: meters
    pub front_offset_m: f64,

    /// Height of the centre of gravity.
    ///
    /// Units: meters
    pub vcg_m: f64,

    pub tire: Tire,
}

/// Validated limits with the quantities derived from them.
#[derive(Debug, Clone)]
pub struct SwerveKinodynamics {
    limits: KinodynamicLimits,

    kinematics: SwerveDriveKinematics,
    second_order: SecondOrderKinematics,

    /// Largest distance from the centre to a module.
    ///
    /// Units: meters
    radius_m: f64,

    /// Units: radians/second
    max_angle_speed_rads: f64,

    /// Units: radians/second^2
    max_angle_accel_radss: f64,

    /// Units: meters/second^2
    max_capsize_accel_mss: f64,

    steering_profile: TrapezoidProfile,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Model of the contact between a wheel and the floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum Tire {
    /// The wheel follows its commanded speed exactly.
    NoSlip,

    /// The wheel's speed changes by at most `saturation_mss * dt` per tick.
    Slip { saturation_mss: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Tire {
    fn default() -> Self {
        Tire::NoSlip
    }
}

impl Tire {
    /// The wheel speed reached after `dt` when commanded to `desired_ms` from
    /// `prev_ms`.
    pub fn apply(&self, prev_ms: f64, desired_ms: f64, dt: f64) -> f64 {
        match self {
            Tire::NoSlip => desired_ms,
            Tire::Slip { saturation_mss } => {
                let max_change = saturation_mss * dt;
                prev_ms + (desired_ms - prev_ms).max(-max_change).min(max_change)
            }
        }
    }
}

impl KinodynamicLimits {
    /// Module locations in the order front-left, front-right, rear-left,
    /// rear-right.
    pub fn module_locations(&self) -> [Vector2<f64>; NUM_MODULES] {
        let back_x = self.front_offset_m - self.wheelbase_m;
        [
            Vector2::new(self.front_offset_m, self.front_track_m / 2.0),
            Vector2::new(self.front_offset_m, -self.front_track_m / 2.0),
            Vector2::new(back_x, self.back_track_m / 2.0),
            Vector2::new(back_x, -self.back_track_m / 2.0),
        ]
    }

    fn validate(&self) -> Result<(), KinematicsError> {
        let positive = [
            ("max_drive_velocity_ms", self.max_drive_velocity_ms),
            ("stall_acceleration_mss", self.stall_acceleration_mss),
            ("max_drive_acceleration_mss", self.max_drive_acceleration_mss),
            ("max_drive_deceleration_mss", self.max_drive_deceleration_mss),
            ("max_steering_velocity_rads", self.max_steering_velocity_rads),
            ("max_steering_acceleration_radss", self.max_steering_acceleration_radss),
            ("front_track_m", self.front_track_m),
            ("back_track_m", self.back_track_m),
            ("wheelbase_m", self.wheelbase_m),
            ("vcg_m", self.vcg_m),
        ];

        for &(name, value) in positive.iter() {
            if !value.is_finite() || value <= 0.0 {
                return Err(KinematicsError::InvalidLimits { name, value });
            }
        }

        if !self.front_offset_m.is_finite() {
            return Err(KinematicsError::InvalidGeometry(format!(
                "front offset {} is not finite",
                self.front_offset_m
            )));
        }

        if let Tire::Slip { saturation_mss } = self.tire {
            if !saturation_mss.is_finite() || saturation_mss <= 0.0 {
                return Err(KinematicsError::InvalidLimits {
                    name: "tire.saturation_mss",
                    value: saturation_mss,
                });
            }
        }

        Ok(())
    }
}

impl SwerveKinodynamics {
    /// Validate the limits and build the kinematics.
    pub fn new(limits: KinodynamicLimits) -> Result<Self, KinematicsError> {
        limits.validate()?;

        let locations = limits.module_locations();
        let kinematics = SwerveDriveKinematics::new(locations)?;
        let second_order = SecondOrderKinematics::new(locations)?;

        let radius_m = locations.iter().map(|l| l.norm()).fold(0.0, f64::max);

        let max_angle_speed_rads = limits.max_drive_velocity_ms / radius_m;
        let max_angle_accel_radss = 12.0 * limits.max_drive_acceleration_mss * radius_m
            / (limits.front_track_m.powi(2) + limits.wheelbase_m.powi(2));

        let min_track_m = limits.front_track_m.min(limits.back_track_m);
        let max_capsize_accel_mss = GRAVITY_MSS * (min_track_m / 2.0) / limits.vcg_m;

        let steering_profile = TrapezoidProfile::new(
            limits.max_steering_velocity_rads,
            limits.max_steering_acceleration_radss,
        );

        Ok(Self {
            limits,
            kinematics,
            second_order,
            radius_m,
            max_angle_speed_rads,
            max_angle_accel_radss,
            max_capsize_accel_mss,
            steering_profile,
        })
    }

    pub fn limits(&self) -> &KinodynamicLimits {
        &self.limits
    }

    pub fn kinematics(&self) -> &SwerveDriveKinematics {
        &self.kinematics
    }

    pub fn second_order(&self) -> &SecondOrderKinematics {
        &self.second_order
    }

    pub fn max_drive_velocity_ms(&self) -> f64 {
        self.limits.max_drive_velocity_ms
    }

    pub fn max_drive_acceleration_mss(&self) -> f64 {
        self.limits.max_drive_acceleration_mss
    }

    pub fn max_drive_deceleration_mss(&self) -> f64 {
        self.limits.max_drive_deceleration_mss
    }

    pub fn max_steering_velocity_rads(&self) -> f64 {
        self.limits.max_steering_velocity_rads
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn max_angle_speed_rads(&self) -> f64 {
        self.max_angle_speed_rads
    }

    pub fn max_angle_accel_radss(&self) -> f64 {
        self.max_angle_accel_radss
    }

    /// Lateral acceleration above which the robot tips over.
    pub fn max_capsize_accel_mss(&self) -> f64 {
        self.max_capsize_accel_mss
    }

    pub fn steering_profile(&self) -> &TrapezoidProfile {
        &self.steering_profile
    }

    pub fn tire(&self) -> &Tire {
        &self.limits.tire
    }

    /// Drive acceleration available to a module at `speed_ms`, limited by
    /// both the configured maximum and the motor's falling torque curve.
    pub fn max_drive_accel_at(&self, speed_ms: f64) -> f64 {
        let back_emf = 1.0 - speed_ms.abs() / self.limits.max_drive_velocity_ms;
        (self.limits.stall_acceleration_mss * back_emf)
            .min(self.limits.max_drive_acceleration_mss)
            .max(0.0)
    }

    /// Scale all module speeds uniformly so that, moving on from `prev`
    /// over `dt`, no module exceeds the max drive velocity, its acceleration
    /// or deceleration limit, or the max steering rate.
    ///
    /// Angles are untouched. Returns the scale factor applied, in `[0, 1]`.
    pub fn desaturate(
        &self,
        states: &mut [ModuleState; NUM_MODULES],
        prev: &[ModuleState; NUM_MODULES],
        dt: f64,
    ) -> f64 {
        let l = &self.limits;
        let mut s: f64 = 1.0;

        for (state, prev) in states.iter().zip(prev.iter()) {
            let speed = state.speed_ms.abs();
            if speed < SPEED_EPSILON_MS {
                continue;
            }

            if speed > l.max_drive_velocity_ms {
                s = s.min(l.max_drive_velocity_ms / speed);
            }

            if dt <= 0.0 {
                continue;
            }

            // Previous velocity projected onto the new wheel direction
            let prev_along = match (state.angle_rad, prev.angle_rad) {
                (Some(a), Some(b)) => prev.speed_ms * (a - b).cos(),
                _ => 0.0,
            };

            if prev_along * state.speed_ms >= 0.0 {
                let max_speed = prev_along.abs() + l.max_drive_acceleration_mss * dt;
                if speed > max_speed {
                    s = s.min(max_speed / speed);
                }
            } else {
                // Any change left after stopping may be spent reversing
                let margin = l.max_drive_deceleration_mss * dt - prev_along.abs();
                if margin <= 0.0 {
                    s = 0.0;
                } else if speed > margin {
                    s = s.min(margin / speed);
                }
            }

            if let (Some(a), Some(b)) = (state.angle_rad, prev.angle_rad) {
                let max_steer = l.max_steering_velocity_rads * dt;
                let steer = angle_modulus(a - b).abs();
                if steer > max_steer {
                    s = s.min(max_steer / steer);
                }
            }
        }

        let s = s.max(0.0).min(1.0);
        if s < 1.0 {
            trace!("Desaturating module speeds by {:.4}", s);
            for state in states.iter_mut() {
                state.speed_ms *= s;
            }
        }

        s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::presets;

    #[test]
    fn test_invalid_limits_rejected() {
        let mut limits = presets::for_test();
        limits.max_drive_deceleration_mss = 0.0;

        match SwerveKinodynamics::new(limits) {
            Err(KinematicsError::InvalidLimits { name, .. }) => {
                assert_eq!(name, "max_drive_deceleration_mss")
            }
            other => panic!("expected invalid limits, got {:?}", other),
        }

        let mut limits = presets::for_test();
        limits.tire = Tire::Slip {
            saturation_mss: -1.0,
        };
        assert!(SwerveKinodynamics::new(limits).is_err());
    }

    #[test]
    fn test_derived_limits() {
        let k = SwerveKinodynamics::new(presets::high_capsize()).unwrap();

        // 9.81 * 0.25 / 0.1
        assert!((k.max_capsize_accel_mss() - 24.525).abs() < 1e-9);

        let radius = (0.25f64 * 0.25 * 2.0).sqrt();
        assert!((k.radius_m() - radius).abs() < 1e-12);
        assert!((k.max_angle_speed_rads() - 5.0 / radius).abs() < 1e-9);
        assert!((k.max_angle_accel_radss() - 12.0 * 10.0 * radius / 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_module_locations_with_offset() {
        let l = presets::comp_bot();
        let locs = l.module_locations();

        assert!((locs[0] - Vector2::new(0.31, 0.24)).norm() < 1e-12);
        assert!((locs[1] - Vector2::new(0.31, -0.24)).norm() < 1e-12);
        assert!((locs[2] - Vector2::new(-0.15, 0.215)).norm() < 1e-12);
        assert!((locs[3] - Vector2::new(-0.15, -0.215)).norm() < 1e-12);
    }

    #[test]
    fn test_tire() {
        assert_eq!(Tire::NoSlip.apply(0.0, 3.0, 0.02), 3.0);

        let slip = Tire::Slip {
            saturation_mss: 10.0,
        };
        assert!((slip.apply(0.0, 3.0, 0.02) - 0.2).abs() < 1e-12);
        assert!((slip.apply(1.0, 0.0, 0.02) - 0.8).abs() < 1e-12);
        assert!((slip.apply(1.0, 1.1, 0.02) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_max_drive_accel_falls_with_speed() {
        let k = SwerveKinodynamics::new(presets::limiting()).unwrap();

        assert!((k.max_drive_accel_at(0.0) - 10.0).abs() < 1e-12);
        assert!((k.max_drive_accel_at(4.0) - 6.0).abs() < 1e-12);
        assert_eq!(k.max_drive_accel_at(6.0), 0.0);
    }

    #[test]
    fn test_desaturate_velocity_preserves_ratios() {
        let k = SwerveKinodynamics::new(presets::for_test()).unwrap();
        let prev = [
            ModuleState::new(2.0, Some(0.0)),
            ModuleState::new(1.0, Some(0.0)),
            ModuleState::new(0.5, Some(0.0)),
            ModuleState::new(-1.0, Some(0.0)),
        ];
        let mut states = prev;

        // No dt: only the velocity limit applies
        let s = k.desaturate(&mut states, &prev, 0.0);
        assert!((s - 0.5).abs() < 1e-12);
        assert!(states.iter().all(|m| m.speed_ms.abs() <= 1.0 + 1e-12));
        assert!((states[0].speed_ms / states[2].speed_ms - 4.0).abs() < 1e-9);
        assert_eq!(states[3].angle_rad, Some(0.0));
    }

    #[test]
    fn test_desaturate_acceleration() {
        let k = SwerveKinodynamics::new(presets::for_test()).unwrap();
        let prev = [ModuleState::at_rest(0.0); NUM_MODULES];
        let mut states = [ModuleState::new(1.0, Some(0.0)); NUM_MODULES];

        let s = k.desaturate(&mut states, &prev, 0.02);
        assert!((s - 0.02).abs() < 1e-12);
        assert!((states[0].speed_ms - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_desaturate_reversal_uses_decel() {
        let k = SwerveKinodynamics::new(presets::decel_case()).unwrap();
        let prev = [ModuleState::new(0.05, Some(0.0)); NUM_MODULES];
        let mut states = [ModuleState::new(-1.0, Some(0.0)); NUM_MODULES];

        // decel 10 over 0.02 gives 0.2 of change, 0.05 of it spent stopping
        let s = k.desaturate(&mut states, &prev, 0.02);
        assert!((s - 0.15).abs() < 1e-9, "{}", s);
    }

    #[test]
    fn test_desaturate_reversal_faster_than_decel() {
        let k = SwerveKinodynamics::new(presets::decel_case()).unwrap();
        let prev = [ModuleState::new(1.0, Some(0.0)); NUM_MODULES];
        let mut states = [ModuleState::new(-1.0, Some(0.0)); NUM_MODULES];

        // decel 10 over 0.02 cannot even stop the wheel, so hold zero
        let s = k.desaturate(&mut states, &prev, 0.02);
        assert_eq!(s, 0.0);
        for (state, prev) in states.iter().zip(prev.iter()) {
            assert!((state.speed_ms - prev.speed_ms).abs() <= 1.0 + 1e-12);
            assert!(state.speed_ms.abs() < 1e-12);
        }
    }

    #[test]
    fn test_desaturate_steering() {
        let k = SwerveKinodynamics::new(presets::for_test_2()).unwrap();
        let prev = [ModuleState::new(0.1, Some(0.0)); NUM_MODULES];
        let mut states = [ModuleState::new(0.1, Some(0.1)); NUM_MODULES];

        // steering 1 rad/s over 0.02 s allows 0.02 of the 0.1 rad change
        let s = k.desaturate(&mut states, &prev, 0.02);
        assert!((s - 0.2).abs() < 1e-9, "{}", s);
        assert!((states[0].angle_rad.unwrap() - 0.1).abs() < 1e-12);
    }
}
