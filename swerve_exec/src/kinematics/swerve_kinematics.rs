//! First order swerve drive kinematics
//!
//! The inverse kinematics matrix maps chassis speeds `[vx, vy, omega]` onto
//! the stacked wheel velocities `[v1x, v1y, v2x, v2y, ...]`, each module
//! contributing the rows `[1, 0, -y]` and `[0, 1, x]`. Forward kinematics is
//! its pseudo-inverse, a least squares fit of the chassis motion to what the
//! modules report.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Vector2};

// Internal
use super::{
    ChassisSpeeds, KinematicsError, ModuleDelta, ModuleState, NUM_MODULES, SPEED_EPSILON_MS,
};
use crate::geom::Twist2;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Singular values below this are dropped by the pseudo-inverse.
pub(crate) const PINV_EPSILON: f64 = 1e-12;

/// Minimum separation of two module locations.
///
/// Units: meters
const MIN_MODULE_SEPARATION_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// First order kinematics of a four module swerve drive. Immutable once
/// built.
#[derive(Debug, Clone)]
pub struct SwerveDriveKinematics {
    module_locations_m: [Vector2<f64>; NUM_MODULES],
    inverse_kinematics: DMatrix<f64>,
    forward_kinematics: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveDriveKinematics {
    /// Build the kinematics for modules at the given locations relative to
    /// the robot's centre.
    pub fn new(module_locations_m: [Vector2<f64>; NUM_MODULES]) -> Result<Self, KinematicsError> {
        validate_locations(&module_locations_m)?;

        let mut inverse_kinematics = DMatrix::zeros(NUM_MODULES * 2, 3);
        for (i, loc) in module_locations_m.iter().enumerate() {
            inverse_kinematics[(2 * i, 0)] = 1.0;
            inverse_kinematics[(2 * i, 2)] = -loc.y;
            inverse_kinematics[(2 * i + 1, 1)] = 1.0;
            inverse_kinematics[(2 * i + 1, 2)] = loc.x;
        }

        let forward_kinematics = inverse_kinematics
            .clone()
            .pseudo_inverse(PINV_EPSILON)
            .map_err(|e| KinematicsError::InvalidGeometry(e.to_string()))?;

        Ok(Self {
            module_locations_m,
            inverse_kinematics,
            forward_kinematics,
        })
    }

    pub fn module_locations(&self) -> &[Vector2<f64>; NUM_MODULES] {
        &self.module_locations_m
    }

    /// Module states which produce the given robot-relative chassis speeds.
    ///
    /// A module whose resulting speed is below epsilon is given zero speed
    /// and its remembered heading from `headings`, which may be `None`.
    pub fn to_module_states(
        &self,
        speeds: &ChassisSpeeds,
        headings: &[Option<f64>; NUM_MODULES],
    ) -> [ModuleState; NUM_MODULES] {
        let wheel = self.wheel_vectors(speeds.vx_ms, speeds.vy_ms, speeds.omega_rads);

        let mut states = [ModuleState::default(); NUM_MODULES];
        for i in 0..NUM_MODULES {
            let speed = wheel[i].norm();
            states[i] = if speed < SPEED_EPSILON_MS {
                ModuleState::new(0.0, headings[i])
            } else {
                ModuleState::new(speed, Some(wheel[i].y.atan2(wheel[i].x)))
            };
        }

        states
    }

    /// Robot-relative chassis speeds best matching the given module states.
    pub fn to_chassis_speeds(&self, states: &[ModuleState; NUM_MODULES]) -> ChassisSpeeds {
        let mut wheel = DVector::zeros(NUM_MODULES * 2);
        for (i, s) in states.iter().enumerate() {
            let v = s.velocity();
            wheel[2 * i] = v.x;
            wheel[2 * i + 1] = v.y;
        }

        let chassis = &self.forward_kinematics * wheel;
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// Module deltas which produce the given robot-relative twist.
    pub fn to_module_deltas(
        &self,
        twist: &Twist2,
        headings: &[Option<f64>; NUM_MODULES],
    ) -> [ModuleDelta; NUM_MODULES] {
        let wheel = self.wheel_vectors(twist.dx_m, twist.dy_m, twist.dtheta_rad);

        let mut deltas = [ModuleDelta::default(); NUM_MODULES];
        for i in 0..NUM_MODULES {
            let dist = wheel[i].norm();
            deltas[i] = if dist < SPEED_EPSILON_MS {
                ModuleDelta::new(0.0, headings[i])
            } else {
                ModuleDelta::new(dist, Some(wheel[i].y.atan2(wheel[i].x)))
            };
        }

        deltas
    }

    /// Robot-relative twist best matching the given module deltas, suitable
    /// for [`crate::geom::Pose2::exp`].
    pub fn to_twist(&self, deltas: &[ModuleDelta; NUM_MODULES]) -> Twist2 {
        let mut wheel = DVector::zeros(NUM_MODULES * 2);
        for (i, d) in deltas.iter().enumerate() {
            let v = d.displacement();
            wheel[2 * i] = v.x;
            wheel[2 * i + 1] = v.y;
        }

        let chassis = &self.forward_kinematics * wheel;
        Twist2::new(chassis[0], chassis[1], chassis[2])
    }

    /// Scale all speeds uniformly so that none exceeds `max_speed_ms`.
    pub fn desaturate_wheel_speeds(states: &mut [ModuleState; NUM_MODULES], max_speed_ms: f64) {
        let max = states
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0.0, f64::max);

        if max > max_speed_ms {
            let k = max_speed_ms / max;
            for s in states.iter_mut() {
                s.speed_ms *= k;
            }
        }
    }

    fn wheel_vectors(&self, x: f64, y: f64, theta: f64) -> [Vector2<f64>; NUM_MODULES] {
        let chassis = DVector::from_vec(vec![x, y, theta]);
        let wheel = &self.inverse_kinematics * chassis;

        let mut vectors = [Vector2::zeros(); NUM_MODULES];
        for (i, v) in vectors.iter_mut().enumerate() {
            *v = Vector2::new(wheel[2 * i], wheel[2 * i + 1]);
        }

        vectors
    }
}

/// Check that module locations are finite and distinct.
pub(crate) fn validate_locations(
    locations: &[Vector2<f64>; NUM_MODULES],
) -> Result<(), KinematicsError> {
    for (i, a) in locations.iter().enumerate() {
        if !a.x.is_finite() || !a.y.is_finite() {
            return Err(KinematicsError::InvalidGeometry(format!(
                "module {} location is not finite",
                i
            )));
        }

        for (j, b) in locations.iter().enumerate().skip(i + 1) {
            if (a - b).norm() < MIN_MODULE_SEPARATION_M {
                return Err(KinematicsError::InvalidGeometry(format!(
                    "modules {} and {} share a location",
                    i, j
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    const HEADINGS_ZERO: [Option<f64>; NUM_MODULES] = [Some(0.0); NUM_MODULES];

    /// Unit square base, modules at the corners.
    fn unit_square() -> SwerveDriveKinematics {
        SwerveDriveKinematics::new([
            Vector2::new(0.5, 0.5),
            Vector2::new(0.5, -0.5),
            Vector2::new(-0.5, 0.5),
            Vector2::new(-0.5, -0.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_straight_line() {
        let k = unit_square();
        let states = k.to_module_states(&ChassisSpeeds::new(5.0, 0.0, 0.0), &HEADINGS_ZERO);

        for s in states.iter() {
            assert!((s.speed_ms - 5.0).abs() < 1e-12);
            assert!(s.angle_rad.unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn test_pure_spin() {
        let k = unit_square();
        let states = k.to_module_states(&ChassisSpeeds::new(0.0, 0.0, 2.0 * PI), &HEADINGS_ZERO);

        let expected_deg = [135.0, 45.0, -135.0, -45.0];
        for (s, e) in states.iter().zip(expected_deg.iter()) {
            assert!((s.speed_ms - states[0].speed_ms).abs() < 1e-12);
            assert!((s.angle_rad.unwrap().to_degrees() - e).abs() < 1e-9);
        }
        assert!((states[0].speed_ms - 2.0 * PI * 0.5f64.hypot(0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_crab_right() {
        let k = unit_square();
        let states = k.to_module_states(&ChassisSpeeds::new(0.0, -1.0, 0.0), &HEADINGS_ZERO);

        for s in states.iter() {
            assert!((s.angle_rad.unwrap() + PI / 2.0).abs() < 1e-12);
            assert!((s.speed_ms - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_stationary_keeps_headings() {
        let k = unit_square();
        let headings = [Some(0.1), Some(0.2), None, Some(-0.3)];
        let states = k.to_module_states(&ChassisSpeeds::zero(), &headings);

        for (s, h) in states.iter().zip(headings.iter()) {
            assert_eq!(s.speed_ms, 0.0);
            assert_eq!(s.angle_rad, *h);
        }
    }

    #[test]
    fn test_inverse_forward_round_trip() {
        let k = unit_square();

        for c in &[
            ChassisSpeeds::new(1.0, 0.0, 0.0),
            ChassisSpeeds::new(0.0, -2.0, 0.0),
            ChassisSpeeds::new(0.0, 0.0, 3.0),
            ChassisSpeeds::new(1.5, 0.7, -2.1),
            ChassisSpeeds::new(-4.0, 3.0, 0.5),
            ChassisSpeeds::zero(),
        ] {
            let states = k.to_module_states(c, &HEADINGS_ZERO);
            let back = k.to_chassis_speeds(&states);
            assert!(back.is_near(c, 1e-9), "{:?} -> {:?}", c, back);
        }
    }

    #[test]
    fn test_twist_round_trip() {
        let k = SwerveDriveKinematics::new([
            Vector2::new(0.31, 0.24),
            Vector2::new(0.31, -0.24),
            Vector2::new(-0.15, 0.215),
            Vector2::new(-0.15, -0.215),
        ])
        .unwrap();

        for t in &[
            Twist2::new(0.1, 0.0, 0.0),
            Twist2::new(0.02, -0.03, 0.1),
            Twist2::new(0.0, 0.0, -0.2),
        ] {
            let deltas = k.to_module_deltas(t, &HEADINGS_ZERO);
            assert!(k.to_twist(&deltas).is_near(t, 1e-9), "{:?}", t);
        }
    }

    #[test]
    fn test_desaturate_wheel_speeds() {
        let mut states = [
            ModuleState::new(5.0, Some(0.0)),
            ModuleState::new(-2.5, Some(1.0)),
            ModuleState::new(1.0, Some(2.0)),
            ModuleState::new(0.0, Some(3.0)),
        ];
        SwerveDriveKinematics::desaturate_wheel_speeds(&mut states, 4.0);

        assert!((states[0].speed_ms - 4.0).abs() < 1e-12);
        assert!((states[1].speed_ms + 2.0).abs() < 1e-12);
        assert!((states[2].speed_ms - 0.8).abs() < 1e-12);
        assert_eq!(states[3].angle_rad, Some(3.0));
    }

    #[test]
    fn test_duplicate_locations_rejected() {
        let res = SwerveDriveKinematics::new([
            Vector2::new(0.5, 0.5),
            Vector2::new(0.5, 0.5),
            Vector2::new(-0.5, 0.5),
            Vector2::new(-0.5, -0.5),
        ]);

        assert!(matches!(res, Err(KinematicsError::InvalidGeometry(_))));
    }
}
