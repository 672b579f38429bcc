//! Second order swerve drive kinematics
//!
//! Accounts for the coupling between steering rotation and drive speed. The
//! acceleration of module `i` at `(x, y)` is
//!
//! ```text
//! [ax_i]   [1  0  -x  -y] [ax       ]
//! [ay_i] = [0  1  -y   x] [ay       ]
//!                         [omega^2  ]
//!                         [alpha    ]
//! ```
//!
//! which is then split into the component along the wheel (drive
//! acceleration) and across it (steering rate times speed).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Vector2};

// Internal
use super::{
    swerve_kinematics::{validate_locations, PINV_EPSILON},
    ChassisAccelerations, ChassisSpeeds, KinematicsError, ModuleRate, ModuleState,
    SwerveDriveKinematics, NUM_MODULES, SPEED_EPSILON_MS,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Second order kinematics of a four module swerve drive.
#[derive(Debug, Clone)]
pub struct SecondOrderKinematics {
    first_order: SwerveDriveKinematics,
    inverse_kinematics: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SecondOrderKinematics {
    pub fn new(module_locations_m: [Vector2<f64>; NUM_MODULES]) -> Result<Self, KinematicsError> {
        validate_locations(&module_locations_m)?;

        let mut inverse_kinematics = DMatrix::zeros(NUM_MODULES * 2, 4);
        for (i, loc) in module_locations_m.iter().enumerate() {
            inverse_kinematics[(2 * i, 0)] = 1.0;
            inverse_kinematics[(2 * i, 2)] = -loc.x;
            inverse_kinematics[(2 * i, 3)] = -loc.y;
            inverse_kinematics[(2 * i + 1, 1)] = 1.0;
            inverse_kinematics[(2 * i + 1, 2)] = -loc.y;
            inverse_kinematics[(2 * i + 1, 3)] = loc.x;
        }

        // Check the full system is invertible now rather than on first use
        inverse_kinematics
            .clone()
            .pseudo_inverse(PINV_EPSILON)
            .map_err(|e| KinematicsError::InvalidGeometry(e.to_string()))?;

        Ok(Self {
            first_order: SwerveDriveKinematics::new(module_locations_m)?,
            inverse_kinematics,
        })
    }

    /// Module states and rates for the given robot-relative speeds and
    /// accelerations.
    ///
    /// Stopped modules take their angle from `prev_states` and report a zero
    /// steering rate, since it is undefined at zero speed.
    pub fn to_module_states(
        &self,
        speeds: &ChassisSpeeds,
        accels: &ChassisAccelerations,
        prev_states: &[ModuleState; NUM_MODULES],
    ) -> ([ModuleState; NUM_MODULES], [ModuleRate; NUM_MODULES]) {
        let mut headings = [None; NUM_MODULES];
        for (h, s) in headings.iter_mut().zip(prev_states.iter()) {
            *h = s.angle_rad;
        }

        let states = self.first_order.to_module_states(speeds, &headings);

        let accel_vec = DVector::from_vec(vec![
            accels.ax_mss,
            accels.ay_mss,
            accels.centripetal_rad2s2,
            accels.alpha_radss,
        ]);
        let module_accels = &self.inverse_kinematics * accel_vec;

        let mut rates = [ModuleRate::default(); NUM_MODULES];
        for i in 0..NUM_MODULES {
            let angle = match states[i].angle_rad {
                Some(a) => a,
                None => continue,
            };

            let (sin, cos) = angle.sin_cos();
            let ax = module_accels[2 * i];
            let ay = module_accels[2 * i + 1];
            let speed = states[i].speed_ms;

            rates[i] = ModuleRate {
                accel_mss: ax * cos + ay * sin,
                steer_rate_rads: if speed.abs() < SPEED_EPSILON_MS {
                    0.0
                } else {
                    (-ax * sin + ay * cos) / speed
                },
            };
        }

        (states, rates)
    }

    /// Robot-relative chassis accelerations best matching the given module
    /// states and rates.
    ///
    /// Stopped modules carry no steering information and are left out of the
    /// fit. With no moving module the result is zero.
    pub fn to_chassis_accelerations(
        &self,
        states: &[ModuleState; NUM_MODULES],
        rates: &[ModuleRate; NUM_MODULES],
    ) -> Result<ChassisAccelerations, KinematicsError> {
        let moving: Vec<usize> = (0..NUM_MODULES)
            .filter(|&i| {
                states[i].angle_rad.is_some() && states[i].speed_ms.abs() >= SPEED_EPSILON_MS
            })
            .collect();

        if moving.is_empty() {
            return Ok(ChassisAccelerations::default());
        }

        let mut system = DMatrix::zeros(moving.len() * 2, 4);
        let mut module_accels = DVector::zeros(moving.len() * 2);

        for (row, &i) in moving.iter().enumerate() {
            for col in 0..4 {
                system[(2 * row, col)] = self.inverse_kinematics[(2 * i, col)];
                system[(2 * row + 1, col)] = self.inverse_kinematics[(2 * i + 1, col)];
            }

            let angle = states[i].angle_rad.unwrap_or(0.0);
            let (sin, cos) = angle.sin_cos();
            let tangential = rates[i].accel_mss;
            let normal = states[i].speed_ms * rates[i].steer_rate_rads;

            module_accels[2 * row] = tangential * cos - normal * sin;
            module_accels[2 * row + 1] = tangential * sin + normal * cos;
        }

        let forward = system
            .pseudo_inverse(PINV_EPSILON)
            .map_err(|e| KinematicsError::InvalidGeometry(e.to_string()))?;
        let chassis = forward * module_accels;

        Ok(ChassisAccelerations::new(
            chassis[0], chassis[1], chassis[2], chassis[3],
        ))
    }

    pub fn first_order(&self) -> &SwerveDriveKinematics {
        &self.first_order
    }
}
