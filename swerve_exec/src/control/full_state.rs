//! Full state feedback holonomic controller
//!
//! Each axis is driven by the reference velocity plus feedback on both the
//! position and velocity errors:
//!
//! ```text
//! u = v_ref + K_x * (x_ref - x) + K_v * (v_ref - v)
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{HolonomicController, SwerveState};
use crate::{kinematics::ChassisSpeeds, profile::ProfileState};
use util::{
    maths::angle_modulus,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Position error gain.
///
/// Units: 1/second
pub const K_X: f64 = 4.0;

/// Velocity error gain.
pub const K_V: f64 = 0.25;

const X_TOLERANCE_M: f64 = 0.01;
const THETA_TOLERANCE_RAD: f64 = 0.02;
const V_TOLERANCE_MS: f64 = 0.05;
const OMEGA_TOLERANCE_RADS: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FullStateDriveController {
    k_x: f64,
    k_v: f64,

    last_error: Option<StateError>,

    telemetry: Telemetry,
}

/// Reference minus measurement for each axis, heading wrapped.
#[derive(Debug, Clone, Copy, Default, Serialize)]
struct StateError {
    x: ProfileState,
    y: ProfileState,
    theta: ProfileState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FullStateDriveController {
    pub fn new(telemetry: &Telemetry) -> Self {
        Self::with_gains(K_X, K_V, telemetry)
    }

    pub fn with_gains(k_x: f64, k_v: f64, telemetry: &Telemetry) -> Self {
        Self {
            k_x,
            k_v,
            last_error: None,
            telemetry: telemetry.child("full_state"),
        }
    }

    fn axis(&self, error: &ProfileState, reference_v: f64) -> f64 {
        reference_v + self.k_x * error.x + self.k_v * error.v
    }
}

impl HolonomicController for FullStateDriveController {
    fn calculate(
        &mut self,
        measurement: &SwerveState,
        reference: &SwerveState,
        _dt: f64,
    ) -> ChassisSpeeds {
        let error = StateError {
            x: ProfileState::new(
                reference.x.x - measurement.x.x,
                reference.x.v - measurement.x.v,
            ),
            y: ProfileState::new(
                reference.y.x - measurement.y.x,
                reference.y.v - measurement.y.v,
            ),
            theta: ProfileState::new(
                angle_modulus(reference.theta.x - measurement.theta.x),
                reference.theta.v - measurement.theta.v,
            ),
        };

        self.telemetry.log_serialize(Level::Debug, "error", || error);
        self.last_error = Some(error);

        ChassisSpeeds::new(
            self.axis(&error.x, reference.x.v),
            self.axis(&error.y, reference.y.v),
            self.axis(&error.theta, reference.theta.v),
        )
    }

    fn at_reference(&self) -> bool {
        match self.last_error {
            Some(e) => {
                e.x.x.abs() <= X_TOLERANCE_M
                    && e.y.x.abs() <= X_TOLERANCE_M
                    && e.theta.x.abs() <= THETA_TOLERANCE_RAD
                    && e.x.v.abs() <= V_TOLERANCE_MS
                    && e.y.v.abs() <= V_TOLERANCE_MS
                    && e.theta.v.abs() <= OMEGA_TOLERANCE_RADS
            }
            None => false,
        }
    }

    fn reset(&mut self) {
        self.last_error = None;
    }
}
