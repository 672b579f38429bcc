//! PID plus feed-forward holonomic controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{HolonomicController, PidController, SwerveState};
use crate::kinematics::ChassisSpeeds;
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Proportional gain of the x and y controllers.
///
/// Units: (meters/second)/meter
pub const CARTESIAN_K_P: f64 = 2.4;

/// Proportional gain of the heading controller.
///
/// Units: (radians/second)/radian
pub const THETA_K_P: f64 = 3.0;

const CARTESIAN_TOLERANCE_M: f64 = 0.01;

const THETA_TOLERANCE_RAD: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Independent P controllers on x, y and heading, added to the reference
/// velocity.
#[derive(Debug, Clone)]
pub struct HolonomicDriveController {
    x_ctrl: PidController,
    y_ctrl: PidController,
    theta_ctrl: PidController,
    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HolonomicDriveController {
    pub fn new(
        x_ctrl: PidController,
        y_ctrl: PidController,
        theta_ctrl: PidController,
        telemetry: &Telemetry,
    ) -> Self {
        Self {
            x_ctrl,
            y_ctrl,
            theta_ctrl,
            telemetry: telemetry.child("holonomic"),
        }
    }

    /// A controller with the standard gains and tolerances.
    pub fn standard(telemetry: &Telemetry) -> Self {
        Self::new(cartesian(), cartesian(), theta(), telemetry)
    }
}

impl HolonomicController for HolonomicDriveController {
    fn calculate(
        &mut self,
        measurement: &SwerveState,
        reference: &SwerveState,
        dt: f64,
    ) -> ChassisSpeeds {
        let u_x = self.x_ctrl.calculate(measurement.x.x, reference.x.x, dt);
        let u_y = self.y_ctrl.calculate(measurement.y.x, reference.y.x, dt);
        let u_theta = self
            .theta_ctrl
            .calculate(measurement.theta.x, reference.theta.x, dt);

        self.telemetry
            .log_f64(Level::Debug, "x/error", || self.x_ctrl.error());
        self.telemetry
            .log_f64(Level::Debug, "y/error", || self.y_ctrl.error());
        self.telemetry
            .log_f64(Level::Debug, "theta/error", || self.theta_ctrl.error());

        ChassisSpeeds::new(
            reference.x.v + u_x,
            reference.y.v + u_y,
            reference.theta.v + u_theta,
        )
    }

    fn at_reference(&self) -> bool {
        self.x_ctrl.at_setpoint() && self.y_ctrl.at_setpoint() && self.theta_ctrl.at_setpoint()
    }

    fn reset(&mut self) {
        self.x_ctrl.reset();
        self.y_ctrl.reset();
        self.theta_ctrl.reset();
    }
}

/// Standard x or y controller.
pub fn cartesian() -> PidController {
    PidController::p(CARTESIAN_K_P).with_tolerance(CARTESIAN_TOLERANCE_M, f64::INFINITY)
}

/// Standard heading controller.
pub fn theta() -> PidController {
    PidController::p(THETA_K_P)
        .with_continuous_input()
        .with_tolerance(THETA_TOLERANCE_RAD, f64::INFINITY)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::ProfileState;
    use std::f64::consts::PI;

    #[test]
    fn test_feed_forward_only_on_reference() {
        let mut c = HolonomicDriveController::standard(&Telemetry::disabled());
        let state = SwerveState::new(
            ProfileState::new(1.0, 0.5),
            ProfileState::new(2.0, -0.5),
            ProfileState::new(0.3, 0.1),
        );

        let u = c.calculate(&state, &state, 0.02);
        assert!(u.is_near(&ChassisSpeeds::new(0.5, -0.5, 0.1), 1e-12));
        assert!(c.at_reference());
    }

    #[test]
    fn test_position_error() {
        let mut c = HolonomicDriveController::standard(&Telemetry::disabled());
        let measurement = SwerveState::new(
            ProfileState::at_rest(0.0),
            ProfileState::at_rest(0.0),
            ProfileState::at_rest(PI - 0.05),
        );
        let reference = SwerveState::new(
            ProfileState::at_rest(0.1),
            ProfileState::at_rest(-0.1),
            ProfileState::at_rest(-PI + 0.05),
        );

        let u = c.calculate(&measurement, &reference, 0.02);

        assert!((u.vx_ms - 0.24).abs() < 1e-9);
        assert!((u.vy_ms + 0.24).abs() < 1e-9);

        // Heading error wraps to +0.1
        assert!((u.omega_rads - 0.3).abs() < 1e-9);
        assert!(!c.at_reference());
    }
}
