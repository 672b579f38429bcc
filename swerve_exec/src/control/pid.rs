//! PID controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Treat the input as an angle, taking errors the short way round.
    continuous: bool,

    /// Position error within which the controller is at its setpoint
    position_tolerance: f64,

    /// Rate of change of error within which the controller is at its setpoint
    velocity_tolerance: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// Latest error and its rate of change
    error: f64,
    error_rate: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            continuous: false,
            position_tolerance: 0.05,
            velocity_tolerance: f64::INFINITY,
            prev_error: None,
            error: 0.0,
            error_rate: 0.0,
            integral: 0.0,
        }
    }

    /// A proportional-only controller.
    pub fn p(k_p: f64) -> Self {
        Self::new(k_p, 0.0, 0.0)
    }

    /// Wrap errors into (-pi, pi].
    pub fn with_continuous_input(mut self) -> Self {
        self.continuous = true;
        self
    }

    pub fn with_tolerance(mut self, position: f64, velocity: f64) -> Self {
        self.position_tolerance = position;
        self.velocity_tolerance = velocity;
        self
    }

    /// Get the value of the controller for the given measurement and
    /// setpoint, `dt` after the previous call.
    ///
    /// On the first call after creation or `reset` there is no previous
    /// error, so the derivative is zero.
    pub fn calculate(&mut self, measurement: f64, setpoint: f64, dt: f64) -> f64 {
        let error = if self.continuous {
            angle_modulus(setpoint - measurement)
        } else {
            setpoint - measurement
        };

        // No time has passed, so neither integrate nor differentiate
        if dt > 0.0 {
            self.integral += error * dt;
            self.error_rate = match self.prev_error {
                Some(e) => (error - e) / dt,
                None => 0.0,
            };
        }

        self.prev_error = Some(error);
        self.error = error;

        self.k_p * error + self.k_i * self.integral + self.k_d * self.error_rate
    }

    /// True if the last error was within tolerance.
    pub fn at_setpoint(&self) -> bool {
        self.prev_error.is_some()
            && self.error.abs() <= self.position_tolerance
            && self.error_rate.abs() <= self.velocity_tolerance
    }

    /// The last error.
    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Clear the integrator and error history.
    pub fn reset(&mut self) {
        self.prev_error = None;
        self.error = 0.0;
        self.error_rate = 0.0;
        self.integral = 0.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_proportional() {
        let mut pid = PidController::p(2.0);
        assert_eq!(pid.calculate(1.0, 3.0, 0.02), 4.0);
        assert_eq!(pid.error(), 2.0);
        assert!(!pid.at_setpoint());
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = PidController::new(0.0, 1.0, 1.0);

        // First call has no derivative
        assert!((pid.calculate(0.0, 1.0, 0.5) - 0.5).abs() < 1e-12);

        // Integral 0.5 + 0.25, derivative (0.5 - 1.0) / 0.5
        assert!((pid.calculate(0.5, 1.0, 0.5) - (0.75 - 1.0)).abs() < 1e-12);

        pid.reset();
        assert!((pid.calculate(0.0, 1.0, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_continuous_takes_short_way() {
        let mut pid = PidController::p(1.0).with_continuous_input();
        let u = pid.calculate(PI - 0.1, -PI + 0.1, 0.02);
        assert!((u - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_tolerance() {
        let mut pid = PidController::p(1.0).with_tolerance(0.05, 0.05);

        pid.calculate(0.0, 0.01, 0.02);
        assert!(pid.at_setpoint());

        // Error moving too fast
        pid.calculate(0.0, 0.04, 0.02);
        assert!(!pid.at_setpoint());
    }
}
