//! # Servos
//!
//! Actuators and sensors are reached only through the [`Actuator`] and
//! [`Sensor`] traits. A [`Mechanism`] pairs one of each with a gear ratio, and
//! the servos close loops around mechanisms:
//!
//! - [`OutboardVelocityServo`]: forwards velocity commands to the actuator's
//!   own controller.
//! - [`OnboardVelocityServo`]: PID plus feed-forward producing a duty cycle.
//! - [`LimitedVelocityServo`]: clamps the velocity and its rate of change
//!   before passing it on.
//! - [`OnboardAngularPositionServo`]: a continuous trapezoid profile tracked
//!   by a velocity servo.
//! - [`GravityServo`]: an angular position servo with gravity feed-forward.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod angular_position;
mod gravity;
mod mechanism;
mod sim;
mod velocity;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use angular_position::*;
pub use gravity::*;
pub use mechanism::*;
pub use sim::*;
pub use velocity::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::profile::ProfileState;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motor, in whatever units its mechanism works in.
pub trait Actuator {
    /// Open loop output in [-1, 1].
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), ActuatorFault>;

    /// Velocity control on the actuator, with acceleration and torque
    /// feed-forwards.
    fn set_velocity(
        &mut self,
        velocity: f64,
        accel_ff: f64,
        torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault>;

    /// Position control on the actuator, with velocity and torque
    /// feed-forwards.
    fn set_position(
        &mut self,
        position: f64,
        velocity_ff: f64,
        torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault>;

    fn stop(&mut self);

    fn close(&mut self);
}

/// A position and rate sensor.
///
/// `None` means there is no measurement this tick. Callers must not
/// substitute a value of their own.
pub trait Sensor {
    fn position(&self) -> Option<f64>;

    fn rate(&self) -> Option<f64>;

    /// Not every sensor can be set, absolute encoders in particular.
    fn set_position(&mut self, position: f64) -> Result<(), ServoError>;

    fn reset(&mut self);

    /// Called once per tick after the actuators have been commanded.
    fn periodic(&mut self, _dt: f64) {}
}

/// Closed loop velocity control of a mechanism.
pub trait VelocityServo {
    fn set_velocity(
        &mut self,
        velocity: f64,
        accel: f64,
        torque_ff_nm: f64,
        dt: f64,
    ) -> Result<(), ActuatorFault>;

    fn velocity(&self) -> Option<f64>;

    fn position(&self) -> Option<f64>;

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError>;

    /// The last commanded velocity.
    fn setpoint(&self) -> f64;

    fn stop(&mut self);

    /// Clear controller state and re-anchor the setpoint on the measurement.
    fn reset(&mut self);

    fn close(&mut self);

    fn periodic(&mut self, dt: f64);
}

/// Profiled position control of a mechanism.
pub trait PositionServo {
    /// Clear controller state and re-anchor the profile on the measurement.
    /// Must be called after a period of disuse.
    fn reset(&mut self);

    /// Move towards `goal`, arriving at rest.
    fn set_position(&mut self, goal: f64, torque_ff_nm: f64, dt: f64) -> Result<(), ActuatorFault> {
        self.set_state(ProfileState::at_rest(goal), torque_ff_nm, dt)
    }

    /// Move towards `goal`, which may have a nonzero velocity.
    fn set_state(
        &mut self,
        goal: ProfileState,
        torque_ff_nm: f64,
        dt: f64,
    ) -> Result<(), ActuatorFault>;

    fn position(&self) -> Option<f64>;

    fn velocity(&self) -> Option<f64>;

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError>;

    /// True if the measurement is within tolerance of the profile setpoint.
    fn at_setpoint(&self) -> bool;

    /// True if the profile is complete and the measurement is at it.
    fn at_goal(&self) -> bool;

    fn goal(&self) -> ProfileState;

    fn setpoint(&self) -> ProfileState;

    fn stop(&mut self);

    fn close(&mut self);

    fn periodic(&mut self, dt: f64);
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A hard failure reported by an actuator's driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Actuator {name} faulted: {reason}")]
pub struct ActuatorFault {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServoError {
    #[error(transparent)]
    ActuatorFault(#[from] ActuatorFault),

    #[error("Operation not supported by {0}")]
    Unsupported(String),
}
