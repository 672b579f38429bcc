//! # Swerve drive module
//!
//! The drivetrain from the modules up:
//!
//! - [`SwerveModule`]: a drive velocity servo and a steering position servo.
//! - [`SwerveLocal`]: the four modules, fed robot-relative chassis speeds
//!   through the setpoint generator.
//! - [`SwerveDrive`]: the cyclic module owning [`SwerveLocal`], converting
//!   field-relative demands and keeping odometry.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod module;
mod params;
mod state;
mod swerve_local;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use module::*;
pub use params::*;
pub use state::*;
pub use swerve_local::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{kinematics::{ChassisSpeeds, KinematicsError}, servo::ActuatorFault};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A demand made of the drive for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DriveDemand {
    /// Drive at a field-relative velocity.
    FieldRelative(ChassisSpeeds),

    /// Drive at robot-relative chassis speeds.
    RobotRelative(ChassisSpeeds),

    /// Turn the wheels towards the angles needed for a field-relative
    /// velocity without moving.
    SteerAtRest(ChassisSpeeds),

    /// Wheels in an "X" to resist being pushed.
    Defense,

    /// All wheels straight ahead.
    Steer0,

    /// All wheels to the left.
    Steer90,

    /// Stop, wheels at their last angle.
    Stop,
}

impl Default for DriveDemand {
    fn default() -> Self {
        DriveDemand::Stop
    }
}

/// Possible errors that can occur during drive operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Could not build the drive kinematics: {0}")]
    Kinematics(#[from] KinematicsError),

    #[error(transparent)]
    ActuatorFault(#[from] ActuatorFault),
}
