//! # Kinematics module
//!
//! Conversions between chassis motion and the motion of the four swerve
//! modules, along with the kinodynamic limits of the drivetrain.
//!
//! Modules are always ordered front-left, front-right, rear-left, rear-right.
//! The robot frame has X+ forwards, Y+ to the left and Z+ up, angles follow
//! the right hand rule about Z+.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod chassis;
mod frame_transform;
mod kinodynamics;
mod module_state;
pub mod presets;
mod second_order;
mod swerve_kinematics;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use chassis::*;
pub use frame_transform::*;
pub use kinodynamics::*;
pub use module_state::*;
pub use presets::Identity;
pub use second_order::*;
pub use swerve_kinematics::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of swerve modules on the robot.
pub const NUM_MODULES: usize = 4;

/// Module speeds below this are treated as zero, and the module's heading is
/// taken from memory instead of from its (undefined) velocity direction.
///
/// Units: meters/second
pub const SPEED_EPSILON_MS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which prevent a kinematics object from being constructed.
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("Kinodynamic limit {name} must be finite and positive, found {value}")]
    InvalidLimits { name: &'static str, value: f64 },

    #[error("Invalid module geometry: {0}")]
    InvalidGeometry(String),
}
