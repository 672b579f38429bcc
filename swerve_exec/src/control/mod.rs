//! # Holonomic controllers
//!
//! Controllers which compare the measured state of the robot against a
//! reference and produce the field-relative velocity to drive at.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod full_state;
mod holonomic;
mod pid;
mod swerve_state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use full_state::*;
pub use holonomic::*;
pub use pid::*;
pub use swerve_state::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::kinematics::ChassisSpeeds;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A controller producing field-relative chassis speeds.
pub trait HolonomicController {
    /// Field-relative speeds which drive `measurement` towards `reference`
    /// over the next `dt`.
    fn calculate(
        &mut self,
        measurement: &SwerveState,
        reference: &SwerveState,
        dt: f64,
    ) -> ChassisSpeeds;

    /// True if the last measurement was within tolerance of its reference.
    fn at_reference(&self) -> bool;

    /// Clear any controller history.
    fn reset(&mut self);
}
