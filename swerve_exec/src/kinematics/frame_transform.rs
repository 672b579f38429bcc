//! Conversion of chassis speeds between the field and robot frames

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::ChassisSpeeds;
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Delay between measuring the yaw and the modules acting on a command.
///
/// While yawing the robot turns by `yaw_rate * VEERING_CORRECTION_S` before a
/// command takes effect, so the translation veers towards the direction of
/// rotation unless the yaw used for the conversion is advanced by the same
/// amount.
///
/// Units: seconds
pub const VEERING_CORRECTION_S: f64 = 0.15;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Rotates chassis speeds between the field and robot frames.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FrameTransform {
    pub veering_correction_enabled: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameTransform {
    pub fn new(veering_correction_enabled: bool) -> Self {
        Self {
            veering_correction_enabled,
        }
    }

    /// The yaw to use for frame conversion given the measured yaw and yaw
    /// rate.
    pub fn corrected_yaw(&self, yaw_rad: f64, yaw_rate_rads: f64) -> f64 {
        if self.veering_correction_enabled {
            angle_modulus(yaw_rad + yaw_rate_rads * VEERING_CORRECTION_S)
        } else {
            yaw_rad
        }
    }

    /// Field-relative speeds expressed in the robot frame.
    pub fn to_robot(&self, field: &ChassisSpeeds, yaw_rad: f64, yaw_rate_rads: f64) -> ChassisSpeeds {
        field.rotated(-self.corrected_yaw(yaw_rad, yaw_rate_rads))
    }

    /// Robot-relative speeds expressed in the field frame, inverting
    /// [`FrameTransform::to_robot`] for the same yaw and yaw rate.
    pub fn to_field(&self, robot: &ChassisSpeeds, yaw_rad: f64, yaw_rate_rads: f64) -> ChassisSpeeds {
        robot.rotated(self.corrected_yaw(yaw_rad, yaw_rate_rads))
    }
}
