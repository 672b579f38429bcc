//! Parameters structure for the swerve drive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::kinematics::Identity;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the swerve drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Which robot's kinodynamic limits to use.
    pub identity: Identity,

    /// Pass requests through the setpoint generator.
    pub setpoint_generator_enabled: bool,

    /// Feed drive acceleration and steering rate forward to the modules when
    /// the setpoint generator is disabled.
    pub second_order_kinematics_enabled: bool,

    /// Advance the yaw used for field-relative conversion by the expected
    /// rotation during actuation lag.
    pub veering_correction_enabled: bool,

    /// Where desaturation happens relative to the setpoint generator.
    #[serde(default)]
    pub desaturation_order: DesaturationOrder,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesaturationOrder {
    /// Desaturate the request, then generate from it.
    BeforeGenerator,

    /// Generate, then desaturate the setpoint just before sending it.
    AfterGenerator,
}

impl Default for DesaturationOrder {
    fn default() -> Self {
        DesaturationOrder::AfterGenerator
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            identity: Identity::Default,
            setpoint_generator_enabled: true,
            second_order_kinematics_enabled: false,
            veering_correction_enabled: false,
            desaturation_order: DesaturationOrder::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load() {
        let p: Params = util::params::from_str(
            "identity = \"comp_bot\"\n\
             setpoint_generator_enabled = false\n\
             second_order_kinematics_enabled = true\n\
             veering_correction_enabled = true\n",
        )
        .unwrap();

        assert_eq!(p.identity, Identity::CompBot);
        assert!(!p.setpoint_generator_enabled);
        assert_eq!(p.desaturation_order, DesaturationOrder::AfterGenerator);
    }
}
