//! Parameters of the swerve executable

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::drive;
use util::telemetry::Level;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything in `swerve_exec.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwerveExecParams {
    /// Period of the control loop.
    ///
    /// Units: seconds
    #[serde(default = "default_tick_period_s")]
    pub tick_period_s: f64,

    /// Most verbose telemetry level emitted.
    #[serde(default = "default_telemetry_level")]
    pub telemetry_level: Level,

    /// Drive options, at the top level of the file.
    #[serde(flatten)]
    pub drive: drive::Params,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_tick_period_s() -> f64 {
    0.02
}

fn default_telemetry_level() -> Level {
    Level::Comp
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{drive::DesaturationOrder, kinematics::Identity};

    #[test]
    fn test_defaults() {
        let p: SwerveExecParams = util::params::from_str(
            "identity = \"swerve_two\"\n\
             setpoint_generator_enabled = true\n\
             second_order_kinematics_enabled = false\n\
             veering_correction_enabled = false\n\
             desaturation_order = \"before_generator\"\n",
        )
        .unwrap();

        assert_eq!(p.tick_period_s, 0.02);
        assert_eq!(p.telemetry_level, Level::Comp);
        assert_eq!(p.drive.identity, Identity::SwerveTwo);
        assert_eq!(p.drive.desaturation_order, DesaturationOrder::BeforeGenerator);
    }

    #[test]
    fn test_shipped_file() {
        let p: SwerveExecParams =
            util::params::load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/../params/swerve_exec.toml"))
                .unwrap();

        assert!(p.tick_period_s > 0.0);
    }
}
