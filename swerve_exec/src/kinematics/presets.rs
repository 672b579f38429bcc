//! Kinodynamic presets
//!
//! Each robot identity has a fixed set of limits. The remaining presets are
//! chosen to make particular limits bind in tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{KinodynamicLimits, Tire};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which physical robot the software is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    CompBot,
    SwerveOne,
    SwerveTwo,
    BetaBot,
    Blank,
    Default,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Identity {
    pub fn limits(&self) -> KinodynamicLimits {
        match self {
            Identity::CompBot => comp_bot(),
            Identity::SwerveOne => swerve_one(),
            Identity::SwerveTwo => swerve_two(),
            Identity::BetaBot => beta_bot(),
            Identity::Blank => blank(),
            Identity::Default => default(),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// A square robot with default geometry, tire and steering acceleration.
fn square(
    vmax: f64,
    stall: f64,
    accel: f64,
    decel: f64,
    steer_rate: f64,
    vcg: f64,
) -> KinodynamicLimits {
    KinodynamicLimits {
        max_drive_velocity_ms: vmax,
        stall_acceleration_mss: stall,
        max_drive_acceleration_mss: accel,
        max_drive_deceleration_mss: decel,
        max_steering_velocity_rads: steer_rate,
        max_steering_acceleration_radss: 20.0 * PI,
        front_track_m: 0.5,
        back_track_m: 0.5,
        wheelbase_m: 0.5,
        front_offset_m: 0.25,
        vcg_m: vcg,
        tire: Tire::NoSlip,
    }
}

pub fn comp_bot() -> KinodynamicLimits {
    KinodynamicLimits {
        max_drive_velocity_ms: 5.0,
        stall_acceleration_mss: 10.0,
        max_drive_acceleration_mss: 10.0,
        max_drive_deceleration_mss: 20.0,
        max_steering_velocity_rads: 20.0,
        max_steering_acceleration_radss: 60.0,
        front_track_m: 0.48,
        back_track_m: 0.43,
        wheelbase_m: 0.46,
        front_offset_m: 0.31,
        vcg_m: 0.1,
        tire: Tire::NoSlip,
    }
}

pub fn swerve_two() -> KinodynamicLimits {
    KinodynamicLimits {
        front_track_m: 0.380,
        back_track_m: 0.380,
        wheelbase_m: 0.445,
        front_offset_m: 0.2225,
        ..square(4.0, 10.0, 2.0, 2.0, 13.0, 0.3)
    }
}

pub fn swerve_one() -> KinodynamicLimits {
    KinodynamicLimits {
        front_track_m: 0.449,
        back_track_m: 0.449,
        wheelbase_m: 0.464,
        front_offset_m: 0.232,
        ..square(4.0, 10.0, 2.0, 2.0, 13.0, 0.3)
    }
}

pub fn blank() -> KinodynamicLimits {
    square(4.0, 10.0, 4.0, 4.0, 13.0, 0.3)
}

pub fn beta_bot() -> KinodynamicLimits {
    KinodynamicLimits {
        max_drive_velocity_ms: 5.0,
        stall_acceleration_mss: 20.0,
        max_drive_acceleration_mss: 20.0,
        max_drive_deceleration_mss: 50.0,
        max_steering_velocity_rads: 20.0,
        max_steering_acceleration_radss: 60.0,
        front_track_m: 0.491,
        back_track_m: 0.44,
        wheelbase_m: 0.491,
        front_offset_m: 0.29,
        vcg_m: 0.1,
        tire: Tire::NoSlip,
    }
}

pub fn default() -> KinodynamicLimits {
    square(5.0, 20.0, 5.0, 5.0, 13.0, 0.3)
}

/// Slow and gentle, steering is effectively unlimited.
pub fn for_test() -> KinodynamicLimits {
    square(1.0, 10.0, 1.0, 1.0, 20.0 * PI, 0.3)
}

pub fn for_test_with_slip() -> KinodynamicLimits {
    KinodynamicLimits {
        tire: Tire::Slip {
            saturation_mss: 10.0,
        },
        ..for_test()
    }
}

/// Slow steering.
pub fn for_test_2() -> KinodynamicLimits {
    square(2.0, 5.0, 1.0, 1.0, 1.0, 0.6)
}

pub fn high_decel_and_capsize() -> KinodynamicLimits {
    square(5.0, 10.0, 2.0, 300.0, 5.0, 0.001)
}

pub fn decel_case() -> KinodynamicLimits {
    square(1.0, 10.0, 1.0, 10.0, 5.0, 0.3)
}

pub fn high_capsize() -> KinodynamicLimits {
    square(5.0, 20.0, 10.0, 10.0, 5.0, 0.1)
}

pub fn low_capsize() -> KinodynamicLimits {
    square(5.0, 20.0, 10.0, 10.0, 5.0, 2.0)
}

pub fn limiting() -> KinodynamicLimits {
    square(5.0, 30.0, 10.0, 10.0, 5.0, 0.3)
}

pub fn low_accel_high_decel() -> KinodynamicLimits {
    square(4.0, 10.0, 1.0, 10.0, 5.0, 0.3)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::SwerveKinodynamics;

    #[test]
    fn test_all_presets_valid() {
        let presets = [
            comp_bot(),
            swerve_one(),
            swerve_two(),
            blank(),
            beta_bot(),
            default(),
            for_test(),
            for_test_with_slip(),
            for_test_2(),
            high_decel_and_capsize(),
            decel_case(),
            high_capsize(),
            low_capsize(),
            limiting(),
            low_accel_high_decel(),
        ];

        for p in presets.iter() {
            assert!(SwerveKinodynamics::new(*p).is_ok(), "{:?}", p);
        }
    }

    #[test]
    fn test_identity_from_toml() {
        #[derive(Deserialize)]
        struct P {
            identity: Identity,
        }

        let p: P = util::params::from_str("identity = \"comp_bot\"").unwrap();
        assert_eq!(p.identity, Identity::CompBot);
        assert_eq!(p.identity.limits(), comp_bot());
    }
}
