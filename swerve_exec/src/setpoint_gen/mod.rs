//! # Setpoint generator
//!
//! Takes the previous feasible setpoint and a requested chassis speed and
//! returns the largest step towards the request that the modules can make in
//! one tick.
//!
//! Module velocities are linear in chassis speed, so every candidate setpoint
//! lies on the line `prev + s * (desired - prev)` in both chassis and module
//! velocity space. Each limiter finds the largest `s` it allows, the smallest
//! of these is applied and the module states are recomputed from the
//! resulting chassis speed.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod limiters;
mod solver;
mod steering_override;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use limiters::*;
pub use steering_override::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

// Internal
use crate::kinematics::{
    should_flip, ChassisSpeeds, ModuleState, SwerveDriveKinematics, SwerveKinodynamics,
    NUM_MODULES,
};
use util::{
    maths::angle_modulus,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Requests closer than this to the previous setpoint are treated as equal.
const SAME_REQUEST_EPSILON: f64 = 1e-9;

/// Chassis speeds closer than this to zero are treated as stopped.
const ZERO_SPEED_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A feasible robot-relative chassis speed and the module states that
/// produce it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwerveSetpoint {
    pub speeds: ChassisSpeeds,
    pub states: [ModuleState; NUM_MODULES],
}

/// Cartesian module velocities and their headings.
///
/// The heading is the direction of travel, which for a reversed wheel is
/// opposite to the module angle. It is `None` for a stopped module.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModuleVelocities {
    pub vx_ms: [f64; NUM_MODULES],
    pub vy_ms: [f64; NUM_MODULES],
    pub heading_rad: [Option<f64>; NUM_MODULES],
}

/// Generates the sequence of feasible setpoints.
///
/// Holds the last committed setpoint, which each call to
/// [`SetpointGenerator::generate`] moves on from.
#[derive(Debug, Clone)]
pub struct SetpointGenerator {
    limits: Arc<SwerveKinodynamics>,

    prev: SwerveSetpoint,
    last_scalar: f64,

    steering_override: SteeringOverride,
    steering_rate_limiter: SteeringRateLimiter,
    drive_accel_limiter: DriveAccelLimiter,
    centripetal_limiter: CentripetalLimiter,
    capsize_limiter: CapsizeAccelLimiter,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SwerveSetpoint {
    fn default() -> Self {
        Self {
            speeds: ChassisSpeeds::zero(),
            states: [ModuleState::at_rest(0.0); NUM_MODULES],
        }
    }
}

impl SwerveSetpoint {
    pub fn new(speeds: ChassisSpeeds, states: [ModuleState; NUM_MODULES]) -> Self {
        Self { speeds, states }
    }

    /// The module angles, used as heading memory for stopped modules.
    pub fn angles(&self) -> [Option<f64>; NUM_MODULES] {
        let mut angles = [None; NUM_MODULES];
        for (a, s) in angles.iter_mut().zip(self.states.iter()) {
            *a = s.angle_rad;
        }
        angles
    }
}

impl ModuleVelocities {
    pub fn from_states(states: &[ModuleState; NUM_MODULES]) -> Self {
        let mut v = Self {
            vx_ms: [0.0; NUM_MODULES],
            vy_ms: [0.0; NUM_MODULES],
            heading_rad: [None; NUM_MODULES],
        };

        for (i, s) in states.iter().enumerate() {
            let vel = s.velocity();
            v.vx_ms[i] = vel.x;
            v.vy_ms[i] = vel.y;

            if vel.norm() > crate::kinematics::SPEED_EPSILON_MS {
                v.heading_rad[i] = Some(vel.y.atan2(vel.x));
            }
        }

        v
    }
}

impl SetpointGenerator {
    pub fn new(limits: Arc<SwerveKinodynamics>, telemetry: &Telemetry) -> Self {
        let telemetry = telemetry.child("setpoint_generator");

        Self {
            steering_override: SteeringOverride::new(limits.clone(), &telemetry),
            steering_rate_limiter: SteeringRateLimiter::new(limits.clone(), &telemetry),
            drive_accel_limiter: DriveAccelLimiter::new(limits.clone(), &telemetry),
            centripetal_limiter: CentripetalLimiter::new(limits.clone(), &telemetry),
            capsize_limiter: CapsizeAccelLimiter::new(limits.clone(), &telemetry),
            limits,
            prev: SwerveSetpoint::default(),
            last_scalar: 1.0,
            telemetry,
        }
    }

    /// The last committed setpoint.
    pub fn prev(&self) -> &SwerveSetpoint {
        &self.prev
    }

    /// The scale factor applied by the last call to `generate`.
    pub fn last_scalar(&self) -> f64 {
        self.last_scalar
    }

    /// Replace the committed setpoint, for instance with the one actually
    /// sent to the modules after further processing.
    pub fn commit(&mut self, setpoint: SwerveSetpoint) {
        self.prev = setpoint;
    }

    /// Forget the motion history, starting again from `setpoint`.
    pub fn reset(&mut self, setpoint: SwerveSetpoint) {
        self.prev = setpoint;
        self.last_scalar = 1.0;
    }

    /// Step from the committed setpoint towards `desired` (robot-relative)
    /// and commit the result.
    pub fn generate(&mut self, desired: &ChassisSpeeds, dt: f64) -> SwerveSetpoint {
        let (setpoint, s) = self.calculate(&self.prev, desired, dt);

        self.prev = setpoint;
        self.last_scalar = s;

        self.telemetry.log_f64(Level::Trace, "s", || s);
        self.telemetry
            .log_serialize(Level::Trace, "setpoint", || setpoint.speeds);

        setpoint
    }

    /// The next feasible setpoint after `prev` towards `desired`, along with
    /// the scale factor applied. Does not change the committed setpoint.
    pub fn calculate(
        &self,
        prev: &SwerveSetpoint,
        desired: &ChassisSpeeds,
        dt: f64,
    ) -> (SwerveSetpoint, f64) {
        let kinematics = self.limits.kinematics();
        let headings = prev.angles();

        // Clamp the request to what the wheels can do at all
        let mut desired_states = kinematics.to_module_states(desired, &headings);
        SwerveDriveKinematics::desaturate_wheel_speeds(
            &mut desired_states,
            self.limits.max_drive_velocity_ms(),
        );
        let desired = kinematics.to_chassis_speeds(&desired_states);

        if prev.speeds.is_near(&desired, SAME_REQUEST_EPSILON) {
            return (*prev, 1.0);
        }

        let prev_v = ModuleVelocities::from_states(&prev.states);
        let desired_v = ModuleVelocities::from_states(&desired_states);

        // Reversing every wheel is quicker by stopping first
        if !prev.speeds.is_zero(ZERO_SPEED_EPSILON)
            && !desired.is_zero(ZERO_SPEED_EPSILON)
            && all_modules_reverse(&prev_v, &desired_v)
        {
            return self.calculate(prev, &ChassisSpeeds::zero(), dt);
        }

        let (override_s, overrides) =
            self.steering_override
                .override_if_stopped(&desired_states, &prev.states, dt);

        let s = override_s
            .min(
                self.centripetal_limiter
                    .enforce_centripetal_limit(&prev.speeds, &desired, dt),
            )
            .min(
                self.steering_rate_limiter
                    .enforce_steering_limit(&prev_v, &desired_v, &overrides, dt),
            )
            .min(
                self.drive_accel_limiter
                    .enforce_wheel_accel_limit(&prev_v, &desired_v, dt),
            )
            .min(
                self.capsize_limiter
                    .enforce_capsize_limit(&prev_v, &desired_v, dt),
            )
            .max(0.0)
            .min(1.0);

        if s == 0.0 {
            debug!(
                "Setpoint request {:?} infeasible this tick, holding speed while steering",
                desired
            );
        }

        let speeds = prev.speeds + (desired - prev.speeds) * s;
        let mut states = kinematics.to_module_states(&speeds, &headings);

        for i in 0..NUM_MODULES {
            if let Some(angle) = overrides[i] {
                if let Some(current) = states[i].angle_rad {
                    if should_flip(angle - current) {
                        states[i].speed_ms = -states[i].speed_ms;
                    }
                }
                states[i].angle_rad = Some(angle);
            }

            // Never ask a module to turn further than reversing its wheel
            if let (Some(angle), Some(prev_angle)) = (states[i].angle_rad, prev.states[i].angle_rad)
            {
                if should_flip(angle - prev_angle) {
                    states[i] = ModuleState::new(-states[i].speed_ms, Some(angle + PI));
                }
            }

            if let Some(angle) = states[i].angle_rad {
                states[i].angle_rad = Some(angle_modulus(angle));
            }
        }

        (SwerveSetpoint::new(speeds, states), s)
    }
}

/// True if every module is moving at both ends and must reverse direction.
fn all_modules_reverse(prev: &ModuleVelocities, desired: &ModuleVelocities) -> bool {
    (0..NUM_MODULES).all(|i| match (prev.heading_rad[i], desired.heading_rad[i]) {
        (Some(p), Some(d)) => should_flip(d - p),
        _ => false,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::{presets, KinodynamicLimits};
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 0.02;

    fn generator(limits: KinodynamicLimits) -> SetpointGenerator {
        SetpointGenerator::new(
            Arc::new(SwerveKinodynamics::new(limits).unwrap()),
            &Telemetry::disabled(),
        )
    }

    #[test]
    fn test_straight_line_from_rest() {
        let mut g = generator(presets::high_capsize());

        let setpoint = g.generate(&ChassisSpeeds::new(5.0, 0.0, 0.0), DT);

        assert!((setpoint.speeds.vx_ms - 0.2).abs() < 1e-6, "{:?}", setpoint);
        assert!(setpoint.speeds.vy_ms.abs() < 1e-9);
        assert!(setpoint.speeds.omega_rads.abs() < 1e-9);
        for s in setpoint.states.iter() {
            assert!(s.angle_rad.unwrap().abs() < 1e-9);
            assert!((s.speed_ms - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_same_request_returns_previous() {
        let g = generator(presets::for_test());
        let prev = SwerveSetpoint::new(
            ChassisSpeeds::new(0.5, 0.0, 0.0),
            [ModuleState::new(0.5, Some(0.0)); NUM_MODULES],
        );

        let (setpoint, s) = g.calculate(&prev, &ChassisSpeeds::new(0.5, 0.0, 0.0), DT);
        assert_eq!(setpoint, prev);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_steering_override_from_rest() {
        let mut g = generator(KinodynamicLimits {
            max_steering_velocity_rads: 10.0,
            ..presets::high_capsize()
        });
        let desired = ChassisSpeeds::new(0.0, 1.0, 0.0);

        for tick in 1..=7 {
            let setpoint = g.generate(&desired, DT);

            assert_eq!(g.last_scalar(), 0.0, "tick {}", tick);
            assert!(setpoint.speeds.is_zero(1e-12));
            for s in setpoint.states.iter() {
                assert_eq!(s.speed_ms, 0.0);
                assert!((s.angle_rad.unwrap() - 0.2 * tick as f64).abs() < 1e-9);
            }
        }

        let setpoint = g.generate(&desired, DT);
        assert!(g.last_scalar() > 0.0);
        assert!(setpoint.speeds.vy_ms > 0.0);
        for s in setpoint.states.iter() {
            assert!((s.angle_rad.unwrap() - FRAC_PI_2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_crab_right() {
        let mut g = generator(presets::for_test());
        let desired = ChassisSpeeds::new(0.0, -1.0, 0.0);

        let mut setpoint = SwerveSetpoint::default();
        for _ in 0..300 {
            setpoint = g.generate(&desired, DT);
        }

        assert!(setpoint.speeds.is_near(&desired, 1e-6), "{:?}", setpoint);
        for s in setpoint.states.iter() {
            // Every wheel drives towards -y, whichever way round it is
            let v = s.velocity();
            assert!((v.y.atan2(v.x) + FRAC_PI_2).abs() < 1e-6, "{:?}", s);
            assert!((s.speed_ms - setpoint.states[0].speed_ms).abs() < 1e-9);
            assert!((s.speed_ms.abs() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reversal_stops_first() {
        let g = generator(presets::high_capsize());
        let prev = SwerveSetpoint::new(
            ChassisSpeeds::new(1.0, 0.0, 0.0),
            [ModuleState::new(1.0, Some(0.0)); NUM_MODULES],
        );

        let (setpoint, _) = g.calculate(&prev, &ChassisSpeeds::new(-1.0, 0.0, 0.0), DT);

        // Slows along +x towards zero instead of swinging the wheels round
        assert!(setpoint.speeds.vx_ms < 1.0);
        assert!(setpoint.speeds.vx_ms > 0.0);
        assert!(setpoint.speeds.vy_ms.abs() < 1e-9);
        for s in setpoint.states.iter() {
            assert!(s.angle_rad.unwrap().abs() < 1e-9);
        }
    }

    #[test]
    fn test_request_is_desaturated() {
        let g = generator(presets::for_test());
        let prev = SwerveSetpoint::new(
            ChassisSpeeds::new(1.0, 0.0, 0.0),
            [ModuleState::new(1.0, Some(0.0)); NUM_MODULES],
        );

        // Already at the max wheel speed, asking for more changes nothing
        let (setpoint, s) = g.calculate(&prev, &ChassisSpeeds::new(3.0, 0.0, 0.0), DT);
        assert!(setpoint.speeds.is_near(&prev.speeds, 1e-9));
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let g = generator(presets::limiting());

        let prevs = [
            ChassisSpeeds::new(0.0, 0.0, 0.0),
            ChassisSpeeds::new(1.0, 0.5, 0.0),
            ChassisSpeeds::new(-0.5, 1.0, 0.5),
        ];
        let requests = [
            ChassisSpeeds::new(2.0, 0.0, 0.0),
            ChassisSpeeds::new(1.5, 1.0, 1.0),
            ChassisSpeeds::new(0.0, 2.0, -1.0),
            ChassisSpeeds::new(-0.3, 1.2, 0.6),
        ];

        let kinodynamics = SwerveKinodynamics::new(presets::limiting()).unwrap();
        for p in prevs.iter() {
            let states = kinodynamics
                .kinematics()
                .to_module_states(p, &[Some(0.0); NUM_MODULES]);
            let prev = SwerveSetpoint::new(*p, states);

            for r in requests.iter() {
                let (setpoint, s) = g.calculate(&prev, r, DT);

                assert!((0.0..=1.0).contains(&s));
                let achieved = (setpoint.speeds - prev.speeds).norm();
                let requested = (*r - prev.speeds).norm();
                assert!(achieved <= requested + 1e-9, "{:?} -> {:?}", p, r);

                // Every module stays within one tick of drive accel or decel
                for (a, b) in setpoint.states.iter().zip(prev.states.iter()) {
                    let dv = (a.velocity() - b.velocity()).norm();
                    assert!(dv <= 10.0 * DT + 1e-6 || s == 0.0, "{} {:?}", dv, r);
                }
            }
        }
    }
}
