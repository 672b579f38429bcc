//! Angular position servo with gravity feed-forward

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::Serialize;

// Internal
use super::{ActuatorFault, OnboardAngularPositionServo, PositionServo, ServoError};
use crate::profile::{ProfileState, TrapezoidProfile};
use util::{
    maths::clamp,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GravityServoState {
    /// No output.
    Disabled,

    /// Holding the last goal.
    Holding,

    /// Moving towards a new goal.
    Profiling,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An arm or similar mechanism whose weight acts on a moment arm.
///
/// The gravity torque `k cos(angle + offset)` is fed forward to the velocity
/// servo underneath, clamped to the torque limit.
pub struct GravityServo {
    servo: OnboardAngularPositionServo,

    /// Torque at horizontal.
    ///
    /// Units: Nm
    gravity_nm: f64,

    /// Angle to add to the measurement to get the angle above horizontal.
    ///
    /// Units: radians
    offset_rad: f64,

    /// Units: Nm
    torque_limit_nm: f64,

    state: GravityServoState,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GravityServo {
    pub fn new(
        servo: OnboardAngularPositionServo,
        gravity_nm: f64,
        offset_rad: f64,
        telemetry: &Telemetry,
    ) -> Self {
        Self {
            servo,
            gravity_nm,
            offset_rad,
            torque_limit_nm: gravity_nm.abs(),
            state: GravityServoState::Disabled,
            telemetry: telemetry.clone(),
        }
    }

    /// Hold the current position.
    pub fn reset(&mut self) {
        self.servo.reset();
        self.state = GravityServoState::Holding;
        debug!("Gravity servo holding at {:?}", self.servo.position());
    }

    /// Move to `goal`, arriving at rest.
    pub fn set_position(&mut self, goal: f64) {
        self.set_state(ProfileState::at_rest(goal));
    }

    /// Move towards a goal with a nonzero velocity.
    pub fn set_state(&mut self, goal: ProfileState) {
        // The profile carries on from its last setpoint, which is stale when
        // the servo has been idle
        if self.state == GravityServoState::Disabled {
            self.servo.reset();
        }
        self.servo.set_goal(goal);
        self.state = GravityServoState::Profiling;
    }

    /// Remove all output.
    pub fn stop(&mut self) {
        self.servo.stop();
        self.state = GravityServoState::Disabled;
    }

    /// Update the sensor and command the mechanism. Call once per tick.
    pub fn periodic(&mut self, dt: f64) -> Result<(), ActuatorFault> {
        self.servo.periodic(dt);

        if self.state == GravityServoState::Disabled {
            return Ok(());
        }

        let torque = self.gravity_torque_nm();
        self.telemetry.log_f64(Level::Debug, "torque", || torque);
        self.telemetry.log_serialize(Level::Debug, "state", || self.state);

        let goal = self.servo.goal();
        self.servo.set_state(goal, torque, dt)?;

        if self.state == GravityServoState::Profiling && self.servo.at_goal() {
            self.state = GravityServoState::Holding;
        }

        Ok(())
    }

    /// The gravity feed-forward at the measured angle, zero without a
    /// measurement.
    pub fn gravity_torque_nm(&self) -> f64 {
        match self.servo.position() {
            Some(angle) => clamp(
                self.gravity_nm * (angle + self.offset_rad).cos(),
                -self.torque_limit_nm,
                self.torque_limit_nm,
            ),
            None => 0.0,
        }
    }

    pub fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.servo.set_encoder_position(position)
    }

    pub fn set_torque_limit(&mut self, limit_nm: f64) {
        self.torque_limit_nm = limit_nm.abs();
    }

    pub fn set_profile(&mut self, profile: TrapezoidProfile) {
        self.servo.set_profile(profile);
    }

    pub fn position(&self) -> Option<f64> {
        self.servo.position()
    }

    pub fn at_goal(&self) -> bool {
        self.servo.at_goal()
    }

    pub fn state(&self) -> GravityServoState {
        self.state
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::Tire;
    use crate::servo::{Mechanism, OutboardVelocityServo, SimulatedMotor};

    const DT: f64 = 0.02;

    fn arm(motor: &SimulatedMotor) -> GravityServo {
        let mech = Mechanism::new(Box::new(motor.actuator()), Box::new(motor.encoder()), 1.0);
        let velocity = OutboardVelocityServo::new(mech, &Telemetry::disabled());
        let angular = OnboardAngularPositionServo::new(
            Box::new(velocity),
            TrapezoidProfile::new(4.0, 8.0),
            &Telemetry::disabled(),
        );
        GravityServo::new(angular, 2.0, 0.0, &Telemetry::disabled())
    }

    #[test]
    fn test_transitions() {
        let motor = SimulatedMotor::new("arm", 50.0, Tire::NoSlip);
        let mut arm = arm(&motor);
        assert_eq!(arm.state(), GravityServoState::Disabled);

        arm.reset();
        assert_eq!(arm.state(), GravityServoState::Holding);

        arm.set_position(1.0);
        assert_eq!(arm.state(), GravityServoState::Profiling);

        for _ in 0..200 {
            arm.periodic(DT).unwrap();
        }
        assert_eq!(arm.state(), GravityServoState::Holding);
        assert!(arm.at_goal());
        assert!((arm.position().unwrap() - 1.0).abs() < 0.01);

        arm.stop();
        assert_eq!(arm.state(), GravityServoState::Disabled);
        assert_eq!(motor.commanded(), 0.0);

        // Disabled means no output at all
        arm.periodic(DT).unwrap();
        assert_eq!(motor.commanded(), 0.0);
    }

    #[test]
    fn test_torque() {
        let motor = SimulatedMotor::new("arm", 50.0, Tire::NoSlip);
        let mut arm = arm(&motor);

        assert!((arm.gravity_torque_nm() - 2.0).abs() < 1e-12);

        arm.set_encoder_position(std::f64::consts::FRAC_PI_3).unwrap();
        assert!((arm.gravity_torque_nm() - 1.0).abs() < 1e-9);

        arm.set_torque_limit(0.5);
        assert!((arm.gravity_torque_nm() - 0.5).abs() < 1e-12);

        motor.set_measurement_available(false);
        assert_eq!(arm.gravity_torque_nm(), 0.0);
    }

    #[test]
    fn test_fault_propagates() {
        let motor = SimulatedMotor::new("arm", 50.0, Tire::NoSlip);
        let mut arm = arm(&motor);
        arm.reset();
        arm.set_position(0.5);

        motor.set_fault(Some("brownout"));
        assert!(arm.periodic(DT).is_err());
    }
}
