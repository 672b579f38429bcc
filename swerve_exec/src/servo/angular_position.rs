//! Profiled angular position servo

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{ActuatorFault, PositionServo, ServoError, VelocityServo};
use crate::{
    control::PidController,
    profile::{ProfileState, TrapezoidProfile},
};
use util::{
    maths::{angle_modulus, clamp},
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Proportional gain on position error.
///
/// Units: (rad/s)/rad
pub const ANGULAR_K_P: f64 = 20.0;

/// Units: radians
pub const POSITION_TOLERANCE_RAD: f64 = 0.05;

/// Units: radians/second
pub const VELOCITY_TOLERANCE_RADS: f64 = 0.05;

/// Tolerance for the profile having reached its goal.
const PROFILE_DONE_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Angular position control running a continuous trapezoid profile and
/// tracking it with a velocity servo.
///
/// Positions wrap at (-pi, pi] and the profile always takes the short way
/// round. Feedback is computed against the previous profile setpoint, which is
/// where the mechanism was told to be when it was last measured.
pub struct OnboardAngularPositionServo {
    servo: Box<dyn VelocityServo>,
    profile: TrapezoidProfile,
    pid: PidController,

    /// Units: radians/second
    max_velocity: f64,

    goal: ProfileState,
    setpoint: ProfileState,

    /// Whether the last command had a measurement to work with
    measured: bool,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OnboardAngularPositionServo {
    pub fn new(
        servo: Box<dyn VelocityServo>,
        profile: TrapezoidProfile,
        telemetry: &Telemetry,
    ) -> Self {
        let pid = PidController::p(ANGULAR_K_P)
            .with_continuous_input()
            .with_tolerance(POSITION_TOLERANCE_RAD, VELOCITY_TOLERANCE_RADS);

        Self {
            servo,
            max_velocity: profile.max_velocity(),
            profile,
            pid,
            goal: ProfileState::default(),
            setpoint: ProfileState::default(),
            measured: false,
            telemetry: telemetry.clone(),
        }
    }

    /// Replace the motion profile, e.g. to move more gently.
    pub fn set_profile(&mut self, profile: TrapezoidProfile) {
        self.max_velocity = profile.max_velocity();
        self.profile = profile;
    }

    /// Change the goal without commanding the mechanism.
    pub fn set_goal(&mut self, goal: ProfileState) {
        self.goal = ProfileState::new(angle_modulus(goal.x), goal.v);
    }

    fn profile_done(&self) -> bool {
        angle_modulus(self.setpoint.x - self.goal.x).abs() < PROFILE_DONE_TOLERANCE
            && (self.setpoint.v - self.goal.v).abs() < PROFILE_DONE_TOLERANCE
    }
}

impl PositionServo for OnboardAngularPositionServo {
    fn reset(&mut self) {
        self.pid.reset();
        self.servo.reset();

        let position = self.position();
        self.measured = position.is_some();
        self.setpoint = ProfileState::at_rest(position.unwrap_or(0.0));
        self.goal = self.setpoint;
    }

    fn set_state(
        &mut self,
        goal: ProfileState,
        torque_ff_nm: f64,
        dt: f64,
    ) -> Result<(), ActuatorFault> {
        self.set_goal(goal);

        let measurement = match self.position() {
            Some(m) => m,
            None => {
                trace!("No angle measurement, stopping");
                self.measured = false;
                self.servo.stop();
                return Ok(());
            }
        };
        self.measured = true;

        let fb = self.pid.calculate(measurement, self.setpoint.x, dt);

        self.setpoint = self.profile.calculate_continuous(dt, self.setpoint, self.goal);

        let u = clamp(self.setpoint.v + fb, -self.max_velocity, self.max_velocity);

        self.telemetry.log_f64(Level::Debug, "goal", || self.goal.x);
        self.telemetry.log_f64(Level::Debug, "measurement", || measurement);
        self.telemetry.log_f64(Level::Trace, "setpoint/x", || self.setpoint.x);
        self.telemetry.log_f64(Level::Trace, "setpoint/v", || self.setpoint.v);
        self.telemetry.log_f64(Level::Trace, "setpoint/a", || self.setpoint.a);
        self.telemetry.log_f64(Level::Trace, "error", || self.pid.error());
        self.telemetry.log_f64(Level::Trace, "u", || u);

        self.servo.set_velocity(u, self.setpoint.a, torque_ff_nm, dt)
    }

    fn position(&self) -> Option<f64> {
        self.servo.position().map(angle_modulus)
    }

    fn velocity(&self) -> Option<f64> {
        self.servo.velocity()
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.servo.set_encoder_position(position)
    }

    fn at_setpoint(&self) -> bool {
        self.measured && self.pid.at_setpoint()
    }

    fn at_goal(&self) -> bool {
        self.at_setpoint() && self.profile_done()
    }

    fn goal(&self) -> ProfileState {
        self.goal
    }

    fn setpoint(&self) -> ProfileState {
        self.setpoint
    }

    fn stop(&mut self) {
        self.servo.stop();
    }

    fn close(&mut self) {
        self.servo.close();
    }

    fn periodic(&mut self, dt: f64) {
        self.servo.periodic(dt);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::Tire;
    use crate::servo::{Mechanism, OutboardVelocityServo, SimulatedMotor};

    const DT: f64 = 0.02;

    fn servo(motor: &SimulatedMotor) -> OnboardAngularPositionServo {
        let mech = Mechanism::new(Box::new(motor.actuator()), Box::new(motor.encoder()), 1.0);
        let velocity = OutboardVelocityServo::new(mech, &Telemetry::disabled());
        OnboardAngularPositionServo::new(
            Box::new(velocity),
            TrapezoidProfile::new(10.0, 50.0),
            &Telemetry::disabled(),
        )
    }

    fn run(servo: &mut OnboardAngularPositionServo, goal: f64, ticks: usize) {
        for _ in 0..ticks {
            servo.set_position(goal, 0.0, DT).unwrap();
            servo.periodic(DT);
        }
    }

    #[test]
    fn test_reaches_goal() {
        let motor = SimulatedMotor::new("steer", 100.0, Tire::NoSlip);
        let mut servo = servo(&motor);
        servo.reset();

        servo.set_position(1.0, 0.0, DT).unwrap();
        servo.periodic(DT);
        assert!(!servo.at_goal());

        run(&mut servo, 1.0, 200);
        assert!(servo.at_goal());
        assert!((servo.position().unwrap() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_short_way_round() {
        let motor = SimulatedMotor::new("steer", 100.0, Tire::NoSlip);
        let mut servo = servo(&motor);
        servo.set_encoder_position(-3.0).unwrap();
        servo.reset();

        run(&mut servo, 3.0, 200);

        assert!(angle_modulus(servo.position().unwrap() - 3.0).abs() < 0.01);
        // Went down through -pi rather than up through zero
        assert!(motor.position() < -3.0);
    }

    #[test]
    fn test_reset_anchors_on_measurement() {
        let motor = SimulatedMotor::new("steer", 100.0, Tire::NoSlip);
        let mut servo = servo(&motor);
        servo.set_encoder_position(0.5).unwrap();
        servo.reset();

        assert!(servo.setpoint().is_near(&ProfileState::at_rest(0.5), 1e-12, 1e-12));
        assert_eq!(servo.goal(), servo.setpoint());
    }

    #[test]
    fn test_no_measurement() {
        let motor = SimulatedMotor::new("steer", 100.0, Tire::NoSlip);
        let mut servo = servo(&motor);
        servo.reset();
        run(&mut servo, 1.0, 200);
        assert!(servo.at_goal());

        motor.set_measurement_available(false);
        servo.set_position(-1.0, 0.0, DT).unwrap();

        assert!(!servo.at_goal());
        assert_eq!(motor.commanded(), 0.0);
    }
}
