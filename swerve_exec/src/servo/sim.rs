//! Simulated actuators and sensors
//!
//! A [`SimulatedMotor`] owns the simulated state of one motor. The actuator
//! and encoder handles it gives out share that state, so the encoder reports
//! what the actuator was told to do, filtered through the tire model.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::{cell::RefCell, rc::Rc};

// Internal
use super::{Actuator, ActuatorFault, Sensor, ServoError};
use crate::kinematics::Tire;
use util::maths::{clamp, lin_map};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MotorState {
    name: String,

    /// Units: motor units/second
    free_speed: f64,

    tire: Tire,

    commanded: f64,
    velocity: f64,
    position: f64,
    duty_cycle: f64,

    fault: Option<String>,
    measurement_available: bool,
}

/// Handle to a simulated motor, for building its actuator and encoder and
/// for inspecting or disturbing it in tests.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    state: Rc<RefCell<MotorState>>,
}

/// Velocity is reported back immediately, clamped to the free speed. Position
/// commands are accepted and ignored.
#[derive(Debug)]
pub struct SimulatedActuator {
    state: Rc<RefCell<MotorState>>,
}

/// Integrates the actuator's velocity each tick.
#[derive(Debug)]
pub struct SimulatedEncoder {
    state: Rc<RefCell<MotorState>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimulatedMotor {
    pub fn new(name: &str, free_speed: f64, tire: Tire) -> Self {
        Self {
            state: Rc::new(RefCell::new(MotorState {
                name: name.to_string(),
                free_speed,
                tire,
                commanded: 0.0,
                velocity: 0.0,
                position: 0.0,
                duty_cycle: 0.0,
                fault: None,
                measurement_available: true,
            })),
        }
    }

    pub fn actuator(&self) -> SimulatedActuator {
        SimulatedActuator {
            state: self.state.clone(),
        }
    }

    pub fn encoder(&self) -> SimulatedEncoder {
        SimulatedEncoder {
            state: self.state.clone(),
        }
    }

    /// The velocity last commanded, after clamping.
    pub fn commanded(&self) -> f64 {
        self.state.borrow().commanded
    }

    pub fn velocity(&self) -> f64 {
        self.state.borrow().velocity
    }

    pub fn position(&self) -> f64 {
        self.state.borrow().position
    }

    pub fn duty_cycle(&self) -> f64 {
        self.state.borrow().duty_cycle
    }

    /// Make every following command fail with the given reason, or clear the
    /// fault with `None`.
    pub fn set_fault(&self, reason: Option<&str>) {
        self.state.borrow_mut().fault = reason.map(|r| r.to_string());
    }

    /// Make the encoder report no measurement.
    pub fn set_measurement_available(&self, available: bool) {
        self.state.borrow_mut().measurement_available = available;
    }
}

impl MotorState {
    fn check_fault(&self) -> Result<(), ActuatorFault> {
        match &self.fault {
            Some(reason) => Err(ActuatorFault {
                name: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn command(&mut self, velocity: f64) {
        let velocity = if velocity.is_nan() { 0.0 } else { velocity };
        self.commanded = velocity.max(-self.free_speed).min(self.free_speed);
    }
}

impl Actuator for SimulatedActuator {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), ActuatorFault> {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        s.check_fault()?;

        let duty = if duty.is_nan() { 0.0 } else { clamp(duty, -1.0, 1.0) };
        s.duty_cycle = duty;
        let free_speed = s.free_speed;
        s.command(lin_map((-1.0, 1.0), (-free_speed, free_speed), duty));
        Ok(())
    }

    fn set_velocity(
        &mut self,
        velocity: f64,
        _accel_ff: f64,
        _torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault> {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        s.check_fault()?;
        s.command(velocity);
        s.duty_cycle = s.commanded / s.free_speed;
        Ok(())
    }

    fn set_position(
        &mut self,
        _position: f64,
        _velocity_ff: f64,
        _torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault> {
        self.state.borrow().check_fault()
    }

    fn stop(&mut self) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        s.commanded = 0.0;
        s.velocity = 0.0;
        s.duty_cycle = 0.0;
    }

    fn close(&mut self) {}
}

impl Sensor for SimulatedEncoder {
    fn position(&self) -> Option<f64> {
        let s = self.state.borrow();
        if s.measurement_available {
            Some(s.position)
        } else {
            None
        }
    }

    fn rate(&self) -> Option<f64> {
        let s = self.state.borrow();
        if s.measurement_available {
            Some(s.velocity)
        } else {
            None
        }
    }

    fn set_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.state.borrow_mut().position = position;
        Ok(())
    }

    /// Nothing is cached.
    fn reset(&mut self) {}

    fn periodic(&mut self, dt: f64) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        s.velocity = s.tire.apply(s.velocity, s.commanded, dt);
        s.position += s.velocity * dt;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_velocity_clamped_to_free_speed() {
        let motor = SimulatedMotor::new("m", 10.0, Tire::NoSlip);
        let mut act = motor.actuator();

        act.set_velocity(20.0, 0.0, 0.0).unwrap();
        assert_eq!(motor.commanded(), 10.0);

        act.set_duty_cycle(-0.5).unwrap();
        assert_eq!(motor.commanded(), -5.0);
    }

    #[test]
    fn test_encoder_integrates() {
        let motor = SimulatedMotor::new("m", 10.0, Tire::NoSlip);
        let mut act = motor.actuator();
        let mut enc = motor.encoder();

        act.set_velocity(2.0, 0.0, 0.0).unwrap();
        enc.periodic(0.1);
        enc.periodic(0.1);

        assert_eq!(enc.rate(), Some(2.0));
        assert!((enc.position().unwrap() - 0.4).abs() < 1e-12);

        motor.set_measurement_available(false);
        assert_eq!(enc.position(), None);
        assert_eq!(enc.rate(), None);
    }

    #[test]
    fn test_slip() {
        let motor = SimulatedMotor::new(
            "m",
            10.0,
            Tire::Slip {
                saturation_mss: 10.0,
            },
        );
        let mut act = motor.actuator();
        let mut enc = motor.encoder();

        act.set_velocity(5.0, 0.0, 0.0).unwrap();
        enc.periodic(0.02);
        assert!((enc.rate().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_fault() {
        let motor = SimulatedMotor::new("drive", 10.0, Tire::NoSlip);
        let mut act = motor.actuator();

        motor.set_fault(Some("overcurrent"));
        let err = act.set_velocity(1.0, 0.0, 0.0).unwrap_err();
        assert_eq!(err.name, "drive");
        assert_eq!(err.reason, "overcurrent");

        motor.set_fault(None);
        assert!(act.set_velocity(1.0, 0.0, 0.0).is_ok());
    }
}
