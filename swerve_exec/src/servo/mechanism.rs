//! A gearbox between an actuator, its sensor and the output

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{Actuator, ActuatorFault, Sensor, ServoError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An actuator and sensor driving an output through a fixed ratio.
///
/// Everything in and out of the mechanism is in output units, e.g. wheel
/// meters or shaft radians. The actuator and sensor work in motor units,
/// `ratio` motor units per output unit.
pub struct Mechanism {
    actuator: Box<dyn Actuator>,
    sensor: Box<dyn Sensor>,
    ratio: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Mechanism {
    pub fn new(actuator: Box<dyn Actuator>, sensor: Box<dyn Sensor>, ratio: f64) -> Self {
        Self {
            actuator,
            sensor,
            ratio,
        }
    }

    pub fn set_duty_cycle(&mut self, duty: f64) -> Result<(), ActuatorFault> {
        self.actuator.set_duty_cycle(duty)
    }

    pub fn set_velocity(
        &mut self,
        velocity: f64,
        accel: f64,
        torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault> {
        self.actuator.set_velocity(
            velocity * self.ratio,
            accel * self.ratio,
            torque_ff_nm / self.ratio,
        )
    }

    pub fn set_position(
        &mut self,
        position: f64,
        velocity: f64,
        torque_ff_nm: f64,
    ) -> Result<(), ActuatorFault> {
        self.actuator.set_position(
            position * self.ratio,
            velocity * self.ratio,
            torque_ff_nm / self.ratio,
        )
    }

    pub fn position(&self) -> Option<f64> {
        self.sensor.position().map(|p| p / self.ratio)
    }

    pub fn velocity(&self) -> Option<f64> {
        self.sensor.rate().map(|r| r / self.ratio)
    }

    pub fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.sensor.set_position(position * self.ratio)
    }

    pub fn reset(&mut self) {
        self.sensor.reset();
    }

    pub fn stop(&mut self) {
        self.actuator.stop();
    }

    pub fn close(&mut self) {
        self.actuator.close();
    }

    pub fn periodic(&mut self, dt: f64) {
        self.sensor.periodic(dt);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::Tire;
    use crate::servo::SimulatedMotor;

    #[test]
    fn test_ratio() {
        let motor = SimulatedMotor::new("test", 100.0, Tire::NoSlip);
        let mut mech = Mechanism::new(Box::new(motor.actuator()), Box::new(motor.encoder()), 10.0);

        mech.set_velocity(2.0, 0.0, 0.0).unwrap();
        assert_eq!(motor.commanded(), 20.0);

        mech.periodic(0.5);
        assert_eq!(mech.velocity(), Some(2.0));
        assert_eq!(mech.position(), Some(1.0));

        mech.set_encoder_position(3.0).unwrap();
        assert_eq!(motor.position(), 30.0);
    }
}
