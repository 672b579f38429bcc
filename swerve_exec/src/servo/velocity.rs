//! Velocity servos

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::{ActuatorFault, Mechanism, ServoError, VelocityServo};
use crate::control::PidController;
use util::{maths::clamp, telemetry::{Level, Telemetry}};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity control done by the actuator's own controller.
pub struct OutboardVelocityServo {
    mechanism: Mechanism,
    setpoint: f64,
    telemetry: Telemetry,
}

/// Feed-forward gains of an onboard velocity loop, all in duty cycle per unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityFeedForward {
    /// Static friction, applied in the direction of motion
    pub k_s: f64,

    /// Duty per unit/s
    pub k_v: f64,

    /// Duty per unit/s^2
    pub k_a: f64,

    /// Duty per Nm of output torque
    pub k_t: f64,
}

/// Velocity control computed here and sent as a duty cycle.
pub struct OnboardVelocityServo {
    mechanism: Mechanism,
    pid: PidController,
    ff: VelocityFeedForward,
    setpoint: f64,
    last_duty: f64,
    telemetry: Telemetry,
}

/// Limits a velocity command to a maximum speed and to asymmetric
/// acceleration and deceleration before passing it on.
pub struct LimitedVelocityServo {
    inner: Box<dyn VelocityServo>,
    max_velocity: f64,
    max_accel: f64,
    max_decel: f64,
    prev: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OutboardVelocityServo {
    pub fn new(mechanism: Mechanism, telemetry: &Telemetry) -> Self {
        Self {
            mechanism,
            setpoint: 0.0,
            telemetry: telemetry.clone(),
        }
    }
}

impl VelocityServo for OutboardVelocityServo {
    fn set_velocity(
        &mut self,
        velocity: f64,
        accel: f64,
        torque_ff_nm: f64,
        _dt: f64,
    ) -> Result<(), ActuatorFault> {
        self.setpoint = velocity;
        self.telemetry.log_f64(Level::Debug, "setpoint", || velocity);
        self.mechanism.set_velocity(velocity, accel, torque_ff_nm)
    }

    fn velocity(&self) -> Option<f64> {
        self.mechanism.velocity()
    }

    fn position(&self) -> Option<f64> {
        self.mechanism.position()
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.mechanism.set_encoder_position(position)
    }

    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn stop(&mut self) {
        self.setpoint = 0.0;
        self.mechanism.stop();
    }

    fn reset(&mut self) {
        self.mechanism.reset();
        self.setpoint = self.mechanism.velocity().unwrap_or(0.0);
    }

    fn close(&mut self) {
        self.mechanism.close();
    }

    fn periodic(&mut self, dt: f64) {
        self.mechanism.periodic(dt);
        if let Some(v) = self.mechanism.velocity() {
            self.telemetry.log_f64(Level::Debug, "measurement", || v);
        }
    }
}

impl VelocityFeedForward {
    /// Pure velocity feed-forward, e.g. `1/free_speed`.
    pub fn kv(k_v: f64) -> Self {
        Self {
            k_s: 0.0,
            k_v,
            k_a: 0.0,
            k_t: 0.0,
        }
    }

    pub fn calculate(&self, velocity: f64, accel: f64, torque_nm: f64) -> f64 {
        let friction = if velocity == 0.0 {
            0.0
        } else {
            self.k_s * velocity.signum()
        };

        friction
            + self.k_v * velocity
            + self.k_a * accel
            + self.k_t * torque_nm
    }
}

impl OnboardVelocityServo {
    pub fn new(
        mechanism: Mechanism,
        pid: PidController,
        ff: VelocityFeedForward,
        telemetry: &Telemetry,
    ) -> Self {
        Self {
            mechanism,
            pid,
            ff,
            setpoint: 0.0,
            last_duty: 0.0,
            telemetry: telemetry.clone(),
        }
    }
}

impl VelocityServo for OnboardVelocityServo {
    fn set_velocity(
        &mut self,
        velocity: f64,
        accel: f64,
        torque_ff_nm: f64,
        dt: f64,
    ) -> Result<(), ActuatorFault> {
        self.setpoint = velocity;

        // Without a measurement the last output is held
        let measurement = match self.mechanism.velocity() {
            Some(m) => m,
            None => {
                trace!("No velocity measurement, holding duty {}", self.last_duty);
                return self.mechanism.set_duty_cycle(self.last_duty);
            }
        };

        let fb = self.pid.calculate(measurement, velocity, dt);
        let ff = self.ff.calculate(velocity, accel, torque_ff_nm);
        let duty = clamp(ff + fb, -1.0, 1.0);

        self.telemetry.log_f64(Level::Debug, "setpoint", || velocity);
        self.telemetry.log_f64(Level::Debug, "measurement", || measurement);
        self.telemetry.log_f64(Level::Trace, "error", || self.pid.error());
        self.telemetry.log_f64(Level::Trace, "duty", || duty);

        self.last_duty = duty;
        self.mechanism.set_duty_cycle(duty)
    }

    fn velocity(&self) -> Option<f64> {
        self.mechanism.velocity()
    }

    fn position(&self) -> Option<f64> {
        self.mechanism.position()
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.mechanism.set_encoder_position(position)
    }

    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn stop(&mut self) {
        self.setpoint = 0.0;
        self.last_duty = 0.0;
        self.mechanism.stop();
    }

    fn reset(&mut self) {
        self.pid.reset();
        self.mechanism.reset();
        self.setpoint = self.mechanism.velocity().unwrap_or(0.0);
    }

    fn close(&mut self) {
        self.mechanism.close();
    }

    fn periodic(&mut self, dt: f64) {
        self.mechanism.periodic(dt);
    }
}

impl LimitedVelocityServo {
    pub fn new(
        inner: Box<dyn VelocityServo>,
        max_velocity: f64,
        max_accel: f64,
        max_decel: f64,
    ) -> Self {
        Self {
            inner,
            max_velocity,
            max_accel,
            max_decel,
            prev: 0.0,
        }
    }

    fn limit(&self, velocity: f64, dt: f64) -> f64 {
        let v = clamp(velocity, -self.max_velocity, self.max_velocity);

        // Speeding up uses the acceleration limit, slowing down or reversing
        // through zero the deceleration limit.
        let speeding_up = v * self.prev >= 0.0 && v.abs() > self.prev.abs();
        let max_change = if speeding_up {
            self.max_accel * dt
        } else {
            self.max_decel * dt
        };

        self.prev + clamp(v - self.prev, -max_change, max_change)
    }
}

impl VelocityServo for LimitedVelocityServo {
    fn set_velocity(
        &mut self,
        velocity: f64,
        accel: f64,
        torque_ff_nm: f64,
        dt: f64,
    ) -> Result<(), ActuatorFault> {
        let limited = self.limit(velocity, dt);
        let accel = if dt > 0.0 {
            (limited - self.prev) / dt
        } else {
            accel
        };
        self.prev = limited;
        self.inner.set_velocity(limited, accel, torque_ff_nm, dt)
    }

    fn velocity(&self) -> Option<f64> {
        self.inner.velocity()
    }

    fn position(&self) -> Option<f64> {
        self.inner.position()
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<(), ServoError> {
        self.inner.set_encoder_position(position)
    }

    fn setpoint(&self) -> f64 {
        self.prev
    }

    fn stop(&mut self) {
        self.prev = 0.0;
        self.inner.stop();
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.prev = self.inner.velocity().unwrap_or(0.0);
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn periodic(&mut self, dt: f64) {
        self.inner.periodic(dt);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::Tire;
    use crate::servo::SimulatedMotor;

    fn mechanism(motor: &SimulatedMotor) -> Mechanism {
        Mechanism::new(Box::new(motor.actuator()), Box::new(motor.encoder()), 1.0)
    }

    #[test]
    fn test_outboard_forwards() {
        let motor = SimulatedMotor::new("drive", 5.0, Tire::NoSlip);
        let mut servo = OutboardVelocityServo::new(mechanism(&motor), &Telemetry::disabled());

        servo.set_velocity(2.0, 0.0, 0.0, 0.02).unwrap();
        servo.periodic(0.02);

        assert_eq!(motor.commanded(), 2.0);
        assert_eq!(servo.velocity(), Some(2.0));
        assert_eq!(servo.setpoint(), 2.0);
    }

    #[test]
    fn test_onboard_feed_forward() {
        let motor = SimulatedMotor::new("drive", 5.0, Tire::NoSlip);
        let mut servo = OnboardVelocityServo::new(
            mechanism(&motor),
            PidController::p(0.0),
            VelocityFeedForward::kv(1.0 / 5.0),
            &Telemetry::disabled(),
        );

        servo.set_velocity(2.5, 0.0, 0.0, 0.02).unwrap();
        assert!((motor.duty_cycle() - 0.5).abs() < 1e-12);
        assert!((motor.commanded() - 2.5).abs() < 1e-12);

        // Saturates at full duty
        servo.set_velocity(50.0, 0.0, 0.0, 0.02).unwrap();
        assert_eq!(motor.duty_cycle(), 1.0);
    }

    #[test]
    fn test_onboard_holds_without_measurement() {
        let motor = SimulatedMotor::new("drive", 5.0, Tire::NoSlip);
        let mut servo = OnboardVelocityServo::new(
            mechanism(&motor),
            PidController::p(0.1),
            VelocityFeedForward::kv(1.0 / 5.0),
            &Telemetry::disabled(),
        );

        servo.set_velocity(1.0, 0.0, 0.0, 0.02).unwrap();
        let held = motor.duty_cycle();

        motor.set_measurement_available(false);
        servo.set_velocity(4.0, 0.0, 0.0, 0.02).unwrap();
        assert_eq!(motor.duty_cycle(), held);
        assert_eq!(servo.velocity(), None);
    }

    #[test]
    fn test_onboard_reset_anchors() {
        let motor = SimulatedMotor::new("drive", 5.0, Tire::NoSlip);
        let mut servo = OnboardVelocityServo::new(
            mechanism(&motor),
            PidController::p(0.0),
            VelocityFeedForward::kv(1.0 / 5.0),
            &Telemetry::disabled(),
        );

        servo.set_velocity(3.0, 0.0, 0.0, 0.02).unwrap();
        servo.periodic(0.02);
        servo.reset();
        assert!((servo.setpoint() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_limited() {
        let motor = SimulatedMotor::new("drive", 10.0, Tire::NoSlip);
        let inner = OutboardVelocityServo::new(mechanism(&motor), &Telemetry::disabled());
        let mut servo = LimitedVelocityServo::new(Box::new(inner), 4.0, 10.0, 50.0);

        servo.set_velocity(8.0, 0.0, 0.0, 0.02).unwrap();
        assert!((motor.commanded() - 0.2).abs() < 1e-12);

        for _ in 0..100 {
            servo.set_velocity(8.0, 0.0, 0.0, 0.02).unwrap();
        }
        assert!((motor.commanded() - 4.0).abs() < 1e-12);

        // Braking is faster than accelerating
        servo.set_velocity(0.0, 0.0, 0.0, 0.02).unwrap();
        assert!((motor.commanded() - 3.0).abs() < 1e-12);
    }
}
