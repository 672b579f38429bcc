//! A single swerve module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::{
    kinematics::{ModulePosition, ModuleRate, ModuleState, SwerveKinodynamics, Tire},
    profile::ProfileState,
    servo::{
        ActuatorFault, LimitedVelocityServo, Mechanism, OnboardAngularPositionServo,
        OutboardVelocityServo, PositionServo, SimulatedMotor, VelocityServo,
    },
};
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive and steering control of one module.
///
/// The module exclusively owns both servos.
pub struct SwerveModule {
    name: String,

    drive: Box<dyn VelocityServo>,
    steering: Box<dyn PositionServo>,

    /// The state last sent to the servos
    desired: ModuleState,

    telemetry: Telemetry,
}

/// The simulated motors behind a simulated module, kept so that tests and
/// the simulator can inspect or disturb them.
#[derive(Debug, Clone)]
pub struct SimulatedModule {
    pub name: String,
    pub drive: SimulatedMotor,
    pub steering: SimulatedMotor,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveModule {
    pub fn new(
        name: &str,
        drive: Box<dyn VelocityServo>,
        steering: Box<dyn PositionServo>,
        telemetry: &Telemetry,
    ) -> Self {
        Self {
            name: name.to_string(),
            drive,
            steering,
            desired: ModuleState::default(),
            telemetry: telemetry.child(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command the module, reversing the wheel if that needs less steering
    /// than the measured angle. Returns the state actually commanded.
    pub fn set_desired_state(
        &mut self,
        state: &ModuleState,
        rate: &ModuleRate,
        dt: f64,
    ) -> Result<ModuleState, ActuatorFault> {
        let optimized = state.optimize(self.steering.position());

        let mut rate = *rate;
        if optimized.speed_ms * state.speed_ms < 0.0 {
            rate.accel_mss = -rate.accel_mss;
        }

        self.set_raw_desired_state(&optimized, &rate, dt)
    }

    /// Command the module exactly as given.
    ///
    /// An absent angle leaves the steering on its current goal. Returns the
    /// state actually commanded, with the speed the drive servo applied after
    /// its own limiting.
    pub fn set_raw_desired_state(
        &mut self,
        state: &ModuleState,
        rate: &ModuleRate,
        dt: f64,
    ) -> Result<ModuleState, ActuatorFault> {
        self.telemetry.log_f64(Level::Debug, "desired/speed", || state.speed_ms);
        if let Some(a) = state.angle_rad {
            self.telemetry.log_f64(Level::Debug, "desired/angle", || a);
        }

        let goal = match state.angle_rad {
            Some(a) => ProfileState::new(a, rate.steer_rate_rads),
            None => self.steering.goal(),
        };

        // Steering first so that a drive fault still leaves the wheel aimed
        self.steering.set_state(goal, 0.0, dt)?;
        self.drive.set_velocity(state.speed_ms, rate.accel_mss, 0.0, dt)?;

        self.desired = ModuleState::new(self.drive.setpoint(), state.angle_rad);
        Ok(self.desired)
    }

    /// The last state sent to the servos.
    pub fn desired(&self) -> ModuleState {
        self.desired
    }

    /// Measured state, `None` without a drive measurement.
    pub fn state(&self) -> Option<ModuleState> {
        let speed = self.drive.velocity()?;
        let state = ModuleState::new(speed, self.steering.position());

        self.telemetry.log_f64(Level::Debug, "measured/speed", || state.speed_ms);

        Some(state)
    }

    /// Measured position, `None` without a drive measurement.
    pub fn position(&self) -> Option<ModulePosition> {
        let distance = self.drive.position()?;
        Some(ModulePosition::new(distance, self.steering.position()))
    }

    /// The steering profile setpoint.
    pub fn steering_setpoint(&self) -> ProfileState {
        self.steering.setpoint()
    }

    pub fn at_setpoint(&self) -> bool {
        self.steering.at_setpoint()
    }

    pub fn at_goal(&self) -> bool {
        self.steering.at_goal()
    }

    /// Clear both servos and re-anchor them on their measurements.
    pub fn reset(&mut self) {
        self.drive.reset();
        self.steering.reset();
        self.desired = ModuleState::new(0.0, self.steering.position());
    }

    pub fn stop(&mut self) {
        self.drive.stop();
        self.steering.stop();
        self.desired = ModuleState::new(0.0, self.desired.angle_rad);
    }

    pub fn close(&mut self) {
        self.drive.close();
        self.steering.close();
    }

    /// Update the sensors. Call once per tick before commanding.
    pub fn periodic(&mut self, dt: f64) {
        self.drive.periodic(dt);
        self.steering.periodic(dt);
    }
}

impl SimulatedModule {
    /// Motors sized to the drive limits: the drive saturates at the max
    /// drive velocity and the steering at the max steering rate.
    pub fn new(name: &str, kinodynamics: &SwerveKinodynamics) -> Self {
        Self {
            name: name.to_string(),
            drive: SimulatedMotor::new(
                &format!("{}/drive", name),
                kinodynamics.max_drive_velocity_ms(),
                *kinodynamics.tire(),
            ),
            steering: SimulatedMotor::new(
                &format!("{}/steering", name),
                kinodynamics.max_steering_velocity_rads(),
                Tire::NoSlip,
            ),
        }
    }

    /// Four modules named in module order.
    pub fn all(kinodynamics: &SwerveKinodynamics) -> [SimulatedModule; 4] {
        [
            Self::new("front_left", kinodynamics),
            Self::new("front_right", kinodynamics),
            Self::new("rear_left", kinodynamics),
            Self::new("rear_right", kinodynamics),
        ]
    }

    /// Assemble a module controlling these motors.
    pub fn build(&self, kinodynamics: &SwerveKinodynamics, telemetry: &Telemetry) -> SwerveModule {
        let telemetry = telemetry.child(&self.name);

        let drive_mech = Mechanism::new(
            Box::new(self.drive.actuator()),
            Box::new(self.drive.encoder()),
            1.0,
        );
        let drive = LimitedVelocityServo::new(
            Box::new(OutboardVelocityServo::new(drive_mech, &telemetry.child("drive"))),
            kinodynamics.max_drive_velocity_ms(),
            kinodynamics.max_drive_acceleration_mss(),
            kinodynamics.max_drive_deceleration_mss(),
        );

        let steering_mech = Mechanism::new(
            Box::new(self.steering.actuator()),
            Box::new(self.steering.encoder()),
            1.0,
        );
        let steering_telemetry = telemetry.child("steering");
        let steering = OnboardAngularPositionServo::new(
            Box::new(OutboardVelocityServo::new(steering_mech, &steering_telemetry)),
            *kinodynamics.steering_profile(),
            &steering_telemetry,
        );

        let mut module = SwerveModule {
            name: self.name.clone(),
            drive: Box::new(drive),
            steering: Box::new(steering),
            desired: ModuleState::default(),
            telemetry,
        };
        module.reset();
        module
    }
}
