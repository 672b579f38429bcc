//! Rotate in place to a heading

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{Behaviour, BehaviourError, Subsystem};
use crate::{
    context::RobotContext,
    control::{cartesian, HolonomicController, HolonomicDriveController, PidController, SwerveState},
    drive::DriveDemand,
    profile::{ProfileState, TrapezoidProfile},
};
use util::{
    maths::angle_modulus,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: radians
const X_TOLERANCE_RAD: f64 = 0.02;

/// Units: radians/second
const V_TOLERANCE_RADS: f64 = 0.02;

/// Fraction of the drive's spin limits used by the profile.
const SPEED_FACTOR: f64 = 0.5;

/// Units: (radians/second)/radian
const THETA_K_P: f64 = 3.5;

/// Units: meters
const CARTESIAN_TOLERANCE_M: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Turn to `goal_rad` while holding position.
///
/// The wheels are first steered to the spin angles with the robot at rest,
/// with the heading reference held at the start. Once they are aligned the
/// reference follows a trapezoid profile to the goal.
pub struct Rotate {
    goal: ProfileState,

    controller: HolonomicDriveController,

    profile: Option<TrapezoidProfile>,

    reference: ProfileState,

    aligned: bool,

    /// The profile has reached the goal.
    reached: bool,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Rotate {
    pub fn new(goal_rad: f64, telemetry: &Telemetry) -> Self {
        let telemetry = telemetry.child("rotate");

        let controller = HolonomicDriveController::new(
            cartesian().with_tolerance(CARTESIAN_TOLERANCE_M, CARTESIAN_TOLERANCE_M),
            cartesian().with_tolerance(CARTESIAN_TOLERANCE_M, CARTESIAN_TOLERANCE_M),
            PidController::p(THETA_K_P)
                .with_continuous_input()
                .with_tolerance(X_TOLERANCE_RAD, V_TOLERANCE_RADS),
            &telemetry,
        );

        Self {
            goal: ProfileState::at_rest(angle_modulus(goal_rad)),
            controller,
            profile: None,
            reference: ProfileState::default(),
            aligned: false,
            reached: false,
            telemetry,
        }
    }

    /// Put the reference on the measured heading and spin rate.
    fn reset_reference(&mut self, ctx: &RobotContext) {
        self.reference = ProfileState::new(ctx.pose().heading_rad, ctx.velocity().omega_rads);
    }
}

impl Behaviour for Rotate {
    fn name(&self) -> &str {
        "rotate"
    }

    fn requirements(&self) -> &[Subsystem] {
        &[Subsystem::Drive]
    }

    fn initialise(&mut self, ctx: &mut RobotContext) {
        ctx.drive.reset();
        self.controller.reset();
        self.reset_reference(ctx);

        let kd = ctx.drive.kinodynamics();
        self.profile = Some(TrapezoidProfile::new(
            kd.max_angle_speed_rads() * SPEED_FACTOR,
            kd.max_angle_accel_radss() * SPEED_FACTOR,
        ));

        self.aligned = false;
        self.reached = false;
    }

    fn execute(&mut self, ctx: &mut RobotContext, dt: f64) -> Result<(), BehaviourError> {
        if let Some(profile) = &self.profile {
            self.reference = profile.calculate_continuous(dt, self.reference, self.goal);
        }
        self.reached = self.reference.is_near(&self.goal, X_TOLERANCE_RAD, V_TOLERANCE_RADS);

        // Stationary at the current position
        let pose = ctx.pose();
        let reference = SwerveState::new(
            ProfileState::at_rest(pose.x_m()),
            ProfileState::at_rest(pose.y_m()),
            self.reference,
        );

        let target = self.controller.calculate(&ctx.state(), &reference, dt);

        if self.aligned {
            ctx.drive(DriveDemand::FieldRelative(target), dt)?;
        } else {
            let status = ctx.drive(DriveDemand::SteerAtRest(target), dt)?;

            // Hold the profile at the start while the wheels turn
            self.reset_reference(ctx);
            self.aligned = status.aligned;
        }

        let heading = pose.heading_rad;
        let reference = self.reference;
        self.telemetry
            .log_f64(Level::Trace, "error_x", || angle_modulus(reference.x - heading));
        self.telemetry
            .log_serialize(Level::Trace, "reference", || reference);

        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.reached && self.controller.at_reference()
    }

    fn end(&mut self, ctx: &mut RobotContext, _interrupted: bool) {
        ctx.drive.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::behaviour::Scheduler;
    use crate::context::{test::sim_context, RobotMode};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_in_place() {
        let mut ctx = sim_context();
        ctx.mode = RobotMode::Autonomous;
        let telemetry = Telemetry::disabled();
        let mut scheduler = Scheduler::new(&telemetry);

        scheduler.schedule(&mut ctx, Box::new(Rotate::new(FRAC_PI_2, &telemetry)));

        let mut ticks = 0;
        while scheduler.is_running("rotate") && ticks < 500 {
            scheduler.run(&mut ctx, 0.02);
            ctx.end_tick(0.02).unwrap();
            ticks += 1;
        }

        assert!(!scheduler.is_running("rotate"));
        assert!((ctx.pose().heading_rad - FRAC_PI_2).abs() < 0.05);
        assert!(ctx.pose().position_m.norm() < 0.1);
    }
}
