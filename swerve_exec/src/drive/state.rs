//! Implementations for the SwerveDrive state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

// Internal
use super::{DriveDemand, DriveError, Params, SimulatedModule, SwerveLocal, SwerveModule};
use crate::{
    geom::Pose2,
    kinematics::{
        module_position_delta, ChassisSpeeds, FrameTransform, ModuleDelta, ModulePosition,
        SwerveKinodynamics, NUM_MODULES,
    },
    setpoint_gen::SwerveSetpoint,
};
use util::{
    module::State,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The swerve drive subsystem.
pub struct SwerveDrive {
    params: Params,

    local: SwerveLocal,

    frame: FrameTransform,

    /// Field-relative pose from odometry
    pose: Pose2,

    /// Field-relative velocity from odometry
    velocity: ChassisSpeeds,

    prev_positions: [Option<ModulePosition>; NUM_MODULES],

    telemetry: Telemetry,
}

/// Where the drive's modules come from.
pub enum Hardware {
    /// Build simulated modules sized to the kinodynamic limits.
    Simulated,

    /// Use these modules.
    Modules([SwerveModule; NUM_MODULES]),
}

pub struct InitData {
    pub params: Params,
    pub hardware: Hardware,
    pub telemetry: Telemetry,
}

/// Input data to the drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    pub demand: DriveDemand,

    /// Units: seconds
    pub dt: f64,
}

/// Output of the drive for one tick.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    /// Field-relative pose from odometry.
    pub pose: Pose2,

    /// Field-relative velocity from odometry.
    pub velocity: ChassisSpeeds,

    /// The robot-relative setpoint sent to the modules.
    pub setpoint: SwerveSetpoint,
}

/// Status report for drive processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Every module's steering is at its goal.
    pub aligned: bool,

    /// The setpoint generator's scale factor, 0 when the request was
    /// infeasible this tick.
    pub scalar: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for SwerveDrive {
    type InitData = InitData;
    type InitError = DriveError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveError;

    /// Initialise the drive.
    ///
    /// The kinodynamic limits are selected by the identity in the
    /// parameters, invalid limits are rejected here.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let InitData {
            params,
            hardware,
            telemetry,
        } = init_data;
        let telemetry = telemetry.child("drive");

        let kinodynamics = Arc::new(SwerveKinodynamics::new(params.identity.limits())?);

        let modules = match hardware {
            Hardware::Modules(m) => m,
            Hardware::Simulated => {
                let sims = SimulatedModule::all(&kinodynamics);
                [
                    sims[0].build(&kinodynamics, &telemetry),
                    sims[1].build(&kinodynamics, &telemetry),
                    sims[2].build(&kinodynamics, &telemetry),
                    sims[3].build(&kinodynamics, &telemetry),
                ]
            }
        };

        let mut local = SwerveLocal::new(kinodynamics, modules, &params, &telemetry);
        local.reset();
        let prev_positions = local.positions();

        info!("Swerve drive initialised as {:?}", params.identity);

        Ok(Self {
            frame: FrameTransform::new(params.veering_correction_enabled),
            params,
            local,
            pose: Pose2::default(),
            velocity: ChassisSpeeds::zero(),
            prev_positions,
            telemetry,
        })
    }

    /// Perform cyclic processing of the drive.
    ///
    /// Reads the module sensors, updates odometry, then commands the modules.
    /// On an actuator fault every module is stopped before the error is
    /// returned.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let dt = input_data.dt;

        self.local.periodic(dt);
        self.update_odometry(dt);

        let yaw = self.pose.heading_rad;
        let yaw_rate = self.velocity.omega_rads;

        let mut report = StatusReport {
            aligned: false,
            scalar: 1.0,
        };

        let result = match input_data.demand {
            DriveDemand::FieldRelative(v) => {
                let robot = self.frame.to_robot(&v, yaw, yaw_rate);
                self.local
                    .set_chassis_speeds(&robot, yaw_rate, dt)
                    .map(|s| report.scalar = s)
            }
            DriveDemand::RobotRelative(speeds) => self
                .local
                .set_chassis_speeds(&speeds, yaw_rate, dt)
                .map(|s| report.scalar = s),
            DriveDemand::SteerAtRest(v) => {
                let robot = self.frame.to_robot(&v, yaw, yaw_rate);
                self.local.steer_at_rest(&robot, dt).map(|_| ())
            }
            DriveDemand::Defense => self.local.defense(dt),
            DriveDemand::Steer0 => self.local.steer0(dt),
            DriveDemand::Steer90 => self.local.steer90(dt),
            DriveDemand::Stop => {
                self.local.stop();
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Stopping drive after fault: {}", e);
            self.local.stop();
            return Err(e);
        }

        report.aligned = self.local.at_goal().iter().all(|g| *g);

        self.telemetry.log_serialize(Level::Comp, "pose", || self.pose);
        self.telemetry.log_f64(Level::Debug, "s", || report.scalar);

        Ok((
            OutputData {
                pose: self.pose,
                velocity: self.velocity,
                setpoint: *self.local.setpoint(),
            },
            report,
        ))
    }
}

impl SwerveDrive {
    /// Integrate the module deltas since the last tick into the pose.
    fn update_odometry(&mut self, dt: f64) {
        let positions = self.local.positions();

        let mut deltas = [ModuleDelta::default(); NUM_MODULES];
        for i in 0..NUM_MODULES {
            if let (Some(start), Some(end)) = (&self.prev_positions[i], &positions[i]) {
                deltas[i] = module_position_delta(start, end);
            }
        }
        self.prev_positions = positions;

        let twist = self.local.kinodynamics().kinematics().to_twist(&deltas);
        let heading = self.pose.heading_rad;
        self.pose = self.pose.exp(&twist);

        if dt > 0.0 {
            let robot = ChassisSpeeds::new(twist.dx_m / dt, twist.dy_m / dt, twist.dtheta_rad / dt);
            self.velocity = robot.rotated(heading);
        }
    }

    /// Move the odometry to a known pose.
    pub fn reset_pose(&mut self, pose: Pose2) {
        info!("Resetting pose to {:?}", pose);
        self.pose = pose;
        self.prev_positions = self.local.positions();
    }

    /// Re-anchor every servo and restart the setpoint from the measured
    /// module states. Call on every transition into a new behaviour.
    pub fn reset(&mut self) {
        self.local.reset();
    }

    /// Stop every module, keeping the wheel angles.
    pub fn stop(&mut self) {
        self.local.stop();
    }

    pub fn pose(&self) -> Pose2 {
        self.pose
    }

    pub fn velocity(&self) -> ChassisSpeeds {
        self.velocity
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn local(&self) -> &SwerveLocal {
        &self.local
    }

    pub fn kinodynamics(&self) -> &Arc<SwerveKinodynamics> {
        self.local.kinodynamics()
    }

    pub fn close(&mut self) {
        self.local.close();
    }
}
