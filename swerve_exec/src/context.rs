//! Robot context passed to behaviours
//!
//! Owns the subsystems and the latest drive outputs, so that behaviours reach
//! the hardware through `&mut RobotContext` instead of through globals.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::{
    control::SwerveState,
    drive::{DriveDemand, DriveError, InputData, OutputData, StatusReport, SwerveDrive},
    geom::Pose2,
    kinematics::ChassisSpeeds,
};
use util::{
    module::State,
    telemetry::{Level, Telemetry},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct RobotContext {
    pub drive: SwerveDrive,

    pub telemetry: Telemetry,

    pub mode: RobotMode,

    /// Output of the latest drive tick, `None` before the first.
    output: Option<OutputData>,

    /// Status of the latest drive tick.
    status: StatusReport,

    /// Whether anything has driven this tick.
    driven: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operating mode of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMode {
    /// No actuation, behaviours are cancelled.
    Disabled,
    Autonomous,
    Teleop,
    Test,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RobotMode {
    fn default() -> Self {
        RobotMode::Disabled
    }
}

impl RobotContext {
    pub fn new(drive: SwerveDrive, telemetry: &Telemetry) -> Self {
        Self {
            drive,
            telemetry: telemetry.clone(),
            mode: RobotMode::default(),
            output: None,
            status: StatusReport::default(),
            driven: false,
        }
    }

    /// Run one drive tick with `demand`.
    ///
    /// A disabled robot is always stopped, whatever the demand.
    pub fn drive(&mut self, demand: DriveDemand, dt: f64) -> Result<StatusReport, DriveError> {
        let demand = match self.mode {
            RobotMode::Disabled => DriveDemand::Stop,
            _ => demand,
        };

        self.driven = true;

        let (output, status) = self.drive.proc(&InputData { demand, dt })?;
        self.output = Some(output);
        self.status = status;

        Ok(status)
    }

    /// Close the tick, stopping the drive if nothing drove it.
    pub fn end_tick(&mut self, dt: f64) -> Result<(), DriveError> {
        if !self.driven {
            self.drive(DriveDemand::Stop, dt)?;
        }
        self.driven = false;

        self.telemetry
            .log_str(Level::Debug, "mode", || format!("{:?}", self.mode));

        Ok(())
    }

    /// Field-relative pose from odometry.
    pub fn pose(&self) -> Pose2 {
        self.drive.pose()
    }

    /// Field-relative velocity from odometry.
    pub fn velocity(&self) -> ChassisSpeeds {
        self.drive.velocity()
    }

    /// Measured pose and velocity as a controller measurement.
    pub fn state(&self) -> SwerveState {
        SwerveState::from_pose(&self.pose(), &self.velocity())
    }

    pub fn output(&self) -> Option<&OutputData> {
        self.output.as_ref()
    }

    pub fn status(&self) -> &StatusReport {
        &self.status
    }
}
