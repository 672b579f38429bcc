//! Follow a list of trajectories with the full state controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::collections::VecDeque;

// Internal
use super::{Behaviour, BehaviourError, Subsystem};
use crate::{
    context::RobotContext,
    control::{FullStateDriveController, HolonomicController, SwerveState},
    drive::DriveDemand,
    geom::Pose2,
    trajectory::{Trajectory, TrajectorySampler},
};
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Builds the trajectories to follow from the pose at the start.
pub type TrajectoryMaker = Box<dyn Fn(&Pose2) -> Vec<Trajectory>>;

/// Follow each trajectory in turn.
///
/// Before each trajectory the wheels are steered at rest towards the motion
/// of its next sample, which is previewed without advancing. Time along the
/// trajectory only starts once they are aligned.
pub struct FollowTrajectoryList {
    maker: TrajectoryMaker,

    controller: FullStateDriveController,

    pending: VecDeque<Trajectory>,

    sampler: Option<TrajectorySampler>,

    aligned: bool,

    done: bool,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FollowTrajectoryList {
    pub fn new(maker: TrajectoryMaker, telemetry: &Telemetry) -> Self {
        let telemetry = telemetry.child("follow_trajectory_list");
        Self {
            maker,
            controller: FullStateDriveController::new(&telemetry),
            pending: VecDeque::new(),
            sampler: None,
            aligned: false,
            done: false,
            telemetry,
        }
    }

    /// Follow a fixed list, whatever the starting pose.
    pub fn fixed(trajectories: Vec<Trajectory>, telemetry: &Telemetry) -> Self {
        Self::new(Box::new(move |_| trajectories.clone()), telemetry)
    }
}

impl Behaviour for FollowTrajectoryList {
    fn name(&self) -> &str {
        "follow_trajectory_list"
    }

    fn requirements(&self) -> &[Subsystem] {
        &[Subsystem::Drive]
    }

    fn initialise(&mut self, ctx: &mut RobotContext) {
        ctx.drive.reset();
        self.controller.reset();

        self.pending = (self.maker)(&ctx.pose()).into_iter().collect();
        self.sampler = None;
        self.aligned = false;
        self.done = false;

        info!("Following {} trajectories", self.pending.len());
    }

    fn execute(&mut self, ctx: &mut RobotContext, dt: f64) -> Result<(), BehaviourError> {
        let need_next = match &self.sampler {
            Some(s) => s.is_done(),
            None => true,
        };

        if need_next {
            match self.pending.pop_front() {
                Some(t) => {
                    self.sampler = Some(TrajectorySampler::new(t));
                    self.aligned = false;
                }
                None => {
                    self.done = true;
                    return Ok(());
                }
            }
        }

        let sampler = match self.sampler.as_mut() {
            Some(s) => s,
            None => return Err(BehaviourError::BrokenTrajectory),
        };

        let sample = if self.aligned {
            sampler.advance(dt)
        } else {
            sampler.preview(dt)
        };

        let sample = match sample {
            Some(s) => s,
            None => {
                warn!("Broken trajectory, cancelling");
                return Err(BehaviourError::BrokenTrajectory);
            }
        };

        let reference = SwerveState::from_timed_pose(&sample);
        let target = self.controller.calculate(&ctx.state(), &reference, dt);

        if self.aligned {
            ctx.drive(DriveDemand::FieldRelative(target), dt)?;
        } else {
            self.aligned = ctx.drive(DriveDemand::SteerAtRest(target), dt)?.aligned;
        }

        self.telemetry
            .log_serialize(Level::Trace, "reference", || reference);

        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.done
    }

    fn end(&mut self, ctx: &mut RobotContext, _interrupted: bool) {
        ctx.drive.stop();
        self.pending.clear();
        self.sampler = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::behaviour::Scheduler;
    use crate::context::{test::sim_context, RobotMode};
    use crate::trajectory::{Path, ScheduleGenerator};

    fn straight(from: f64, to: f64) -> Trajectory {
        let path = Path::straight(Pose2::new(from, 0.0, 0.0), Pose2::new(to, 0.0, 0.0), 0.25).unwrap();
        ScheduleGenerator::default()
            .time_parameterize(&path, 0.0, 0.0, 1.0, 1.0)
            .unwrap()
    }

    #[test]
    fn test_follows_list() {
        let mut ctx = sim_context();
        ctx.mode = RobotMode::Autonomous;
        let telemetry = Telemetry::disabled();
        let mut scheduler = Scheduler::new(&telemetry);

        let follow = FollowTrajectoryList::fixed(vec![straight(0.0, 1.0), straight(1.0, 2.0)], &telemetry);
        scheduler.schedule(&mut ctx, Box::new(follow));

        let mut ticks = 0;
        while scheduler.is_running("follow_trajectory_list") && ticks < 1000 {
            scheduler.run(&mut ctx, 0.02);
            ctx.end_tick(0.02).unwrap();
            ticks += 1;
        }

        assert!(!scheduler.is_running("follow_trajectory_list"));
        assert!((ctx.pose().x_m() - 2.0).abs() < 0.1);
        assert!(ctx.pose().y_m().abs() < 0.1);
    }

    #[test]
    fn test_empty_trajectory_is_broken() {
        let mut ctx = sim_context();
        ctx.mode = RobotMode::Autonomous;
        let telemetry = Telemetry::disabled();

        let mut follow = FollowTrajectoryList::fixed(vec![Trajectory::default()], &telemetry);
        follow.initialise(&mut ctx);

        assert!(matches!(
            follow.execute(&mut ctx, 0.02),
            Err(BehaviourError::BrokenTrajectory)
        ));
        assert!(!follow.is_finished());
    }

    #[test]
    fn test_interrupt_stops() {
        let mut ctx = sim_context();
        ctx.mode = RobotMode::Autonomous;
        let telemetry = Telemetry::disabled();
        let mut scheduler = Scheduler::new(&telemetry);

        scheduler.schedule(
            &mut ctx,
            Box::new(FollowTrajectoryList::fixed(vec![straight(0.0, 1.0)], &telemetry)),
        );
        for _ in 0..20 {
            scheduler.run(&mut ctx, 0.02);
            ctx.end_tick(0.02).unwrap();
        }

        scheduler.cancel_all(&mut ctx);
        assert!(scheduler.is_empty());
        assert!(ctx.drive.local().desired_states().iter().all(|s| s.speed_ms == 0.0));
    }
}
