//! Cooperative behaviour scheduler

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use super::{Behaviour, Subsystem};
use crate::context::{RobotContext, RobotMode};
use util::telemetry::{Level, Telemetry};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs behaviours once per tick, in the order they were scheduled.
pub struct Scheduler {
    running: Vec<Box<dyn Behaviour>>,

    telemetry: Telemetry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Scheduler {
    pub fn new(telemetry: &Telemetry) -> Self {
        Self {
            running: Vec::new(),
            telemetry: telemetry.child("scheduler"),
        }
    }

    /// Start `behaviour`, interrupting whichever behaviours hold any of its
    /// requirements. Their `end` runs before the new behaviour's
    /// `initialise`.
    ///
    /// Returns false if the robot is disabled, in which case nothing is
    /// started.
    pub fn schedule(&mut self, ctx: &mut RobotContext, mut behaviour: Box<dyn Behaviour>) -> bool {
        if ctx.mode == RobotMode::Disabled {
            warn!("Cannot start {} while disabled", behaviour.name());
            return false;
        }

        let requirements = behaviour.requirements().to_vec();

        let mut i = 0;
        while i < self.running.len() {
            let conflicts = self.running[i]
                .requirements()
                .iter()
                .any(|r| requirements.contains(r));

            if conflicts {
                let mut prior = self.running.remove(i);
                info!("{} interrupted by {}", prior.name(), behaviour.name());
                prior.end(ctx, true);
            } else {
                i += 1;
            }
        }

        info!("Starting {}", behaviour.name());
        behaviour.initialise(ctx);
        self.running.push(behaviour);

        true
    }

    /// Run every behaviour for one tick.
    ///
    /// Finished behaviours are ended, a behaviour whose `execute` fails is
    /// cancelled. Disabling the robot cancels everything.
    pub fn run(&mut self, ctx: &mut RobotContext, dt: f64) {
        if ctx.mode == RobotMode::Disabled {
            self.cancel_all(ctx);
            return;
        }

        let mut i = 0;
        while i < self.running.len() {
            if let Err(e) = self.running[i].execute(ctx, dt) {
                let mut failed = self.running.remove(i);
                warn!("Cancelling {}: {}", failed.name(), e);
                failed.end(ctx, true);
                continue;
            }

            if self.running[i].is_finished() {
                let mut done = self.running.remove(i);
                info!("{} finished", done.name());
                done.end(ctx, false);
                continue;
            }

            i += 1;
        }

        self.telemetry
            .log_f64(Level::Debug, "running", || self.running.len() as f64);
    }

    /// Interrupt the behaviour called `name`, if it is running.
    pub fn cancel(&mut self, ctx: &mut RobotContext, name: &str) {
        if let Some(i) = self.running.iter().position(|b| b.name() == name) {
            let mut b = self.running.remove(i);
            debug!("Cancelled {}", b.name());
            b.end(ctx, true);
        }
    }

    /// Interrupt every running behaviour.
    pub fn cancel_all(&mut self, ctx: &mut RobotContext) {
        for mut b in self.running.drain(..) {
            debug!("Cancelled {}", b.name());
            b.end(ctx, true);
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.iter().any(|b| b.name() == name)
    }

    /// Name of the behaviour holding `subsystem`.
    pub fn holder(&self, subsystem: Subsystem) -> Option<&str> {
        self.running
            .iter()
            .find(|b| b.requirements().contains(&subsystem))
            .map(|b| b.name())
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
