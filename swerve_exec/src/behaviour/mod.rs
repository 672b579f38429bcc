//! # Behaviours
//!
//! Long running actions are split into per-tick steps by implementing
//! [`Behaviour`]. The [`Scheduler`] runs every active behaviour once per tick
//! and guarantees that each [`Subsystem`] is claimed by at most one of them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod follow_trajectory;
mod rotate;
mod scheduler;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use follow_trajectory::*;
pub use rotate::*;
pub use scheduler::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::{context::RobotContext, drive::DriveError};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// An action spread over many ticks.
///
/// The scheduler calls `initialise` once, then `execute` every tick until
/// `is_finished` returns true or the behaviour is interrupted, and finally
/// `end`. Every servo a behaviour uses must be reset in `initialise`.
pub trait Behaviour {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Subsystems this behaviour needs exclusive use of.
    fn requirements(&self) -> &[Subsystem];

    fn initialise(&mut self, ctx: &mut RobotContext);

    /// Run one tick. An error cancels the behaviour.
    fn execute(&mut self, ctx: &mut RobotContext, dt: f64) -> Result<(), BehaviourError>;

    fn is_finished(&self) -> bool;

    /// Release the subsystems, `interrupted` if the behaviour did not finish
    /// on its own.
    fn end(&mut self, ctx: &mut RobotContext, interrupted: bool);
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A resource which only one behaviour may use at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Drive,

    /// A named non-drivetrain mechanism.
    Mechanism(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum BehaviourError {
    #[error("The trajectory sampler returned no sample")]
    BrokenTrajectory,

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),
}
