//! # Trajectory module
//!
//! Time parameterisation of already-parameterised paths.
//!
//! A [`Path`] is a sequence of [`PoseWithMotion`] samples indexed by arc
//! length. The [`ScheduleGenerator`] retimes it under a set of
//! [`TimingConstraint`]s with a forward-backward pass, producing a
//! [`Trajectory`] of [`TimedPose`]s, which a [`TrajectorySampler`] walks
//! through tick by tick.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod constraints;
mod path;
mod sampler;
mod timed_pose;
mod timing;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use constraints::*;
pub use path::*;
pub use sampler::*;
pub use timed_pose::*;
pub use timing::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors building a path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajectoryError {
    #[error("A path needs at least two samples, got {0}")]
    TooFewSamples(usize),

    #[error("Path step must be positive, got {0}")]
    InvalidStep(f64),

    #[error("Path has no length")]
    ZeroLength,
}
