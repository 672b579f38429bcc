//! Walks a trajectory one tick at a time

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{TimedPose, Trajectory};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds the time along a trajectory, advanced by the scheduler's tick.
#[derive(Debug, Clone)]
pub struct TrajectorySampler {
    trajectory: Trajectory,
    time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajectorySampler {
    pub fn new(trajectory: Trajectory) -> Self {
        Self {
            trajectory,
            time_s: 0.0,
        }
    }

    /// Move `dt` along the trajectory and return the sample there.
    ///
    /// Past the end this returns the terminal sample and the sampler is done.
    /// `None` means the trajectory has no samples at all.
    pub fn advance(&mut self, dt: f64) -> Option<TimedPose> {
        self.time_s = (self.time_s + dt).min(self.trajectory.total_time_s());
        self.trajectory.sample(self.time_s)
    }

    /// The sample `dt` ahead, without moving.
    pub fn preview(&self, dt: f64) -> Option<TimedPose> {
        self.trajectory.sample(self.time_s + dt)
    }

    /// The sample at the current time.
    pub fn current(&self) -> Option<TimedPose> {
        self.trajectory.sample(self.time_s)
    }

    pub fn is_done(&self) -> bool {
        self.time_s >= self.trajectory.total_time_s()
    }

    /// Units: seconds
    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn reset(&mut self) {
        self.time_s = 0.0;
    }
}
