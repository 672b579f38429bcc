//! # Motion profiles
//!
//! Profiles generate a sequence of feasible setpoints from the current state
//! towards a goal. The same trapezoid profile drives linear axes, module
//! steering and rotate-in-place.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod trapezoid;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use trapezoid::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::is_near;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position, velocity and acceleration of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileState {
    pub x: f64,
    pub v: f64,
    pub a: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileState {
    pub fn new(x: f64, v: f64) -> Self {
        Self { x, v, a: 0.0 }
    }

    pub fn with_accel(x: f64, v: f64, a: f64) -> Self {
        Self { x, v, a }
    }

    /// A state at rest at `x`.
    pub fn at_rest(x: f64) -> Self {
        Self::new(x, 0.0)
    }

    /// Check position and velocity against the tolerances.
    pub fn is_near(&self, other: &ProfileState, x_tol: f64, v_tol: f64) -> bool {
        is_near(self.x, other.x, x_tol) && is_near(self.v, other.v, v_tol)
    }
}
