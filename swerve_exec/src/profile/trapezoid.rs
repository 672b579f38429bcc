//! # Trapezoid profile
//!
//! Minimum time motion between two (position, velocity) states under
//! symmetric velocity and acceleration limits. The plan is recomputed from
//! the supplied state on every call, so the profile itself is stateless and
//! a caller can feed back either the previous setpoint or a measurement.
//!
//! A plan has up to three phases:
//!
//! 1. Accelerate (or decelerate, when starting above the cruise speed) to
//!    the peak velocity.
//! 2. Cruise at the peak velocity.
//! 3. Decelerate to the goal velocity.
//!
//! Motion in the negative direction is planned by mirroring the problem. Both
//! directions are planned and the fastest feasible one is chosen, which covers
//! starting on the wrong side of the goal or moving away from it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::ProfileState;
use util::maths::{angle_modulus, clamp};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Plans shorter than one tick plus this are treated as reaching the goal.
const TIME_EPSILON_S: f64 = 1e-9;

/// Numerical slack allowed when checking a plan's peak velocity.
const VELOCITY_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A trapezoidal velocity profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrapezoidProfile {
    max_velocity: f64,
    max_acceleration: f64,
}

/// A plan in the mirrored frame, where the motion is "positive".
#[derive(Debug, Clone, Copy)]
struct Plan {
    /// +1 or -1, multiplies positions and velocities back into the real frame
    direction: f64,

    /// Initial velocity
    v0: f64,

    /// Phase 1 acceleration
    a1: f64,

    /// Phase 3 acceleration, always the full deceleration
    a3: f64,

    /// Peak (cruise) velocity
    peak_v: f64,

    t1: f64,
    t2: f64,
    t3: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrapezoidProfile {
    /// Create a new profile. Limits are assumed positive, which the
    /// kinodynamics checks on construction.
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// Return a copy with both limits multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.max_velocity * factor, self.max_acceleration * factor)
    }

    /// The state `dt` seconds along the minimum time plan from `current` to
    /// `goal`.
    ///
    /// If the goal is reached within `dt` the goal itself is returned, so that
    /// iterating the profile settles exactly.
    pub fn calculate(&self, dt: f64, current: ProfileState, goal: ProfileState) -> ProfileState {
        let goal = ProfileState::new(
            goal.x,
            clamp(goal.v, -self.max_velocity, self.max_velocity),
        );

        let plan = self.plan(&current, &goal);

        if plan.total_time() <= dt + TIME_EPSILON_S {
            return goal;
        }

        plan.sample(current.x, dt)
    }

    /// As [`TrapezoidProfile::calculate`] but for an angular axis whose
    /// position wraps at (-pi, pi]. The goal is reached along the shortest
    /// rotation and the returned position is wrapped.
    pub fn calculate_continuous(
        &self,
        dt: f64,
        current: ProfileState,
        goal: ProfileState,
    ) -> ProfileState {
        let current = ProfileState::with_accel(angle_modulus(current.x), current.v, current.a);
        let goal = ProfileState::new(current.x + angle_modulus(goal.x - current.x), goal.v);

        let next = self.calculate(dt, current, goal);

        ProfileState::with_accel(angle_modulus(next.x), next.v, next.a)
    }

    /// Total time to reach the goal from the current state.
    pub fn time_to_goal(&self, current: ProfileState, goal: ProfileState) -> f64 {
        let goal = ProfileState::new(
            goal.x,
            clamp(goal.v, -self.max_velocity, self.max_velocity),
        );

        self.plan(&current, &goal).total_time()
    }

    fn plan(&self, current: &ProfileState, goal: &ProfileState) -> Plan {
        let forward = self.plan_direction(1.0, current, goal);
        let reverse = self.plan_direction(-1.0, current, goal);

        match (forward, reverse) {
            (Some(f), Some(r)) => {
                if r.total_time() < f.total_time() {
                    r
                } else {
                    f
                }
            }
            (Some(f), None) => f,
            (None, Some(r)) => r,
            // One direction is always feasible with positive limits
            (None, None) => Plan {
                direction: 1.0,
                v0: current.v,
                a1: 0.0,
                a3: 0.0,
                peak_v: current.v,
                t1: 0.0,
                t2: 0.0,
                t3: 0.0,
            },
        }
    }

    fn plan_direction(&self, direction: f64, current: &ProfileState, goal: &ProfileState) -> Option<Plan> {
        let a = self.max_acceleration;
        let dist = direction * (goal.x - current.x);
        let v0 = direction * current.v;
        let vg = direction * goal.v;

        // Peak velocity of an accelerate-then-decelerate plan with no cruise
        let peak_sq = a * dist + 0.5 * (v0 * v0 + vg * vg);
        if peak_sq < 0.0 {
            return None;
        }

        let mut peak_v = peak_sq.sqrt();
        if peak_v + VELOCITY_EPSILON < vg || peak_v + VELOCITY_EPSILON < v0 {
            return None;
        }
        peak_v = peak_v.max(vg).max(v0);

        // Cap the peak, the remaining distance becomes a cruise phase
        let mut cruise_dist = 0.0;
        if peak_v > self.max_velocity {
            peak_v = self.max_velocity;
            let d1 = if v0 > peak_v {
                (v0 * v0 - peak_v * peak_v) / (2.0 * a)
            } else {
                (peak_v * peak_v - v0 * v0) / (2.0 * a)
            };
            let d3 = (peak_v * peak_v - vg * vg) / (2.0 * a);
            cruise_dist = (dist - d1 - d3).max(0.0);
        }

        let a1 = if peak_v > v0 {
            a
        } else if peak_v < v0 {
            -a
        } else {
            0.0
        };

        Some(Plan {
            direction,
            v0,
            a1,
            a3: -a,
            peak_v,
            t1: (peak_v - v0).abs() / a,
            t2: if peak_v > 0.0 { cruise_dist / peak_v } else { 0.0 },
            t3: (peak_v - vg) / a,
        })
    }
}

impl Plan {
    fn total_time(&self) -> f64 {
        self.t1 + self.t2 + self.t3
    }

    /// Sample the plan `t` seconds from its start, which is at `x0`.
    fn sample(&self, x0: f64, t: f64) -> ProfileState {
        let x1 = self.v0 * self.t1 + 0.5 * self.a1 * self.t1 * self.t1;
        let x2 = x1 + self.peak_v * self.t2;

        let (x, v, a) = if t < self.t1 {
            (
                self.v0 * t + 0.5 * self.a1 * t * t,
                self.v0 + self.a1 * t,
                self.a1,
            )
        } else if t < self.t1 + self.t2 {
            (x1 + self.peak_v * (t - self.t1), self.peak_v, 0.0)
        } else {
            let t3 = (t - self.t1 - self.t2).min(self.t3);
            (
                x2 + self.peak_v * t3 + 0.5 * self.a3 * t3 * t3,
                self.peak_v + self.a3 * t3,
                self.a3,
            )
        };

        ProfileState::with_accel(
            x0 + self.direction * x,
            self.direction * v,
            self.direction * a,
        )
    }
}
