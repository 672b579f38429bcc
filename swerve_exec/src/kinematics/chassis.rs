//! Chassis speeds and accelerations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

// Internal
use crate::geom::{rotate, Pose2};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Translational and angular velocity of the robot's centre.
///
/// The frame (robot or field) is implied by where the speeds are used, see
/// [`crate::kinematics::FrameTransform`] for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx_ms: f64,
    pub vy_ms: f64,
    pub omega_rads: f64,
}

/// Translational and angular acceleration of the robot's centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisAccelerations {
    pub ax_mss: f64,
    pub ay_mss: f64,

    /// Square of the angular velocity at this instant, the centripetal term
    /// of the second order kinematics.
    ///
    /// Units: radians^2/second^2
    pub centripetal_rad2s2: f64,

    pub alpha_radss: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChassisSpeeds {
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            omega_rads,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.vx_ms, self.vy_ms)
    }

    /// Euclidean norm over all three components.
    pub fn norm(&self) -> f64 {
        (self.vx_ms * self.vx_ms + self.vy_ms * self.vy_ms + self.omega_rads * self.omega_rads)
            .sqrt()
    }

    pub fn is_near(&self, other: &ChassisSpeeds, tol: f64) -> bool {
        (self.vx_ms - other.vx_ms).abs() <= tol
            && (self.vy_ms - other.vy_ms).abs() <= tol
            && (self.omega_rads - other.omega_rads).abs() <= tol
    }

    pub fn is_zero(&self, tol: f64) -> bool {
        self.is_near(&ChassisSpeeds::zero(), tol)
    }

    /// Rotate the translational part by `angle_rad`.
    pub fn rotated(&self, angle_rad: f64) -> Self {
        let t = rotate(&self.translation(), angle_rad);
        Self::new(t.x, t.y, self.omega_rads)
    }

    /// Speeds which, held constant over `dt`, follow a straight line to the
    /// pose that the (curved) motion of these speeds would reach.
    ///
    /// Compensates the drift caused by translating and rotating at the same
    /// time over a discrete tick.
    pub fn discretize(&self, dt: f64) -> Self {
        if dt <= 0.0 {
            return *self;
        }

        let delta = Pose2::new(
            self.vx_ms * dt,
            self.vy_ms * dt,
            self.omega_rads * dt,
        );
        let twist = Pose2::default().log(&delta);

        Self::new(twist.dx_m / dt, twist.dy_m / dt, twist.dtheta_rad / dt)
    }
}

impl Add for ChassisSpeeds {
    type Output = ChassisSpeeds;

    fn add(self, rhs: ChassisSpeeds) -> ChassisSpeeds {
        ChassisSpeeds::new(
            self.vx_ms + rhs.vx_ms,
            self.vy_ms + rhs.vy_ms,
            self.omega_rads + rhs.omega_rads,
        )
    }
}

impl Sub for ChassisSpeeds {
    type Output = ChassisSpeeds;

    fn sub(self, rhs: ChassisSpeeds) -> ChassisSpeeds {
        ChassisSpeeds::new(
            self.vx_ms - rhs.vx_ms,
            self.vy_ms - rhs.vy_ms,
            self.omega_rads - rhs.omega_rads,
        )
    }
}

impl Mul<f64> for ChassisSpeeds {
    type Output = ChassisSpeeds;

    fn mul(self, rhs: f64) -> ChassisSpeeds {
        ChassisSpeeds::new(self.vx_ms * rhs, self.vy_ms * rhs, self.omega_rads * rhs)
    }
}

impl ChassisAccelerations {
    pub fn new(ax_mss: f64, ay_mss: f64, centripetal_rad2s2: f64, alpha_radss: f64) -> Self {
        Self {
            ax_mss,
            ay_mss,
            centripetal_rad2s2,
            alpha_radss,
        }
    }

    /// The average acceleration between two consecutive chassis speeds, with
    /// the centripetal term taken from the later one.
    pub fn between(prev: &ChassisSpeeds, next: &ChassisSpeeds, dt: f64) -> Self {
        if dt <= 0.0 {
            return Self::new(0.0, 0.0, next.omega_rads * next.omega_rads, 0.0);
        }

        Self::new(
            (next.vx_ms - prev.vx_ms) / dt,
            (next.vy_ms - prev.vy_ms) / dt,
            next.omega_rads * next.omega_rads,
            (next.omega_rads - prev.omega_rads) / dt,
        )
    }

    /// Rotate the translational part by `angle_rad`.
    pub fn rotated(&self, angle_rad: f64) -> Self {
        let a = rotate(&Vector2::new(self.ax_mss, self.ay_mss), angle_rad);
        Self::new(a.x, a.y, self.centripetal_rad2s2, self.alpha_radss)
    }

    /// Express field-relative accelerations in the robot frame.
    pub fn from_field_relative(&self, yaw_rad: f64) -> Self {
        self.rotated(-yaw_rad)
    }

    pub fn is_near(&self, other: &ChassisAccelerations, tol: f64) -> bool {
        (self.ax_mss - other.ax_mss).abs() <= tol
            && (self.ay_mss - other.ay_mss).abs() <= tol
            && (self.centripetal_rad2s2 - other.centripetal_rad2s2).abs() <= tol
            && (self.alpha_radss - other.alpha_radss).abs() <= tol
    }
}
