//! # Planar geometry
//!
//! Poses and twists in the plane. The exponential and logarithm maps between
//! them are used to integrate odometry and to interpolate along curves.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::angle_modulus;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this rotation the series expansions are used in `exp` and `log`.
const SMALL_ANGLE_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An infinitesimal motion in the plane, expressed in the frame of the pose it
/// is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist2 {
    pub dx_m: f64,
    pub dy_m: f64,
    pub dtheta_rad: f64,
}

/// A position and heading in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2 {
    /// Position in the parent frame.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Heading in the parent frame, always in (-pi, pi].
    ///
    /// Units: radians
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Twist2 {
    pub fn new(dx_m: f64, dy_m: f64, dtheta_rad: f64) -> Self {
        Self {
            dx_m,
            dy_m,
            dtheta_rad,
        }
    }

    /// Multiply every component by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self::new(self.dx_m * k, self.dy_m * k, self.dtheta_rad * k)
    }

    /// Check if every component is within `tol` of `other`.
    pub fn is_near(&self, other: &Twist2, tol: f64) -> bool {
        (self.dx_m - other.dx_m).abs() <= tol
            && (self.dy_m - other.dy_m).abs() <= tol
            && (self.dtheta_rad - other.dtheta_rad).abs() <= tol
    }
}

impl Default for Pose2 {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Pose2 {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad: angle_modulus(heading_rad),
        }
    }

    pub fn x_m(&self) -> f64 {
        self.position_m.x
    }

    pub fn y_m(&self) -> f64 {
        self.position_m.y
    }

    /// Apply `other` as a transform expressed in this pose's frame.
    pub fn transform_by(&self, other: &Pose2) -> Pose2 {
        Pose2 {
            position_m: self.position_m + rotate(&other.position_m, self.heading_rad),
            heading_rad: angle_modulus(self.heading_rad + other.heading_rad),
        }
    }

    /// Express this pose in the frame of `other`.
    pub fn relative_to(&self, other: &Pose2) -> Pose2 {
        Pose2 {
            position_m: rotate(&(self.position_m - other.position_m), -other.heading_rad),
            heading_rad: angle_modulus(self.heading_rad - other.heading_rad),
        }
    }

    /// The pose reached by following the constant-curvature arc described by
    /// `twist`.
    pub fn exp(&self, twist: &Twist2) -> Pose2 {
        let dtheta = twist.dtheta_rad;
        let (sin_theta, cos_theta) = dtheta.sin_cos();

        let (s, c) = if dtheta.abs() < SMALL_ANGLE_RAD {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let transform = Pose2 {
            position_m: Vector2::new(
                twist.dx_m * s - twist.dy_m * c,
                twist.dx_m * c + twist.dy_m * s,
            ),
            heading_rad: angle_modulus(dtheta),
        };

        self.transform_by(&transform)
    }

    /// The twist which takes this pose to `end`, the inverse of `exp`.
    pub fn log(&self, end: &Pose2) -> Twist2 {
        let transform = end.relative_to(self);
        let dtheta = transform.heading_rad;
        let half_dtheta = 0.5 * dtheta;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < SMALL_ANGLE_RAD {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        let translation = rotate(
            &transform.position_m,
            (-half_dtheta).atan2(half_theta_by_tan),
        ) * half_theta_by_tan.hypot(half_dtheta);

        Twist2::new(translation.x, translation.y, dtheta)
    }

    /// Interpolate along the twist between this pose and `end`, `frac` in
    /// [0, 1].
    pub fn interpolate(&self, end: &Pose2, frac: f64) -> Pose2 {
        if frac <= 0.0 {
            *self
        } else if frac >= 1.0 {
            *end
        } else {
            self.exp(&self.log(end).scaled(frac))
        }
    }

    /// Straight line distance between the two poses.
    pub fn distance_m(&self, other: &Pose2) -> f64 {
        (self.position_m - other.position_m).norm()
    }

    /// Check if position and heading are both within `tol`.
    pub fn is_near(&self, other: &Pose2, tol: f64) -> bool {
        self.distance_m(other) <= tol
            && angle_modulus(self.heading_rad - other.heading_rad).abs() <= tol
    }
}

/// Rotate a vector by the given angle.
pub fn rotate(v: &Vector2<f64>, angle_rad: f64) -> Vector2<f64> {
    Rotation2::new(angle_rad) * v
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_exp_straight() {
        let p = Pose2::new(1.0, 1.0, FRAC_PI_2);
        let q = p.exp(&Twist2::new(1.0, 0.0, 0.0));

        assert!(q.is_near(&Pose2::new(1.0, 2.0, FRAC_PI_2), 1e-9));
    }

    #[test]
    fn test_exp_quarter_circle() {
        // Unit radius arc turning left by 90 degrees
        let q = Pose2::default().exp(&Twist2::new(FRAC_PI_2, 0.0, FRAC_PI_2));

        assert!(q.is_near(&Pose2::new(1.0, 1.0, FRAC_PI_2), 1e-9));
    }

    #[test]
    fn test_log_inverts_exp() {
        let start = Pose2::new(-2.0, 0.5, 0.3);
        for twist in &[
            Twist2::new(1.0, 0.0, 0.0),
            Twist2::new(0.3, -0.7, 1.2),
            Twist2::new(0.0, 0.0, -2.5),
            Twist2::new(-1.0, 0.2, 1e-12),
        ] {
            let end = start.exp(twist);
            assert!(start.log(&end).is_near(twist, 1e-9), "{:?}", twist);
        }
    }

    #[test]
    fn test_relative_to() {
        let a = Pose2::new(1.0, 0.0, FRAC_PI_2);
        let b = Pose2::new(1.0, 1.0, PI);

        let rel = b.relative_to(&a);
        assert!(rel.is_near(&Pose2::new(1.0, 0.0, FRAC_PI_2), 1e-9));
        assert!(a.transform_by(&rel).is_near(&b, 1e-9));
    }

    #[test]
    fn test_interpolate() {
        let a = Pose2::new(0.0, 0.0, 0.0);
        let b = Pose2::new(2.0, 0.0, 0.0);

        assert!(a.interpolate(&b, 0.25).is_near(&Pose2::new(0.5, 0.0, 0.0), 1e-9));
        assert!(a.interpolate(&b, 2.0).is_near(&b, 1e-12));
    }
}
