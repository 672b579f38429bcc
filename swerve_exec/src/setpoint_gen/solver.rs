//! Scalar root finding along a line in module velocity space
//!
//! The limiters all ask the same question: moving a module's velocity in a
//! straight line from `(x0, y0)` to `(x1, y1)`, what fraction `s` of the way
//! can it go before some function of the velocity crosses a limit? The
//! functions involved are monotonic enough along the line for regula falsi
//! to converge in a handful of iterations.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::{PI, TAU};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Shift `angle` by a whole turn so that it lies within half a turn of
/// `reference`.
pub(crate) fn unwrap_angle(reference: f64, angle: f64) -> f64 {
    let diff = angle - reference;
    if diff > PI {
        angle - TAU
    } else if diff < -PI {
        angle + TAU
    } else {
        angle
    }
}

/// Find `s` in `[0, 1]` where `func` crosses zero between the two points,
/// given its values `f0` and `f1` at either end.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_root<F>(
    func: &F,
    x0: f64,
    y0: f64,
    f0: f64,
    x1: f64,
    y1: f64,
    f1: f64,
    iterations: usize,
) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    let s_guess = (-f0 / (f1 - f0)).max(0.0).min(1.0);
    if !s_guess.is_finite() {
        return 1.0;
    }

    if iterations == 0 || (f1 - f0).abs() <= EPSILON {
        return s_guess;
    }

    let x_guess = (x1 - x0) * s_guess + x0;
    let y_guess = (y1 - y0) * s_guess + y0;
    let f_guess = func(x_guess, y_guess);

    if f0.signum() == f_guess.signum() {
        // Root lies between the guess and the far end
        s_guess
            + (1.0 - s_guess)
                * find_root(func, x_guess, y_guess, f_guess, x1, y1, f1, iterations - 1)
    } else {
        // Root lies between the near end and the guess
        s_guess * find_root(func, x0, y0, f0, x_guess, y_guess, f_guess, iterations - 1)
    }
}

/// Largest `s` for which the heading of the interpolated velocity stays
/// within `max_deviation` of the starting heading `f0`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_steering_max_s(
    x0: f64,
    y0: f64,
    f0: f64,
    x1: f64,
    y1: f64,
    f1: f64,
    max_deviation: f64,
    iterations: usize,
) -> f64 {
    let f1 = unwrap_angle(f0, f1);
    let diff = f1 - f0;
    if diff.abs() <= max_deviation {
        return 1.0;
    }

    let offset = f0 + diff.signum() * max_deviation;
    let func = |x: f64, y: f64| unwrap_angle(f0, y.atan2(x)) - offset;

    find_root(&func, x0, y0, f0 - offset, x1, y1, f1 - offset, iterations)
}

/// Largest `s` for which the magnitude of the interpolated velocity stays
/// within `max_step` of the starting magnitude `f0`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_drive_max_s(
    x0: f64,
    y0: f64,
    f0: f64,
    x1: f64,
    y1: f64,
    f1: f64,
    max_step: f64,
    iterations: usize,
) -> f64 {
    let diff = f1 - f0;
    if diff.abs() <= max_step {
        return 1.0;
    }

    let offset = f0 + diff.signum() * max_step;
    let func = |x: f64, y: f64| x.hypot(y) - offset;

    find_root(&func, x0, y0, f0 - offset, x1, y1, f1 - offset, iterations)
}
