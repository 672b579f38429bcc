//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
///
/// NaN values are passed through unchanged, callers that cannot accept NaN
/// must check for it first.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Returns true if `a` and `b` are within `tolerance` of each other.
pub fn is_near<T>(a: T, b: T, tolerance: T) -> bool
where
    T: Float
{
    (a - b).abs() <= tolerance
}

/// Wrap an angle into the range (-pi, pi].
pub fn angle_modulus<T>(value: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = pi_t - rem_euclid(pi_t - value, tau_t);

    // rem_euclid can round up to tau, which would give exactly -pi
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_angle_modulus() {
        assert!(is_near(angle_modulus(0.0), 0.0, 1e-12));
        assert!(is_near(angle_modulus(PI), PI, 1e-12));
        assert!(is_near(angle_modulus(-PI), PI, 1e-12));
        assert!(is_near(angle_modulus(3.0 * PI / 2.0), -PI / 2.0, 1e-12));
        assert!(is_near(angle_modulus(-3.0 * PI / 2.0), PI / 2.0, 1e-12));
        assert!(is_near(angle_modulus(5.0 * TAU + 0.1), 0.1, 1e-9));
    }

    #[test]
    fn test_lin_map_and_clamp() {
        assert_eq!(lin_map((-1.0, 1.0), (-600.0, 600.0), 0.5), 300.0);
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.3, -1.0, 1.0), 0.3);
    }
}
