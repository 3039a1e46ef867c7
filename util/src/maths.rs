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

/// Saturate a value into `[min, max]`.
///
/// NaN inputs saturate to `min` so that a bad value can never escape the limits.
pub fn saturate<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    if value.is_nan() {
        return min
    }

    value.max(min).min(max)
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

/// Wrap an angle in degrees into `[0, 360)`.
pub fn wrap_360<T>(angle_deg: T) -> T
where
    T: Float
{
    let full = T::from(360.0).unwrap_or_else(T::zero);
    let wrapped = rem_euclid(angle_deg, full);

    // Guard the round-off case where the remainder lands exactly on the modulus
    if wrapped >= full { T::zero() } else { wrapped }
}

/// Signed shortest angular difference `a - b` in degrees, in the range `[-180, 180)`.
pub fn angle_subtract<T>(a_deg: T, b_deg: T) -> T
where
    T: Float
{
    let half = T::from(180.0).unwrap_or_else(T::zero);

    wrap_360(a_deg - b_deg + half) - half
}
