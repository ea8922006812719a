//! Angle normalization
//!
//! Every angular quantity the filter writes (heading in the state, bearing in
//! an innovation or a predicted measurement) goes through [`normalize_angle`].

use nalgebra::RealField;
use num_traits::Float;

/// Wraps an angle into the half-open interval (−π, π].
///
/// Non-finite input is returned unchanged.
#[inline]
pub fn normalize_angle<T: RealField + Float + Copy>(phi: T) -> T {
    if !Float::is_finite(phi) {
        return phi;
    }
    let pi = T::pi();
    let two_pi = T::two_pi();

    // fmod keeps the sign of phi, so the result is in (-2π, 2π)
    let mut wrapped = phi % two_pi;
    if wrapped > pi {
        wrapped -= two_pi;
    } else if wrapped <= -pi {
        wrapped += two_pi;
    }
    wrapped
}

/// Shortest signed angular difference `a - b`, in (−π, π].
#[inline]
pub fn angle_difference<T: RealField + Float + Copy>(a: T, b: T) -> T {
    normalize_angle(a - b)
}
