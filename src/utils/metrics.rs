//! Root-mean-square error against Cartesian ground truth

use nalgebra::RealField;
use num_traits::Float;

use crate::types::state::StateSnapshot;

/// True position and velocity of the tracked object at one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundTruth<T> {
    pub x: T,
    pub y: T,
    pub vx: T,
    pub vy: T,
}

impl<T> GroundTruth<T> {
    #[inline]
    pub fn new(x: T, y: T, vx: T, vy: T) -> Self {
        Self { x, y, vx, vy }
    }
}

/// Per-component RMSE over (x, y, vx, vy).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rmse<T> {
    pub x: T,
    pub y: T,
    pub vx: T,
    pub vy: T,
}

/// Component-wise root-mean-square error of `estimates` against `truth`.
///
/// Returns `None` when the inputs are empty or differ in length.
pub fn rmse<T: RealField + Float + Copy>(
    estimates: &[StateSnapshot<T>],
    truth: &[GroundTruth<T>],
) -> Option<Rmse<T>> {
    if estimates.is_empty() || estimates.len() != truth.len() {
        return None;
    }

    let mut sum = [T::zero(); 4];
    let mut count = T::zero();
    for (est, gt) in estimates.iter().zip(truth) {
        let residuals = [est.x - gt.x, est.y - gt.y, est.vx - gt.vx, est.vy - gt.vy];
        for (acc, r) in sum.iter_mut().zip(residuals) {
            *acc += r * r;
        }
        count += T::one();
    }

    let [x, y, vx, vy] = sum.map(|s| Float::sqrt(s / count));
    Some(Rmse { x, y, vx, vy })
}
