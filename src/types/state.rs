//! Named CTRV state
//!
//! The filter works on a raw `StateVector<T, 5>`; everything outside the
//! estimator reads it through [`CtrvState`] so no caller ever indexes the
//! vector by position.

use nalgebra::RealField;
use num_traits::Float;

use super::angles::normalize_angle;
use super::spaces::StateVector;

/// Dimension of the CTRV state.
pub const CTRV_DIM: usize = 5;

/// Index of x position in the raw state vector
pub const IDX_X: usize = 0;
/// Index of y position in the raw state vector
pub const IDX_Y: usize = 1;
/// Index of speed magnitude in the raw state vector
pub const IDX_SPEED: usize = 2;
/// Index of heading angle in the raw state vector
pub const IDX_HEADING: usize = 3;
/// Index of heading rate in the raw state vector
pub const IDX_YAW_RATE: usize = 4;

/// Kinematic state under the constant turn-rate and velocity model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CtrvState<T> {
    /// Position x
    pub x: T,
    /// Position y
    pub y: T,
    /// Speed magnitude along the heading
    pub speed: T,
    /// Heading angle in (−π, π]
    pub heading: T,
    /// Heading angular rate (rad per time unit)
    pub yaw_rate: T,
}

impl<T: RealField + Float + Copy> CtrvState<T> {
    /// Creates a state, normalizing the heading.
    pub fn new(x: T, y: T, speed: T, heading: T, yaw_rate: T) -> Self {
        Self {
            x,
            y,
            speed,
            heading: normalize_angle(heading),
            yaw_rate,
        }
    }

    /// Reads a raw state vector.
    pub fn from_vector(v: &StateVector<T, CTRV_DIM>) -> Self {
        Self {
            x: *v.index(IDX_X),
            y: *v.index(IDX_Y),
            speed: *v.index(IDX_SPEED),
            heading: *v.index(IDX_HEADING),
            yaw_rate: *v.index(IDX_YAW_RATE),
        }
    }

    /// Packs into the raw state vector used by the estimator.
    pub fn to_vector(&self) -> StateVector<T, CTRV_DIM> {
        StateVector::from_array([self.x, self.y, self.speed, self.heading, self.yaw_rate])
    }

    /// Cartesian velocity `(v·cosθ, v·sinθ)`.
    pub fn velocity(&self) -> (T, T) {
        let (sin_h, cos_h) = Float::sin_cos(self.heading);
        (self.speed * cos_h, self.speed * sin_h)
    }

    pub fn snapshot(&self) -> StateSnapshot<T> {
        let (vx, vy) = self.velocity();
        StateSnapshot {
            x: self.x,
            y: self.y,
            vx,
            vy,
            speed: self.speed,
            heading: self.heading,
        }
    }
}

/// Output record for comparison against Cartesian ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateSnapshot<T> {
    pub x: T,
    pub y: T,
    pub vx: T,
    pub vy: T,
    pub speed: T,
    pub heading: T,
}
