//! Observation (sensor) models
//!
//! Describes how sensor measurements relate to the CTRV state
//! `[x, y, speed, heading, yaw_rate]`.

use nalgebra::{convert, RealField};
use num_traits::Float;

use crate::types::angles::normalize_angle;
use crate::types::spaces::{
    ComputeInnovation, Innovation, Measurement, MeasurementCovariance, StateVector,
};
use crate::types::state::{CTRV_DIM, IDX_HEADING, IDX_SPEED, IDX_X, IDX_Y};
use crate::types::transforms::ObservationMatrix;

/// Below this range the predicted range rate is forced to zero.
pub const MIN_RANGE_FOR_RATE: f64 = 1e-4;

/// Below this range the range/bearing Jacobian is undefined.
pub const MIN_RANGE_FOR_JACOBIAN: f64 = 1e-10;

/// Trait for linear observation models.
///
/// z = H * x + v, with v zero-mean Gaussian noise of covariance R.
pub trait ObservationModel<T: RealField, const N: usize, const M: usize> {
    /// Returns the observation matrix H.
    fn observation_matrix(&self) -> ObservationMatrix<T, M, N>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;
}

/// Trait for nonlinear observation models.
///
/// z = h(x) + v, linearized through H = ∂h/∂x at the predicted state.
pub trait NonlinearObservationModel<T: RealField + Copy, const N: usize, const M: usize> {
    /// Predicted measurement h(x).
    fn observe(&self, state: &StateVector<T, N>) -> Measurement<T, M>;

    /// Jacobian ∂h/∂x, or `None` where it is undefined.
    fn jacobian_at(&self, state: &StateVector<T, N>) -> Option<ObservationMatrix<T, M, N>>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;

    /// Residual between an actual and a predicted measurement.
    ///
    /// Sensors with angular components override this to wrap them.
    fn innovation(&self, measured: Measurement<T, M>, predicted: Measurement<T, M>) -> Innovation<T, M> {
        measured.innovation(predicted)
    }
}

// ============================================================================
// Position Sensor
// ============================================================================

/// Linear sensor observing `(x, y)` with independent noise per axis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionSensor<T> {
    /// X position noise standard deviation
    pub sigma_x: T,
    /// Y position noise standard deviation
    pub sigma_y: T,
}

impl<T: RealField + Float + Copy> PositionSensor<T> {
    /// Creates a new position sensor.
    ///
    /// # Panics
    /// Panics if `sigma_x <= 0` or `sigma_y <= 0`.
    pub fn new(sigma_x: T, sigma_y: T) -> Self {
        assert!(sigma_x > T::zero(), "Measurement noise sigma_x must be positive");
        assert!(sigma_y > T::zero(), "Measurement noise sigma_y must be positive");
        Self { sigma_x, sigma_y }
    }
}

impl<T: RealField + Float + Copy> ObservationModel<T, CTRV_DIM, 2> for PositionSensor<T> {
    fn observation_matrix(&self) -> ObservationMatrix<T, 2, CTRV_DIM> {
        let one = T::one();
        let zero = T::zero();

        ObservationMatrix::from_matrix(nalgebra::matrix![
            one, zero, zero, zero, zero;
            zero, one, zero, zero, zero
        ])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 2> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.sigma_x * self.sigma_x,
            self.sigma_y * self.sigma_y
        ])
    }
}

// ============================================================================
// Range / Bearing / Range-Rate Sensor
// ============================================================================

/// Radar-like sensor at the origin observing `(range, bearing, range_rate)`.
///
/// - range = √(x² + y²)
/// - bearing = atan2(y, x)
/// - range_rate = (x·v·cosθ + y·v·sinθ) / range
///
/// Close to the origin the range rate is forced to zero instead of dividing
/// by a vanishing range; the Jacobian is undefined there and returns `None`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeBearingRateSensor<T> {
    /// Range noise standard deviation
    pub sigma_range: T,
    /// Bearing noise standard deviation (radians)
    pub sigma_bearing: T,
    /// Range-rate noise standard deviation
    pub sigma_range_rate: T,
}

impl<T: RealField + Float + Copy> RangeBearingRateSensor<T> {
    /// Creates a new range/bearing/range-rate sensor.
    ///
    /// # Panics
    /// Panics if any noise parameter is non-positive.
    pub fn new(sigma_range: T, sigma_bearing: T, sigma_range_rate: T) -> Self {
        assert!(sigma_range > T::zero(), "Range noise sigma_range must be positive");
        assert!(sigma_bearing > T::zero(), "Bearing noise sigma_bearing must be positive");
        assert!(
            sigma_range_rate > T::zero(),
            "Range-rate noise sigma_range_rate must be positive"
        );
        Self {
            sigma_range,
            sigma_bearing,
            sigma_range_rate,
        }
    }
}

impl<T: RealField + Float + Copy> NonlinearObservationModel<T, CTRV_DIM, 3>
    for RangeBearingRateSensor<T>
{
    fn observe(&self, state: &StateVector<T, CTRV_DIM>) -> Measurement<T, 3> {
        let x = *state.index(IDX_X);
        let y = *state.index(IDX_Y);
        let v = *state.index(IDX_SPEED);
        let (sin_t, cos_t) = Float::sin_cos(*state.index(IDX_HEADING));

        let range = Float::sqrt(x * x + y * y);
        let bearing = normalize_angle(Float::atan2(y, x));

        let min_range: T = convert(MIN_RANGE_FOR_RATE);
        let range_rate = if range < min_range {
            T::zero()
        } else {
            (x * v * cos_t + y * v * sin_t) / range
        };

        Measurement::from_array([range, bearing, range_rate])
    }

    fn jacobian_at(&self, state: &StateVector<T, CTRV_DIM>) -> Option<ObservationMatrix<T, 3, CTRV_DIM>> {
        let x = *state.index(IDX_X);
        let y = *state.index(IDX_Y);
        let v = *state.index(IDX_SPEED);
        let (sin_t, cos_t) = Float::sin_cos(*state.index(IDX_HEADING));

        let r_sq = x * x + y * y;
        let r = Float::sqrt(r_sq);
        let min_range: T = convert(MIN_RANGE_FOR_JACOBIAN);
        if r < min_range {
            return None;
        }
        let r_cubed = r_sq * r;
        let zero = T::zero();

        // Radial velocity numerator: v·(x·cosθ + y·sinθ)
        let radial = v * (x * cos_t + y * sin_t);

        let drr_dx = v * cos_t / r - x * radial / r_cubed;
        let drr_dy = v * sin_t / r - y * radial / r_cubed;
        let drr_dv = (x * cos_t + y * sin_t) / r;
        let drr_dtheta = v * (y * cos_t - x * sin_t) / r;

        Some(ObservationMatrix::from_matrix(nalgebra::matrix![
            x / r, y / r, zero, zero, zero;
            -y / r_sq, x / r_sq, zero, zero, zero;
            drr_dx, drr_dy, drr_dv, drr_dtheta, zero
        ]))
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 3> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.sigma_range * self.sigma_range,
            self.sigma_bearing * self.sigma_bearing,
            self.sigma_range_rate * self.sigma_range_rate
        ])
    }

    /// Bearing residual is taken along the shortest arc.
    fn innovation(&self, measured: Measurement<T, 3>, predicted: Measurement<T, 3>) -> Innovation<T, 3> {
        let raw = measured.innovation(predicted);
        let bearing = normalize_angle(*raw.index(1));
        raw.with_component(1, bearing)
    }
}
