//! Kalman filter state and the shared measurement-correction step
//!
//! Both the linear and the linearized (EKF) update reduce to the same algebra
//! once an innovation, an observation matrix and a noise covariance are known:
//!
//! - S = H * P * H^T + R
//! - K = P * H^T * S^{-1}
//! - x = x + K * y
//! - P = (I - K*H) * P   (or Joseph form)

use nalgebra::RealField;

use crate::types::spaces::{Innovation, MeasurementCovariance, StateCovariance, StateVector};
use crate::types::transforms::{
    compute_innovation_covariance, compute_kalman_gain, CovarianceUpdate, ObservationMatrix,
};
use crate::{FusionError, Result};

/// Mean and covariance of a single-target state estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState<T: RealField, const N: usize> {
    /// State estimate mean
    pub mean: StateVector<T, N>,
    /// State estimate covariance
    pub covariance: StateCovariance<T, N>,
}

impl<T: RealField + Copy, const N: usize> KalmanState<T, N> {
    #[inline]
    pub fn new(mean: StateVector<T, N>, covariance: StateCovariance<T, N>) -> Self {
        Self { mean, covariance }
    }

    #[inline]
    pub fn with_diagonal_covariance(
        mean: StateVector<T, N>,
        diagonal: &nalgebra::SVector<T, N>,
    ) -> Self {
        Self {
            mean,
            covariance: StateCovariance::from_diagonal(diagonal),
        }
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }
}

/// Corrects `state` with an already computed innovation.
///
/// `obs_matrix` is H for a linear sensor or the Jacobian at `state.mean` for
/// a nonlinear one. The returned covariance is symmetrized.
///
/// # Errors
/// [`FusionError::SingularMatrix`] if the innovation covariance cannot be inverted.
pub fn correct<T: RealField + Copy, const N: usize, const M: usize>(
    state: &KalmanState<T, N>,
    innovation: &Innovation<T, M>,
    obs_matrix: &ObservationMatrix<T, M, N>,
    meas_noise: &MeasurementCovariance<T, M>,
    form: CovarianceUpdate,
) -> Result<KalmanState<T, N>> {
    let innovation_cov = compute_innovation_covariance(&state.covariance, obs_matrix, meas_noise);
    let kalman_gain = compute_kalman_gain(&state.covariance, obs_matrix, &innovation_cov)
        .ok_or(FusionError::SingularMatrix)?;

    let mean = state.mean + kalman_gain.correct(innovation);
    let covariance = form.apply(&state.covariance, &kalman_gain, obs_matrix, meas_noise);

    Ok(KalmanState { mean, covariance })
}
