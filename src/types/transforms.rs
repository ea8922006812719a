//! Typed transformation matrices and the Kalman linear-algebra steps
//!
//! Matrices carry their source and target spaces, so a transition Jacobian
//! can only act on state vectors and a gain only maps innovations back into
//! state space.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{
    Innovation, InnovationSpace, Measurement, MeasurementCovariance, MeasurementSpace,
    StateCovariance, StateSpace, StateVector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A `ROWS × COLS` matrix mapping vectors of space `From` into space `To`.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }

    #[inline]
    pub fn into_matrix(self) -> SMatrix<T, ROWS, COLS> {
        self.inner
    }
}

impl<T: Scalar + Copy, const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<T, ROWS, COLS, To, From>
where
    SMatrix<T, ROWS, COLS>: Copy,
{
}

/// State transition (or transition Jacobian): StateSpace -> StateSpace
pub type TransitionMatrix<T, const N: usize> = Transform<T, N, N, StateSpace, StateSpace>;

/// Observation matrix (or observation Jacobian): StateSpace -> MeasurementSpace
pub type ObservationMatrix<T, const M: usize, const N: usize> =
    Transform<T, M, N, MeasurementSpace, StateSpace>;

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, InnovationSpace>;

impl<T: RealField + Copy, const N: usize> TransitionMatrix<T, N> {
    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    /// Propagates a covariance matrix: F * P * F^T
    #[inline]
    pub fn propagate_covariance(&self, cov: &StateCovariance<T, N>) -> StateCovariance<T, N> {
        StateCovariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<T: RealField + Copy, const M: usize, const N: usize> ObservationMatrix<T, M, N> {
    /// Applies a linear observation to a state vector: H * x
    #[inline]
    pub fn observe(&self, state: &StateVector<T, N>) -> Measurement<T, M> {
        Measurement::from_svector(self.inner * state.as_svector())
    }

    /// Projects state covariance to measurement space: H * P * H^T
    #[inline]
    pub fn project_covariance(&self, cov: &StateCovariance<T, N>) -> MeasurementCovariance<T, M> {
        MeasurementCovariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Maps an innovation to a state correction: K * y
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }
}

// ============================================================================
// Kalman Update Algebra
// ============================================================================

/// S = H * P * H^T + R
pub fn compute_innovation_covariance<T: RealField + Copy, const N: usize, const M: usize>(
    state_cov: &StateCovariance<T, N>,
    obs_matrix: &ObservationMatrix<T, M, N>,
    meas_noise: &MeasurementCovariance<T, M>,
) -> MeasurementCovariance<T, M> {
    obs_matrix.project_covariance(state_cov).add(meas_noise)
}

/// K = P * H^T * S^{-1}
///
/// Returns `None` when S is singular.
pub fn compute_kalman_gain<T: RealField + Copy, const N: usize, const M: usize>(
    state_cov: &StateCovariance<T, N>,
    obs_matrix: &ObservationMatrix<T, M, N>,
    innovation_cov: &MeasurementCovariance<T, M>,
) -> Option<KalmanGain<T, N, M>> {
    let s_inv = innovation_cov.as_matrix().try_inverse()?;
    let k = state_cov.as_matrix() * obs_matrix.as_matrix().transpose() * s_inv;

    // try_inverse can succeed on a numerically singular S and return huge or NaN entries
    if k.iter().all(|v| v.is_finite()) {
        Some(KalmanGain::from_matrix(k))
    } else {
        None
    }
}

/// How the posterior covariance is formed after a Kalman update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CovarianceUpdate {
    /// P = (I - K*H) * P
    #[default]
    Simple,
    /// P = (I - K*H) * P * (I - K*H)^T + K * R * K^T
    Joseph,
}

impl CovarianceUpdate {
    /// Computes the posterior covariance and symmetrizes it.
    pub fn apply<T: RealField + Copy, const N: usize, const M: usize>(
        self,
        state_cov: &StateCovariance<T, N>,
        kalman_gain: &KalmanGain<T, N, M>,
        obs_matrix: &ObservationMatrix<T, M, N>,
        meas_noise: &MeasurementCovariance<T, M>,
    ) -> StateCovariance<T, N> {
        let updated = match self {
            CovarianceUpdate::Simple => simple_covariance_update(state_cov, kalman_gain, obs_matrix),
            CovarianceUpdate::Joseph => {
                joseph_update(state_cov, kalman_gain, obs_matrix, meas_noise)
            }
        };
        updated.symmetrize()
    }
}

/// P = (I - K*H) * P * (I - K*H)^T + K * R * K^T
pub fn joseph_update<T: RealField + Copy, const N: usize, const M: usize>(
    state_cov: &StateCovariance<T, N>,
    kalman_gain: &KalmanGain<T, N, M>,
    obs_matrix: &ObservationMatrix<T, M, N>,
    meas_noise: &MeasurementCovariance<T, M>,
) -> StateCovariance<T, N> {
    let k = kalman_gain.as_matrix();
    let i_kh = SMatrix::<T, N, N>::identity() - k * obs_matrix.as_matrix();

    let term1 = i_kh * state_cov.as_matrix() * i_kh.transpose();
    let term2 = k * meas_noise.as_matrix() * k.transpose();

    StateCovariance::from_matrix(term1 + term2)
}

/// P = (I - K*H) * P
pub fn simple_covariance_update<T: RealField + Copy, const N: usize, const M: usize>(
    state_cov: &StateCovariance<T, N>,
    kalman_gain: &KalmanGain<T, N, M>,
    obs_matrix: &ObservationMatrix<T, M, N>,
) -> StateCovariance<T, N> {
    let i_kh = SMatrix::<T, N, N>::identity() - kalman_gain.as_matrix() * obs_matrix.as_matrix();
    StateCovariance::from_matrix(i_kh * state_cov.as_matrix())
}
