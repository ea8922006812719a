//! Extended Kalman Filter (EKF) over a nonlinear transition model
//!
//! The EKF propagates the mean through the nonlinear dynamics and the
//! covariance through their Jacobian. Measurements are incorporated either
//! through a linear observation model or through a nonlinear one linearized at
//! the predicted state, so a single filter fuses several sensor geometries.
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::filters::ekf::{EkfState, ExtendedKalmanFilter};
//! use ctrv_fusion::models::{CtrvModel, PositionSensor, RangeBearingRateSensor};
//! use ctrv_fusion::types::spaces::{Measurement, StateCovariance, StateVector};
//!
//! let filter = ExtendedKalmanFilter::new(CtrvModel::new(2.0, 0.3));
//! let lidar = PositionSensor::new(0.15, 0.15);
//! let radar = RangeBearingRateSensor::new(0.02, 0.01, 0.2);
//!
//! // [x, y, speed, heading, yaw_rate]
//! let mut state = EkfState::new(
//!     StateVector::from_array([1.0, 2.0, 5.0, 0.0, 1e-8]),
//!     StateCovariance::from_diagonal(&nalgebra::vector![0.25, 0.25, 0.3, 0.2, 1.0]),
//! );
//!
//! state = filter.predict(&state, 0.1).unwrap();
//! state = filter.update(&state, &Measurement::from_array([1.5, 2.0]), &lidar).unwrap();
//!
//! state = filter.predict(&state, 0.1).unwrap();
//! let z = Measurement::from_array([2.8, 0.8, 4.0]);
//! if let Ok(updated) = filter.update_nonlinear(&state, &z, &radar) {
//!     state = updated;
//! }
//! assert!(state.covariance.has_nonnegative_diagonal());
//! ```

use core::marker::PhantomData;

use nalgebra::RealField;
use num_traits::Float;

use super::kalman::correct;
use crate::models::{NonlinearObservationModel, NonlinearTransitionModel, ObservationModel};
use crate::types::spaces::{ComputeInnovation, Measurement};
use crate::types::transforms::CovarianceUpdate;
use crate::{FusionError, Result};

pub use super::kalman::KalmanState as EkfState;

/// An Extended Kalman Filter around a nonlinear transition model.
///
/// Observation models are passed per update, so the same filter (and the
/// same state) can be corrected by any sensor whose state dimension matches.
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFilter<T, Trans, const N: usize>
where
    T: RealField,
    Trans: NonlinearTransitionModel<T, N>,
{
    /// Nonlinear transition (motion) model
    pub transition: Trans,
    /// Posterior covariance form used by both update paths
    pub covariance_update: CovarianceUpdate,
    _marker: PhantomData<T>,
}

impl<T, Trans, const N: usize> ExtendedKalmanFilter<T, Trans, N>
where
    T: RealField + Float + Copy,
    Trans: NonlinearTransitionModel<T, N>,
{
    #[inline]
    pub fn new(transition: Trans) -> Self {
        Self {
            transition,
            covariance_update: CovarianceUpdate::default(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn with_covariance_update(mut self, form: CovarianceUpdate) -> Self {
        self.covariance_update = form;
        self
    }

    /// Performs the EKF prediction step.
    ///
    /// - x_pred = f(x, dt)
    /// - P_pred = F * P * F^T + Q, with F evaluated at the prior state and Q
    ///   at the propagated one
    ///
    /// # Errors
    /// [`FusionError::InvalidTimeStep`] if `dt` is negative or not finite.
    pub fn predict(&self, state: &EkfState<T, N>, dt: T) -> Result<EkfState<T, N>> {
        if !Float::is_finite(dt) || dt < T::zero() {
            return Err(FusionError::InvalidTimeStep);
        }

        let f = self.transition.jacobian_at(&state.mean, dt);
        let mean = self.transition.predict_nonlinear(&state.mean, dt);
        let q = self.transition.process_noise_at(&mean, dt);

        let covariance = f.propagate_covariance(&state.covariance).add(&q).symmetrize();

        Ok(EkfState { mean, covariance })
    }

    /// Updates with a linear sensor.
    ///
    /// - y = z - H * x
    /// - S = H * P * H^T + R, K = P * H^T * S^{-1}
    /// - x = x + K * y, P = (I - K*H) * P
    ///
    /// # Errors
    /// [`FusionError::SingularMatrix`] if S cannot be inverted.
    pub fn update<Obs, const M: usize>(
        &self,
        state: &EkfState<T, N>,
        measurement: &Measurement<T, M>,
        observation: &Obs,
    ) -> Result<EkfState<T, N>>
    where
        Obs: ObservationModel<T, N, M>,
    {
        let h = observation.observation_matrix();
        let r = observation.measurement_noise();
        let innovation = measurement.innovation(h.observe(&state.mean));

        let updated = correct(state, &innovation, &h, &r, self.covariance_update)?;
        Ok(self.normalized(updated))
    }

    /// Updates with a nonlinear sensor linearized at the predicted state.
    ///
    /// Same algebra as [`update`](Self::update) with y = z - h(x) (as defined
    /// by the sensor, e.g. with wrapped angles) and H = ∂h/∂x.
    ///
    /// # Errors
    /// - [`FusionError::DegenerateGeometry`] if the Jacobian is undefined at the state
    /// - [`FusionError::SingularMatrix`] if S cannot be inverted
    pub fn update_nonlinear<Obs, const M: usize>(
        &self,
        state: &EkfState<T, N>,
        measurement: &Measurement<T, M>,
        observation: &Obs,
    ) -> Result<EkfState<T, N>>
    where
        Obs: NonlinearObservationModel<T, N, M>,
    {
        let h = observation
            .jacobian_at(&state.mean)
            .ok_or(FusionError::DegenerateGeometry)?;
        let r = observation.measurement_noise();
        let predicted = observation.observe(&state.mean);
        let innovation = observation.innovation(*measurement, predicted);

        let updated = correct(state, &innovation, &h, &r, self.covariance_update)?;
        Ok(self.normalized(updated))
    }

    fn normalized(&self, state: EkfState<T, N>) -> EkfState<T, N> {
        EkfState {
            mean: self.transition.normalize_state(state.mean),
            covariance: state.covariance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CtrvModel, PositionSensor, RangeBearingRateSensor};
    use crate::types::spaces::StateVector;
    use crate::types::state::{IDX_HEADING, IDX_X, IDX_Y};
    use core::f64::consts::PI;

    fn filter() -> ExtendedKalmanFilter<f64, CtrvModel<f64>, 5> {
        ExtendedKalmanFilter::new(CtrvModel::new(2.0, 0.3))
    }

    fn prior(mean: [f64; 5]) -> EkfState<f64, 5> {
        EkfState::with_diagonal_covariance(
            StateVector::from_array(mean),
            &nalgebra::vector![0.25, 0.25, 0.3, 0.2, 1.0],
        )
    }

    #[test]
    fn test_predict_grows_uncertainty() {
        let state = prior([0.0, 0.0, 5.0, 0.3, 0.2]);
        let predicted = filter().predict(&state, 0.5).unwrap();

        assert!(predicted.uncertainty() > state.uncertainty());
        assert_eq!(predicted.covariance.asymmetry(), 0.0);
    }

    #[test]
    fn test_predict_zero_dt_keeps_state() {
        let state = prior([1.0, 2.0, 5.0, 0.3, 0.2]);
        let predicted = filter().predict(&state, 0.0).unwrap();

        assert!((predicted.mean.index(IDX_X) - 1.0).abs() < 1e-12);
        assert!((predicted.mean.index(IDX_Y) - 2.0).abs() < 1e-12);
        assert!((predicted.uncertainty() - state.uncertainty()).abs() < 1e-12);
    }

    #[test]
    fn test_predict_process_noise_follows_propagated_heading() {
        let ekf = filter();
        let state = prior([0.0, 0.0, 5.0, 0.0, 1.0]);
        let predicted = ekf.predict(&state, 1.0).unwrap();

        // Heading turns from 0 to 1 rad over the step
        assert!((predicted.mean.index(IDX_HEADING) - 1.0).abs() < 1e-12);

        let propagated = ekf
            .transition
            .jacobian_at(&state.mean, 1.0)
            .propagate_covariance(&state.covariance);
        let expected = propagated
            .add(&ekf.transition.process_noise_at(&predicted.mean, 1.0))
            .symmetrize();
        let at_prior = propagated
            .add(&ekf.transition.process_noise_at(&state.mean, 1.0))
            .symmetrize();

        for i in 0..5 {
            for j in 0..5 {
                let (a, b) = (predicted.covariance.as_matrix()[(i, j)], expected.as_matrix()[(i, j)]);
                assert!((a - b).abs() < 1e-12, "P[{},{}]: {} vs {}", i, j, a, b);
            }
        }
        assert!((predicted.covariance.as_matrix()[(0, 1)] - at_prior.as_matrix()[(0, 1)]).abs() > 1e-3);
    }

    #[test]
    fn test_predict_rejects_negative_dt() {
        let state = prior([0.0, 0.0, 5.0, 0.3, 0.2]);
        assert_eq!(filter().predict(&state, -0.1), Err(FusionError::InvalidTimeStep));
        assert_eq!(filter().predict(&state, f64::NAN), Err(FusionError::InvalidTimeStep));
    }

    #[test]
    fn test_linear_update_reduces_trace() {
        let sensor = PositionSensor::new(0.15, 0.15);
        let state = filter().predict(&prior([1.0, 2.0, 5.0, 0.0, 1e-8]), 0.1).unwrap();

        let z = Measurement::from_array([1.6, 2.1]);
        let updated = filter().update(&state, &z, &sensor).unwrap();

        assert!(updated.uncertainty() <= state.uncertainty());
        assert!((updated.mean.index(IDX_X) - 1.6).abs() < (state.mean.index(IDX_X) - 1.6).abs());
    }

    #[test]
    fn test_joseph_form_matches_simple_update() {
        let sensor = PositionSensor::new(0.15, 0.15);
        let state = prior([1.0, 2.0, 5.0, 0.0, 1e-8]);
        let z = Measurement::from_array([1.2, 1.9]);

        let simple = filter().update(&state, &z, &sensor).unwrap();
        let joseph = filter()
            .with_covariance_update(CovarianceUpdate::Joseph)
            .update(&state, &z, &sensor)
            .unwrap();

        assert!((simple.uncertainty() - joseph.uncertainty()).abs() < 1e-10);
    }

    #[test]
    fn test_nonlinear_update_across_bearing_cut() {
        // Target just above the negative x-axis, measured just below it
        let radar = RangeBearingRateSensor::new(0.02, 0.01, 0.2);
        let state = prior([-5.0, 0.05, 1.0, PI, 1e-8]);
        let z = Measurement::from_array([5.0, -PI + 0.005, 0.0]);

        let updated = filter().update_nonlinear(&state, &z, &radar).unwrap();

        // A 2π bearing residual would throw the target far off the circle
        let range = updated.mean.index(IDX_X).hypot(*updated.mean.index(IDX_Y));
        assert!((range - 5.0).abs() < 0.1, "range {}", range);
        assert!(*updated.mean.index(IDX_X) < -4.5);

        let heading = *updated.mean.index(IDX_HEADING);
        assert!(heading > -PI && heading <= PI);
    }

    #[test]
    fn test_nonlinear_update_at_origin_is_degenerate() {
        let radar = RangeBearingRateSensor::new(0.02, 0.01, 0.2);
        let state = prior([0.0, 0.0, 1.0, 0.0, 1e-8]);
        let z = Measurement::from_array([1.0, 0.0, 0.0]);

        assert_eq!(
            filter().update_nonlinear(&state, &z, &radar),
            Err(FusionError::DegenerateGeometry)
        );
    }

    /// Position sensor with no noise, used to force a singular S.
    struct NoiselessPosition;

    impl ObservationModel<f64, 5, 2> for NoiselessPosition {
        fn observation_matrix(&self) -> crate::types::transforms::ObservationMatrix<f64, 2, 5> {
            PositionSensor::new(1.0, 1.0).observation_matrix()
        }

        fn measurement_noise(&self) -> crate::types::spaces::MeasurementCovariance<f64, 2> {
            crate::types::spaces::MeasurementCovariance::zeros()
        }
    }

    #[test]
    fn test_update_with_singular_innovation_covariance() {
        // Position already known exactly and a noiseless sensor: S = 0
        let state = EkfState::with_diagonal_covariance(
            StateVector::from_array([1.0, 2.0, 5.0, 0.0, 1e-8]),
            &nalgebra::vector![0.0, 0.0, 0.3, 0.2, 1.0],
        );
        let z = Measurement::from_array([1.2, 1.9]);

        assert_eq!(
            filter().update(&state, &z, &NoiselessPosition),
            Err(FusionError::SingularMatrix)
        );
    }
}
