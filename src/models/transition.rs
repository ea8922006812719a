//! Transition (motion) models for target dynamics
//!
//! The constant turn-rate and velocity (CTRV) model moves the target along a
//! circular arc at constant speed, degrading to a straight line when the turn
//! rate is negligible.

use nalgebra::{convert, RealField};
use num_traits::Float;

use crate::types::angles::normalize_angle;
use crate::types::spaces::{StateCovariance, StateVector};
use crate::types::state::{CTRV_DIM, IDX_HEADING, IDX_SPEED, IDX_X, IDX_Y, IDX_YAW_RATE};
use crate::types::transforms::TransitionMatrix;

/// Turn rates at or below this magnitude use the straight-line branch.
pub const TURN_RATE_EPSILON: f64 = 1e-4;

/// Turn rate written back by the straight-line branch.
pub const STRAIGHT_LINE_YAW_RATE: f64 = 1e-7;

/// Trait for nonlinear transition models used by the EKF.
///
/// Describes dynamics of the form x_{k+1} = f(x_k, dt) + w, linearized through
/// the Jacobian F = ∂f/∂x evaluated at the pre-transition state.
pub trait NonlinearTransitionModel<T: RealField, const N: usize> {
    /// Applies the nonlinear dynamics f(x, dt).
    fn predict_nonlinear(&self, state: &StateVector<T, N>, dt: T) -> StateVector<T, N>;

    /// Jacobian ∂f/∂x at `state` for time step `dt`.
    fn jacobian_at(&self, state: &StateVector<T, N>, dt: T) -> TransitionMatrix<T, N>;

    /// Process noise covariance Q, evaluated at the propagated state.
    fn process_noise_at(&self, state: &StateVector<T, N>, dt: T) -> StateCovariance<T, N>;

    /// Canonicalizes a state after any write (e.g. wraps angular components).
    fn normalize_state(&self, state: StateVector<T, N>) -> StateVector<T, N> {
        state
    }
}

// ============================================================================
// CTRV
// ============================================================================

/// Constant turn-rate and velocity model in 2D.
///
/// State: [x, y, speed, heading, yaw_rate]
///
/// With ω the yaw rate and θ the heading:
/// - x' = x + (v/ω)[sin(θ + ωΔt) − sin θ]
/// - y' = y + (v/ω)[cos θ − cos(θ + ωΔt)]
/// - θ' = θ + ωΔt
///
/// and v, ω unchanged. For |ω| ≤ [`TURN_RATE_EPSILON`] the position is
/// integrated along a straight line instead.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CtrvModel<T> {
    /// Standard deviation of longitudinal acceleration noise
    pub sigma_a: T,
    /// Standard deviation of yaw acceleration noise
    pub sigma_yaw_accel: T,
}

impl<T: RealField + Float + Copy> CtrvModel<T> {
    /// Creates a new CTRV model.
    ///
    /// # Panics
    /// Panics if either noise parameter is negative.
    pub fn new(sigma_a: T, sigma_yaw_accel: T) -> Self {
        assert!(sigma_a >= T::zero(), "Process noise sigma_a must be non-negative");
        assert!(
            sigma_yaw_accel >= T::zero(),
            "Process noise sigma_yaw_accel must be non-negative"
        );
        Self {
            sigma_a,
            sigma_yaw_accel,
        }
    }

    #[inline]
    fn is_turning(yaw_rate: T) -> bool {
        let eps: T = convert(TURN_RATE_EPSILON);
        Float::abs(yaw_rate) > eps
    }
}

impl<T: RealField + Float + Copy> NonlinearTransitionModel<T, CTRV_DIM> for CtrvModel<T> {
    fn predict_nonlinear(&self, state: &StateVector<T, CTRV_DIM>, dt: T) -> StateVector<T, CTRV_DIM> {
        let x = *state.index(IDX_X);
        let y = *state.index(IDX_Y);
        let v = *state.index(IDX_SPEED);
        let theta = *state.index(IDX_HEADING);
        let omega = *state.index(IDX_YAW_RATE);

        if Self::is_turning(omega) {
            let theta_new = theta + omega * dt;
            let v_over_omega = v / omega;
            let x_new = x + v_over_omega * (Float::sin(theta_new) - Float::sin(theta));
            let y_new = y + v_over_omega * (Float::cos(theta) - Float::cos(theta_new));

            StateVector::from_array([x_new, y_new, v, normalize_angle(theta_new), omega])
        } else {
            let (sin_t, cos_t) = Float::sin_cos(theta);
            StateVector::from_array([
                x + v * dt * cos_t,
                y + v * dt * sin_t,
                v,
                normalize_angle(theta),
                convert(STRAIGHT_LINE_YAW_RATE),
            ])
        }
    }

    fn jacobian_at(&self, state: &StateVector<T, CTRV_DIM>, dt: T) -> TransitionMatrix<T, CTRV_DIM> {
        let v = *state.index(IDX_SPEED);
        let theta = *state.index(IDX_HEADING);
        let omega = *state.index(IDX_YAW_RATE);
        let one = T::one();
        let zero = T::zero();

        let (dx_dv, dx_dtheta, dx_domega, dy_dv, dy_dtheta, dy_domega) = if Self::is_turning(omega)
        {
            let theta_new = theta + omega * dt;
            let (sin_t, cos_t) = Float::sin_cos(theta);
            let (sin_n, cos_n) = Float::sin_cos(theta_new);
            let inv_omega = one / omega;
            let v_over_omega = v * inv_omega;
            let v_over_omega_sq = v_over_omega * inv_omega;

            let sin_delta = sin_n - sin_t;
            let cos_delta = cos_t - cos_n;

            (
                inv_omega * sin_delta,
                v_over_omega * (cos_n - cos_t),
                dt * v_over_omega * cos_n - v_over_omega_sq * sin_delta,
                inv_omega * cos_delta,
                v_over_omega * sin_delta,
                dt * v_over_omega * sin_n - v_over_omega_sq * cos_delta,
            )
        } else {
            let (sin_t, cos_t) = Float::sin_cos(theta);
            (
                dt * cos_t,
                -dt * v * sin_t,
                zero,
                dt * sin_t,
                dt * v * cos_t,
                zero,
            )
        };

        TransitionMatrix::from_matrix(nalgebra::matrix![
            one, zero, dx_dv, dx_dtheta, dx_domega;
            zero, one, dy_dv, dy_dtheta, dy_domega;
            zero, zero, one, zero, zero;
            zero, zero, zero, one, dt;
            zero, zero, zero, zero, one
        ])
    }

    /// Discrete white-noise acceleration model, coupling the longitudinal
    /// acceleration noise to the direction of travel.
    fn process_noise_at(&self, state: &StateVector<T, CTRV_DIM>, dt: T) -> StateCovariance<T, CTRV_DIM> {
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        let half: T = convert(0.5);
        let quarter: T = convert(0.25);

        let sa2 = self.sigma_a * self.sigma_a;
        let sw2 = self.sigma_yaw_accel * self.sigma_yaw_accel;
        let (s, c) = Float::sin_cos(*state.index(IDX_HEADING));
        let zero = T::zero();

        let q11 = quarter * dt4 * sa2 * c * c;
        let q12 = quarter * dt4 * sa2 * s * c;
        let q13 = half * dt3 * sa2 * c;
        let q22 = quarter * dt4 * sa2 * s * s;
        let q23 = half * dt3 * sa2 * s;
        let q33 = dt2 * sa2;

        let q44 = quarter * dt4 * sw2;
        let q45 = half * dt3 * sw2;
        let q55 = dt2 * sw2;

        StateCovariance::from_matrix(nalgebra::matrix![
            q11, q12, q13, zero, zero;
            q12, q22, q23, zero, zero;
            q13, q23, q33, zero, zero;
            zero, zero, zero, q44, q45;
            zero, zero, zero, q45, q55
        ])
    }

    fn normalize_state(&self, state: StateVector<T, CTRV_DIM>) -> StateVector<T, CTRV_DIM> {
        let heading = normalize_angle(*state.index(IDX_HEADING));
        state.with_component(IDX_HEADING, heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn model() -> CtrvModel<f64> {
        CtrvModel::new(2.0, 0.3)
    }

    #[test]
    fn test_ctrv_straight_line() {
        let state = StateVector::from_array([1.0, 2.0, 10.0, FRAC_PI_4, 0.0]);
        let dt = 0.5;

        let predicted = model().predict_nonlinear(&state, dt);

        let expected_x = 1.0 + 10.0 * dt * FRAC_PI_4.cos();
        let expected_y = 2.0 + 10.0 * dt * FRAC_PI_4.sin();
        assert!((predicted.index(IDX_X) - expected_x).abs() < 1e-10);
        assert!((predicted.index(IDX_Y) - expected_y).abs() < 1e-10);
        assert!((predicted.index(IDX_HEADING) - FRAC_PI_4).abs() < 1e-12);
        assert_eq!(*predicted.index(IDX_YAW_RATE), STRAIGHT_LINE_YAW_RATE);
    }

    #[test]
    fn test_ctrv_small_turn_matches_straight_line() {
        // Just above the threshold the arc integral must agree with the line
        let state = StateVector::from_array([0.0, 0.0, 5.0, 0.3, 2.0 * TURN_RATE_EPSILON]);
        let dt = 0.1;

        let predicted = model().predict_nonlinear(&state, dt);

        assert!((predicted.index(IDX_X) - 0.5 * 0.3_f64.cos()).abs() < 1e-5);
        assert!((predicted.index(IDX_Y) - 0.5 * 0.3_f64.sin()).abs() < 1e-5);
    }

    #[test]
    fn test_ctrv_quarter_turn() {
        // Heading east at 10, turning left at pi/2 rad/s for 1 s
        let state = StateVector::from_array([0.0, 0.0, 10.0, 0.0, FRAC_PI_2]);

        let predicted = model().predict_nonlinear(&state, 1.0);

        let r = 10.0 / FRAC_PI_2;
        assert!((predicted.index(IDX_X) - r).abs() < 1e-9, "x: {}", predicted.index(IDX_X));
        assert!((predicted.index(IDX_Y) - r).abs() < 1e-9, "y: {}", predicted.index(IDX_Y));
        assert!((predicted.index(IDX_HEADING) - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(*predicted.index(IDX_SPEED), 10.0);
        assert_eq!(*predicted.index(IDX_YAW_RATE), FRAC_PI_2);
    }

    #[test]
    fn test_ctrv_heading_wraps_past_pi() {
        let omega = 1.0;
        let dt = 0.5;
        let state = StateVector::from_array([0.0, 0.0, 1.0, 3.0, omega]);

        let predicted = model().predict_nonlinear(&state, dt);
        let heading = *predicted.index(IDX_HEADING);

        assert!((heading - (3.0 + omega * dt - 2.0 * PI)).abs() < 1e-12);
        assert!(heading > -PI && heading <= PI);
    }

    fn assert_jacobian_matches_numerical(state: [f64; 5], dt: f64) {
        let m = model();
        let x0 = StateVector::from_array(state);
        let analytic = m.jacobian_at(&x0, dt);
        let eps = 1e-6;

        for col in 0..5 {
            // Perturbing the yaw rate across the branch threshold would compare two models
            if col == IDX_YAW_RATE && state[IDX_YAW_RATE].abs() <= TURN_RATE_EPSILON {
                continue;
            }
            let mut plus = state;
            let mut minus = state;
            plus[col] += eps;
            minus[col] -= eps;
            let f_plus = m.predict_nonlinear(&StateVector::from_array(plus), dt);
            let f_minus = m.predict_nonlinear(&StateVector::from_array(minus), dt);

            for row in 0..4 {
                let mut diff = f_plus.index(row) - f_minus.index(row);
                if row == IDX_HEADING {
                    diff = normalize_angle(diff);
                }
                let numerical = diff / (2.0 * eps);
                let a = analytic.as_matrix()[(row, col)];
                assert!(
                    (numerical - a).abs() < 1e-4,
                    "d{}/d{}: numerical {} vs analytical {}",
                    row,
                    col,
                    numerical,
                    a
                );
            }
        }
    }

    #[test]
    fn test_ctrv_jacobian_turning_vs_numerical() {
        assert_jacobian_matches_numerical([5.0, 3.0, 8.0, 0.7, 0.4], 0.5);
        assert_jacobian_matches_numerical([-2.0, 1.0, 3.0, -2.5, -1.2], 0.1);
    }

    #[test]
    fn test_ctrv_jacobian_straight_vs_numerical() {
        assert_jacobian_matches_numerical([5.0, 3.0, 8.0, 0.7, 0.0], 0.5);
    }

    #[test]
    fn test_process_noise_structure() {
        let m = model();
        let state = StateVector::from_array([0.0, 0.0, 1.0, 0.6, 0.1]);
        let q = m.process_noise_at(&state, 0.1);

        assert_eq!(q.asymmetry(), 0.0);
        assert!(q.has_nonnegative_diagonal());
        for i in 0..3 {
            for j in 3..5 {
                assert_eq!(q.as_matrix()[(i, j)], 0.0);
                assert_eq!(q.as_matrix()[(j, i)], 0.0);
            }
        }
        // Position block is the outer product of the direction of travel
        let q11 = q.as_matrix()[(0, 0)];
        let q22 = q.as_matrix()[(1, 1)];
        let q12 = q.as_matrix()[(0, 1)];
        assert!((q11 * q22 - q12 * q12).abs() < 1e-18);
    }

    #[test]
    fn test_process_noise_zero_dt() {
        let state = StateVector::from_array([0.0, 0.0, 1.0, 0.6, 0.1]);
        let q = model().process_noise_at(&state, 0.0);
        assert_eq!(q.trace(), 0.0);
    }
}
