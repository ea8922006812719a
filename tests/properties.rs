//! Randomized property checks for the motion model and the filter

mod common;

use common::{add_noise, alternating_reading, assert_covariance_valid, default_filter, simulate_ctrv};
use ctrv_fusion::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use core::f64::consts::PI;

#[test]
fn test_normalize_angle_properties() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..1000 {
        let phi: f64 = rng.random_range(-100.0_f64..100.0);
        let wrapped = normalize_angle(phi);

        assert!(wrapped > -PI && wrapped <= PI, "{} -> {}", phi, wrapped);
        assert_eq!(normalize_angle(wrapped), wrapped);

        // Same direction on the unit circle
        assert!((wrapped.sin() - phi.sin()).abs() < 1e-9);
        assert!((wrapped.cos() - phi.cos()).abs() < 1e-9);
    }
}

#[test]
fn test_turning_motion_stays_on_circle() {
    let model = CtrvModel::new(2.0, 0.3);
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..500 {
        let x: f64 = rng.random_range(-50.0_f64..50.0);
        let y: f64 = rng.random_range(-50.0_f64..50.0);
        let v: f64 = rng.random_range(0.5_f64..20.0);
        let theta: f64 = rng.random_range(-PI..PI);
        let sign: f64 = if rng.random::<bool>() { 1.0 } else { -1.0 };
        let omega = sign * rng.random_range(0.01_f64..2.0);
        let dt: f64 = rng.random_range(0.0_f64..1.0);

        let next = model.predict_nonlinear(&StateVector::from_array([x, y, v, theta, omega]), dt);
        let next = CtrvState::from_vector(&next);

        let radius = v / omega;
        let (cx, cy) = (x - radius * theta.sin(), y + radius * theta.cos());
        let distance = (next.x - cx).hypot(next.y - cy);

        assert!(
            (distance - radius.abs()).abs() < 1e-6 * radius.abs().max(1.0),
            "distance {} vs radius {}",
            distance,
            radius.abs()
        );
        assert!(angle_difference(next.heading, theta + omega * dt).abs() < 1e-9);
        assert_eq!(next.speed, v);
        assert_eq!(next.yaw_rate, omega);
    }
}

#[test]
fn test_straight_motion_consistency() {
    let model = CtrvModel::new(2.0, 0.3);
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..500 {
        let x: f64 = rng.random_range(-50.0_f64..50.0);
        let y: f64 = rng.random_range(-50.0_f64..50.0);
        let v: f64 = rng.random_range(0.0_f64..20.0);
        let theta: f64 = rng.random_range(-PI..PI);
        let omega: f64 = rng.random_range(-1e-4..1e-4);
        let dt: f64 = rng.random_range(0.0_f64..1.0);

        let next = model.predict_nonlinear(&StateVector::from_array([x, y, v, theta, omega]), dt);
        let next = CtrvState::from_vector(&next);

        assert!((next.x - (x + v * dt * theta.cos())).abs() < 1e-9);
        assert!((next.y - (y + v * dt * theta.sin())).abs() < 1e-9);
        assert!(angle_difference(next.heading, theta).abs() < 1e-12);
        assert_eq!(next.yaw_rate, STRAIGHT_LINE_YAW_RATE);
    }
}

#[test]
fn test_covariance_valid_under_random_sequences() {
    let mut rng = StdRng::seed_from_u64(4);

    for trial in 0..20 {
        let initial = CtrvState::new(
            rng.random_range(5.0_f64..30.0),
            rng.random_range(5.0_f64..30.0),
            rng.random_range(1.0_f64..10.0),
            rng.random_range(-PI..PI),
            rng.random_range(-0.5_f64..0.5),
        );
        let dt = rng.random_range(0.01_f64..0.1);
        let truth = simulate_ctrv(initial, dt, 100);

        let mut filter = default_filter();
        let mut t = 0.0;
        for (k, state) in truth.iter().enumerate() {
            // Random sensor choice per step
            let reading = alternating_reading(k + rng.random_range(0..2), t, state);
            filter.process_measurement(&add_noise(reading, &mut rng)).unwrap();
            assert_covariance_valid(&filter, &format!("trial {} step {}", trial, k));
            t += dt;
        }
    }
}

#[test]
fn test_position_update_never_increases_trace() {
    let mut rng = StdRng::seed_from_u64(5);
    let ekf = ExtendedKalmanFilter::new(CtrvModel::new(2.0, 0.3));
    let sensor = PositionSensor::new(0.15, 0.15);

    for _ in 0..200 {
        let mean = StateVector::from_array([
            rng.random_range(-20.0_f64..20.0),
            rng.random_range(-20.0_f64..20.0),
            rng.random_range(0.0_f64..10.0),
            rng.random_range(-PI..PI),
            rng.random_range(-1.0_f64..1.0),
        ]);
        let prior = EkfState::with_diagonal_covariance(
            mean,
            &nalgebra::vector![0.25, 0.25, 0.3, 0.2, 1.0],
        );
        let predicted = ekf.predict(&prior, rng.random_range(0.0_f64..0.5)).unwrap();
        let z = Measurement::from_array([
            rng.random_range(-20.0_f64..20.0),
            rng.random_range(-20.0_f64..20.0),
        ]);

        let updated = ekf.update(&predicted, &z, &sensor).unwrap();
        assert!(updated.uncertainty() <= predicted.uncertainty() + 1e-12);
    }
}
