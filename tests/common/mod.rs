//! Common helpers for fusion filter integration tests

#![allow(dead_code)]

use ctrv_fusion::prelude::*;
use ctrv_fusion::utils::GroundTruth;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Sensor noise std devs used when simulating readings (match the defaults)
pub const STD_POSITION: f64 = 0.15;
pub const STD_RANGE: f64 = 0.02;
pub const STD_BEARING: f64 = 0.01;
pub const STD_RANGE_RATE: f64 = 0.2;

/// Filter with default configuration
pub fn default_filter() -> FusionFilter<f64> {
    FusionFilter::new(FilterConfig::default()).expect("default configuration is valid")
}

/// Noise-free CTRV trajectory sampled every `dt`, starting at `initial`.
pub fn simulate_ctrv(initial: CtrvState<f64>, dt: f64, steps: usize) -> Vec<CtrvState<f64>> {
    let model = CtrvModel::new(0.0, 0.0);
    let mut trajectory = Vec::with_capacity(steps);
    let mut state = initial;
    for _ in 0..steps {
        trajectory.push(state);
        state = CtrvState::from_vector(&model.predict_nonlinear(&state.to_vector(), dt));
    }
    trajectory
}

/// Exact position reading of `truth`
pub fn position_reading(t: f64, truth: &CtrvState<f64>) -> TimedMeasurement<f64> {
    TimedMeasurement::position(t, truth.x, truth.y)
}

/// Exact range/bearing/range-rate reading of `truth`
pub fn polar_reading(t: f64, truth: &CtrvState<f64>) -> TimedMeasurement<f64> {
    let range = truth.x.hypot(truth.y);
    let (vx, vy) = truth.velocity();
    TimedMeasurement::range_bearing_rate(
        t,
        range,
        truth.y.atan2(truth.x),
        (truth.x * vx + truth.y * vy) / range,
    )
}

/// Alternates position (even steps) and polar (odd steps) readings.
pub fn alternating_reading(k: usize, t: f64, truth: &CtrvState<f64>) -> TimedMeasurement<f64> {
    if k % 2 == 0 {
        position_reading(t, truth)
    } else {
        polar_reading(t, truth)
    }
}

/// Adds zero-mean Gaussian noise with the simulation std devs.
pub fn add_noise(measurement: TimedMeasurement<f64>, rng: &mut StdRng) -> TimedMeasurement<f64> {
    let mut sample = |std: f64| Normal::new(0.0, std).unwrap().sample(&mut *rng);
    let reading = match measurement.reading {
        SensorReading::Position { x, y } => SensorReading::Position {
            x: x + sample(STD_POSITION),
            y: y + sample(STD_POSITION),
        },
        SensorReading::RangeBearingRate {
            range,
            bearing,
            range_rate,
        } => SensorReading::RangeBearingRate {
            range: range + sample(STD_RANGE),
            bearing: bearing + sample(STD_BEARING),
            range_rate: range_rate + sample(STD_RANGE_RATE),
        },
    };
    TimedMeasurement::new(measurement.timestamp, reading)
}

pub fn ground_truth(state: &CtrvState<f64>) -> GroundTruth<f64> {
    let (vx, vy) = state.velocity();
    GroundTruth::new(state.x, state.y, vx, vy)
}

/// Checks the covariance is symmetric with a non-negative, finite diagonal.
pub fn assert_covariance_valid(filter: &FusionFilter<f64>, context: &str) {
    let p = filter.covariance().expect("filter is tracking");
    assert_eq!(p.asymmetry(), 0.0, "{}: covariance not symmetric", context);
    for i in 0..CTRV_DIM {
        let var = p.variance(i);
        assert!(var.is_finite() && var >= 0.0, "{}: P[{},{}] = {}", context, i, i, var);
    }
}
