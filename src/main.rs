//! Example usage of the ctrv-fusion library
//!
//! Tracks a single turning target with alternating position and
//! range/bearing/range-rate readings, then reports the RMSE against truth.

use ctrv_fusion::prelude::*;
use ctrv_fusion::utils::{rmse, GroundTruth};

/// Deterministic zero-mean jitter standing in for sensor noise.
fn jitter(k: usize, phase: f64, amplitude: f64) -> f64 {
    amplitude * (1.7 * k as f64 + phase).sin()
}

fn main() {
    println!("ctrv-fusion: CTRV Extended Kalman Filter");
    println!("========================================\n");

    let config = FilterConfig::default();
    let mut filter = match FusionFilter::new(config) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };

    // Truth: constant speed, constant turn rate
    let model = CtrvModel::new(0.0, 0.0);
    let mut truth_state = CtrvState::new(2.0, 1.0, 5.0, 0.0, 0.3);
    let dt = 0.05;
    let steps = 200;

    let mut estimates = Vec::with_capacity(steps);
    let mut truth = Vec::with_capacity(steps);

    for k in 0..steps {
        let t = k as f64 * dt;
        if k > 0 {
            let next = model.predict_nonlinear(&truth_state.to_vector(), dt);
            truth_state = CtrvState::from_vector(&next);
        }

        let measurement = if k % 2 == 0 {
            TimedMeasurement::position(
                t,
                truth_state.x + jitter(k, 0.0, 0.15),
                truth_state.y + jitter(k, 1.3, 0.15),
            )
        } else {
            let range = truth_state.x.hypot(truth_state.y);
            let bearing = truth_state.y.atan2(truth_state.x);
            let (vx, vy) = truth_state.velocity();
            let range_rate = (truth_state.x * vx + truth_state.y * vy) / range;
            TimedMeasurement::range_bearing_rate(
                t,
                range + jitter(k, 0.4, 0.02),
                bearing + jitter(k, 2.1, 0.01),
                range_rate + jitter(k, 0.9, 0.2),
            )
        };

        match filter.process_measurement(&measurement) {
            Ok(StepOutcome::UpdateSkipped(e)) => println!("t={:.2}: update skipped ({})", t, e),
            Ok(_) => {}
            Err(e) => {
                println!("t={:.2}: reading rejected ({})", t, e);
                continue;
            }
        }

        let Some(estimate) = filter.snapshot() else {
            continue;
        };
        let (vx, vy) = truth_state.velocity();
        estimates.push(estimate);
        truth.push(GroundTruth::new(truth_state.x, truth_state.y, vx, vy));

        if k % 20 == 0 {
            println!(
                "t={:5.2}  est pos=({:7.2}, {:7.2}) vel=({:6.2}, {:6.2})  true pos=({:7.2}, {:7.2})",
                t, estimate.x, estimate.y, estimate.vx, estimate.vy, truth_state.x, truth_state.y
            );
        }
    }

    println!();
    match rmse(&estimates, &truth) {
        Some(error) => println!(
            "RMSE: x={:.3} y={:.3} vx={:.3} vy={:.3}",
            error.x, error.y, error.vx, error.vy
        ),
        None => println!("RMSE: no estimates"),
    }
}
