//! Evaluation helpers
//!
//! Accuracy metrics for comparing filter output with ground truth.

mod metrics;

pub use metrics::*;
