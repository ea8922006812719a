//! Estimators
//!
//! - [`ekf::ExtendedKalmanFilter`]: generic EKF over a nonlinear transition model
//! - [`fusion::FusionFilter`]: CTRV tracker fusing position and range/bearing/range-rate readings
//!
//! [`kalman`] holds the state container and the correction step both update
//! paths share.

pub mod ekf;
pub mod fusion;
pub mod kalman;
