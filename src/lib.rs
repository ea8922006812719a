//! CTRV-Fusion: Extended Kalman Filter for 2D kinematic tracking
//!
//! Estimates position, speed, heading and turn rate of a single object from
//! asynchronous measurements of two sensor kinds:
//!
//! - a linear position sensor observing `(x, y)`
//! - a nonlinear range / bearing / range-rate sensor
//!
//! # Features
//!
//! - **Type Safety**: State, measurement and innovation spaces encoded in the type system
//! - **CTRV Motion**: Constant turn-rate and velocity model with a singularity-safe integral
//! - **no_std Support**: Works in embedded environments

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod config;
pub mod filters;
pub mod models;
pub mod types;
pub mod utils;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::filters::ekf::*;
    pub use crate::filters::fusion::*;
    pub use crate::models::*;
    pub use crate::types::angles::*;
    pub use crate::types::measurement::*;
    pub use crate::types::spaces::*;
    pub use crate::types::state::*;
    pub use crate::types::transforms::*;
    pub use crate::{FusionError, Result};
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq)]
pub enum FusionError {
    /// Innovation covariance is singular and cannot be inverted
    SingularMatrix,
    /// Observation Jacobian is undefined at the current state (target at the sensor origin)
    DegenerateGeometry,
    /// Elapsed time between measurements is negative or not finite
    InvalidTimeStep,
    /// An operation required a seeded state but the filter has not seen a measurement yet
    NotInitialized,
    /// Raw measurement record has the wrong field count or non-finite values
    MalformedMeasurement,
    /// Configuration override used a key that is not recognized
    UnknownConfigKey,
    /// Configuration value out of its valid range
    InvalidConfig(&'static str),
}

#[cfg(feature = "std")]
impl std::error::Error for FusionError {}

impl ::core::fmt::Display for FusionError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            FusionError::SingularMatrix => write!(f, "Innovation covariance is singular"),
            FusionError::DegenerateGeometry => {
                write!(f, "Observation Jacobian undefined at sensor origin")
            }
            FusionError::InvalidTimeStep => write!(f, "Time step is negative or not finite"),
            FusionError::NotInitialized => write!(f, "Filter has not been initialized"),
            FusionError::MalformedMeasurement => write!(f, "Malformed measurement record"),
            FusionError::UnknownConfigKey => write!(f, "Unknown configuration key"),
            FusionError::InvalidConfig(what) => write!(f, "Invalid configuration: {}", what),
        }
    }
}

pub type Result<T> = ::core::result::Result<T, FusionError>;
