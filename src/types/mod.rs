//! Core types for type-safe vector spaces, named state and measurements

pub mod angles;
pub mod measurement;
pub mod spaces;
pub mod state;
pub mod transforms;
