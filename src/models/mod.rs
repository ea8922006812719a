//! Model traits for single-target tracking
//!
//! Target dynamics (transition) and sensor characteristics (observation).

mod observation;
mod transition;

pub use observation::*;
pub use transition::*;
