//! Predictor components.

pub mod table;
pub mod counter;
pub mod loop_predictor;

pub use table::*;
pub use counter::*;
pub use loop_predictor::*;
