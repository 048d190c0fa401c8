//! Speculation-aware front-end components for a decoupled branch
//! prediction pipeline: a fetch target queue and a loop predictor.

pub mod branch;
pub mod error;
pub mod ftq;
pub mod predictor;
pub mod sim;
pub mod stats;

pub use branch::*;
pub use error::*;
pub use ftq::*;
pub use predictor::*;
