//! Errors reported while building front-end components.

use thiserror::Error;

/// Reasons a [`crate::predictor::LoopPredictorConfig`] cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("number of sets must be a non-zero power of two (got {0})")]
    InvalidSetCount(usize),

    #[error("number of ways must be non-zero")]
    ZeroWays,

    #[error("maximum confidence must be non-zero")]
    ZeroConfidence,

    /// The address budget is consumed entirely by alignment, predict-width
    /// and index bits.
    #[error("no tag bits left: {vaddr_bits} address bits, {used_bits} used for offset and index")]
    NoTagBits {
        vaddr_bits: usize,
        used_bits: usize,
    },
}
