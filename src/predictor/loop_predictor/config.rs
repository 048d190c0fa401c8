
use crate::error::ConfigError;
use crate::predictor::*;

/// Configuration for a [`LoopPredictor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopPredictorConfig {
    /// Number of sets in main storage
    pub num_sets: usize,

    /// Nominal associativity of main storage
    pub num_ways: usize,

    /// Upper bound of the per-entry confidence counter
    pub max_confidence: u8,

    /// Number of implemented virtual address bits
    pub vaddr_bits: usize,

    /// Number of low-order bits dropped for instruction alignment
    pub inst_offset_bits: usize,

    /// Number of bits covering the instructions in one prediction block
    pub predict_width_bits: usize,

    /// Width of the trip and speculative counts. Only used to estimate
    /// storage.
    pub count_bits: usize,
}
impl Default for LoopPredictorConfig {
    fn default() -> Self {
        Self {
            num_sets: 64,
            num_ways: 4,
            max_confidence: DEFAULT_MAX_CONFIDENCE,
            vaddr_bits: 39,
            inst_offset_bits: 1,
            predict_width_bits: 4,
            count_bits: 10,
        }
    }
}
impl LoopPredictorConfig {
    pub fn new(num_sets: usize, num_ways: usize) -> Self {
        Self { num_sets, num_ways, ..Self::default() }
    }

    /// Number of index bits.
    pub fn index_bits(&self) -> usize {
        self.num_sets.next_power_of_two().ilog2() as usize
    }

    /// Number of tag bits left after alignment, predict-width and index
    /// bits are taken out of the address budget.
    pub fn tag_bits(&self) -> usize {
        self.vaddr_bits.saturating_sub(self.used_bits())
    }

    fn used_bits(&self) -> usize {
        self.inst_offset_bits + self.predict_width_bits + self.index_bits()
    }

    /// Get the [approximate] number of storage bits in main storage.
    pub fn storage_bits(&self) -> usize {
        let conf_bits = (u8::BITS - self.max_confidence.leading_zeros())
            as usize;
        let entry_size = 1 + self.tag_bits() + 2 * self.count_bits + conf_bits;
        entry_size * self.num_sets * self.num_ways
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_sets == 0 || !self.num_sets.is_power_of_two() {
            return Err(ConfigError::InvalidSetCount(self.num_sets));
        }
        if self.num_ways == 0 {
            return Err(ConfigError::ZeroWays);
        }
        if self.max_confidence == 0 {
            return Err(ConfigError::ZeroConfidence);
        }
        if self.tag_bits() == 0 {
            return Err(ConfigError::NoTagBits {
                vaddr_bits: self.vaddr_bits,
                used_bits: self.used_bits(),
            });
        }
        Ok(())
    }

    /// Use this configuration to create a new [`LoopPredictor`].
    pub fn build(self) -> Result<LoopPredictor, ConfigError> {
        self.validate()?;
        Ok(LoopPredictor::with_config(self))
    }
}
