//! Traits for tables of predictor entries.

/// Interface to a set-indexed table of predictor entries.
pub trait PredictorTable {
    /// The type of entry in the table.
    type Entry;

    /// Returns the number of sets in the table.
    fn num_sets(&self) -> usize;

    /// Given a program counter value, return the corresponding set.
    fn get_index(&self, pc: usize) -> usize;

    /// Returns a bitmask corresponding to the number of sets in the table.
    fn index_mask(&self) -> usize {
        assert!(self.num_sets().is_power_of_two());
        self.num_sets() - 1
    }
}

/// Interface to a *tagged* table of predictor entries.
pub trait TaggedPredictorTable: PredictorTable {
    fn get_tag(&self, pc: usize) -> usize;

    /// Returns a reference to the entry matching `pc`, if any.
    fn lookup(&self, pc: usize) -> Option<&Self::Entry>;

    /// Returns a mutable reference to the entry matching `pc`, if any.
    fn lookup_mut(&mut self, pc: usize) -> Option<&mut Self::Entry>;
}
