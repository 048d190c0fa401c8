//! Implementation of a saturating confidence counter.

/// Default upper bound for a [`ConfidenceCounter`].
pub const DEFAULT_MAX_CONFIDENCE: u8 = 7;

/// A counter bounded to `[0, max]` used to track how consistently a branch
/// repeats its behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfidenceCounter {
    max: u8,
    ctr: u8,
}
impl ConfidenceCounter {
    pub fn new(max: u8) -> Self {
        Self { max, ctr: 0 }
    }

    pub fn strengthen(&mut self) {
        self.ctr = self.ctr.saturating_add(1).clamp(0, self.max);
    }

    pub fn weaken(&mut self) {
        self.ctr = self.ctr.saturating_sub(1);
    }

    /// Strengthen on 'true', weaken otherwise.
    pub fn update(&mut self, agree: bool) {
        if agree { self.strengthen(); } else { self.weaken(); }
    }

    pub fn value(&self) -> u8 { self.ctr }
    pub fn max(&self) -> u8 { self.max }
    pub fn is_saturated(&self) -> bool { self.ctr == self.max }

    pub fn reset(&mut self) {
        self.ctr = 0;
    }
}
impl Default for ConfidenceCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONFIDENCE)
    }
}
