
/// Container for [`super::LoopPredictor`] runtime stats.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopPredictorStats {
    /// Calls to `should_end_loop`
    pub queries: usize,

    /// Queries that matched an entry in main storage
    pub hits: usize,

    /// Queries that predicted the end of a loop
    pub predicted_exits: usize,

    /// Predicted exits that collapsed two iterations
    pub double_exits: usize,

    /// Calls to `commit_loop_branch`
    pub commits: usize,

    /// Committed loop exits observed in training storage
    pub exits: usize,

    /// Entries moved from training into main storage
    pub promotions: usize,

    /// Speculative counts resynchronized by `recover`
    pub recoveries: usize,
}
impl LoopPredictorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of queries that matched main storage.
    pub fn hit_rate(&self) -> f64 {
        if self.queries == 0 { return 0.0; }
        self.hits as f64 / self.queries as f64
    }
}
