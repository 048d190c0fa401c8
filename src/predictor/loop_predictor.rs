//! A loop predictor for backward branches.
//!
//! Branches are first learned in an untagged training storage at commit
//! time. The first time a branch is seen exiting its loop it is promoted
//! into tagged, set-indexed main storage. Only main storage is consulted
//! when predicting.
//!
//! Each entry carries a committed trip count, a speculative count advanced
//! along the predicted path, and a confidence counter which only moves when
//! a loop exit is committed.

pub mod config;
pub mod stat;
pub mod storage;

pub use config::*;
pub use stat::*;
pub use storage::*;

use tracing::{ debug, trace };
use crate::predictor::*;

/// Snapshot taken when a loop branch is queried, used to undo speculative
/// updates if the query turns out to be on a squashed path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopRedirectInfo {
    /// The branch that was queried
    pub branch_pc: usize,

    /// Copy of the matching main-storage entry. Invalid when there was no
    /// match.
    pub entry: LoopEntry,

    /// Whether the query declared the end of the loop
    pub end_loop: bool,
}
impl LoopRedirectInfo {
    /// Returns 'true' when the snapshot comes from a main-storage entry with
    /// at least `threshold` confidence.
    pub fn is_confident(&self, threshold: u8) -> bool {
        self.entry.valid && self.entry.conf.value() >= threshold
    }
}

/// Output from [`LoopPredictor::should_end_loop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopPrediction {
    /// The loop is predicted to exit at this branch
    pub end_loop: bool,

    /// Two iterations were collapsed into a single prediction block
    pub is_double: bool,

    pub info: LoopRedirectInfo,
}
impl LoopPrediction {
    fn none(info: LoopRedirectInfo) -> Self {
        Self { end_loop: false, is_double: false, info }
    }
}

pub struct LoopPredictor {
    /// The configuration used to create this object
    pub cfg: LoopPredictorConfig,

    pub stat: LoopPredictorStats,

    /// Promoted loop branches
    storage: LoopStorage,

    /// Loop branches still being learned
    training: TrainingStorage,
}
impl LoopPredictor {
    /// Create a predictor with the default parameters and the given
    /// geometry.
    pub fn new(num_sets: usize, num_ways: usize)
        -> Result<Self, crate::error::ConfigError>
    {
        LoopPredictorConfig::new(num_sets, num_ways).build()
    }

    /// Expects a validated configuration.
    pub(crate) fn with_config(cfg: LoopPredictorConfig) -> Self {
        let slicer = AddrSlicer::new(
            cfg.inst_offset_bits, cfg.index_bits(), cfg.tag_bits()
        );
        Self {
            storage: LoopStorage::new(cfg.num_sets, slicer),
            training: TrainingStorage::new(slicer),
            stat: LoopPredictorStats::new(),
            cfg,
        }
    }

    pub fn stats(&self) -> &LoopPredictorStats { &self.stat }

    /// Returns the main-storage entry for `pc`, if promoted.
    pub fn main_entry(&self, pc: usize) -> Option<&LoopEntry> {
        self.storage.lookup(pc)
    }

    /// Returns the training entry for `pc`, if tracked.
    pub fn training_entry(&self, pc: usize) -> Option<&LoopEntry> {
        self.training.lookup(pc)
    }

    /// Returns the number of iterations left before the promoted loop at
    /// `pc` is expected to exit.
    pub fn remaining_iterations(&self, pc: usize) -> Option<i64> {
        self.storage.lookup(pc).map(|e| e.remaining())
    }

    /// Returns 'true' if `pc` is tracked in either storage.
    pub fn find_loop_branch_in_storage(&self, pc: usize) -> bool {
        self.training.lookup(pc).is_some() || self.storage.lookup(pc).is_some()
    }
}

impl Default for LoopPredictor {
    fn default() -> Self {
        Self::with_config(LoopPredictorConfig::default())
    }
}

impl LoopPredictor {
    /// Decide whether the loop branch at `branch_pc` ends its loop on this
    /// pass. `taken` is the direction predicted for the branch elsewhere.
    ///
    /// When `may_be_double` is set, the prediction block may span two
    /// iterations of the loop and the speculative count advances by two.
    pub fn should_end_loop(&mut self,
        taken: bool,
        branch_pc: usize,
        may_be_double: bool,
    ) -> LoopPrediction
    {
        trace!("query loop branch: taken: {}, pc: {:#x}, is_double: {}",
            taken, branch_pc, may_be_double
        );
        self.stat.queries += 1;

        let mut info = LoopRedirectInfo {
            branch_pc,
            entry: LoopEntry::default(),
            end_loop: false,
        };
        let idx = self.storage.get_index(branch_pc);
        let tag = self.storage.get_tag(branch_pc);
        let way = match self.storage.lookup_mut(branch_pc) {
            Some(way) => way,
            None => return LoopPrediction::none(info),
        };
        self.stat.hits += 1;
        info.entry = *way;

        let remaining = way.remaining();
        debug!("found loop entry idx {}, tag {:#x}: trip: {}, spec: {}, conf: {}",
            idx, tag, way.trip_cnt, way.spec_cnt, way.conf.value()
        );

        if !taken {
            debug!("predicted not taken, setting spec to 0");
            way.spec_cnt = 0;
            return LoopPrediction::none(info);
        }

        let is_double = remaining == 1 && may_be_double;
        if remaining == 0 || is_double {
            debug!("loop end detected, doubling is {}, setting spec to 0",
                is_double
            );
            way.spec_cnt = 0;
            info.end_loop = true;
            self.stat.predicted_exits += 1;
            if is_double {
                self.stat.double_exits += 1;
            }
            return LoopPrediction { end_loop: true, is_double, info };
        }

        if remaining >= 1 {
            way.spec_cnt += if may_be_double { 2 } else { 1 };
            return LoopPrediction {
                end_loop: false,
                is_double: may_be_double,
                info,
            };
        }

        // The speculative count overshot the trip count
        trace!("spec {} beyond trip {}, no prediction",
            way.spec_cnt, way.trip_cnt
        );
        LoopPrediction::none(info)
    }

    /// Train on a retired loop branch. Must be called once per dynamic
    /// instance, in program order.
    ///
    /// Returns 'true' if this instance exited a loop being tracked in
    /// training storage.
    pub fn commit_loop_branch(&mut self,
        pc: usize,
        target: usize,
        fall_thru_pc: usize,
        mispredicted: bool,
    ) -> bool
    {
        debug!("Commit loop branch: pc: {:#x}, target: {:#x}, fall-through: {:#x}",
            pc, target, fall_thru_pc
        );
        self.stat.commits += 1;

        let taken_backward = target < pc;
        let max_confidence = self.cfg.max_confidence;

        let way = match self.training.lookup_mut(pc) {
            Some(way) => way,
            None => {
                debug!("creating new entry for loop branch {:#x}, tag {:#x}",
                    pc, self.training.get_tag(pc)
                );
                self.training.insert(pc, LoopEntry::new(0, 1, max_confidence));
                return false;
            },
        };
        debug!("found training entry: trip: {}, spec: {}, conf: {}",
            way.trip_cnt, way.spec_cnt, way.conf.value()
        );

        if taken_backward {
            way.spec_cnt += 1;
            return false;
        }

        // The loop just exited: compare this trip against the last one
        let trip_cnt = way.spec_cnt;
        way.conf.update(trip_cnt == way.trip_cnt);
        let conf = way.conf;
        way.trip_cnt = trip_cnt;
        way.spec_cnt = 0;
        self.stat.exits += 1;

        let idx = self.storage.get_index(pc);
        let tag = self.storage.get_tag(pc);
        match self.storage.lookup_mut(pc) {
            Some(main) => {
                debug!("loop end of promoted branch, updating conf to {}, mispred {}",
                    conf.value(), mispredicted
                );
                main.conf = conf;
            },
            None => {
                debug!("loop end detected, spec {}, promoting to main storage idx {}, tag {:#x}",
                    trip_cnt, idx, tag
                );
                self.storage.insert(pc, LoopEntry::new(trip_cnt, 0, max_confidence));
                self.stat.promotions += 1;
            },
        }
        true
    }

    /// Undo speculative updates made along a squashed path.
    ///
    /// `info` is the snapshot returned when `branch_pc` was queried. The
    /// speculative count is cleared when the branch resolved not taken.
    pub fn recover(&mut self,
        info: LoopRedirectInfo,
        actually_taken: bool,
        branch_pc: usize,
    )
    {
        if !info.entry.valid {
            return;
        }
        debug!("redirecting loop branch: taken: {}, pc: {:#x}, trip: {}, spec: {}, conf: {}, queried pc: {:#x}",
            actually_taken, branch_pc, info.entry.trip_cnt,
            info.entry.spec_cnt, info.entry.conf.value(), info.branch_pc
        );
        if branch_pc != info.branch_pc || actually_taken {
            return;
        }

        let idx = self.storage.get_index(branch_pc);
        if let Some(way) = self.storage.lookup_mut(branch_pc) {
            debug!("squashed loop branch in set {}, resetting spec to 0",
                idx
            );
            way.spec_cnt = 0;
            self.stat.recoveries += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    const PC: usize = 0x8000_1040;
    const BODY: usize = 0x8000_1000;
    const EXIT: usize = PC + 4;

    /// Commit one loop instance: `trip` taken-backward iterations, then the
    /// exit. Returns the number of exits reported.
    fn run_loop(lp: &mut LoopPredictor, trip: u32) -> usize {
        let mut exits = 0;
        for _ in 0..trip {
            assert!(!lp.commit_loop_branch(PC, BODY, EXIT, false));
        }
        if lp.commit_loop_branch(PC, EXIT, EXIT, false) {
            exits += 1;
        }
        exits
    }

    #[test]
    fn untracked_branch_has_no_prediction() {
        let mut lp = LoopPredictor::default();
        let p = lp.should_end_loop(true, PC, false);
        assert!(!p.end_loop);
        assert!(!p.is_double);
        assert!(!p.info.entry.valid);
        assert_eq!(p.info.branch_pc, PC);
        assert!(!lp.find_loop_branch_in_storage(PC));
        assert_eq!(lp.stats().hits, 0);
    }

    #[test]
    fn training_then_promotion() {
        let mut lp = LoopPredictor::default();
        assert!(!lp.commit_loop_branch(PC, BODY, EXIT, false));
        let t = lp.training_entry(PC).unwrap();
        assert_eq!((t.trip_cnt, t.spec_cnt, t.conf.value()), (0, 1, 0));
        assert!(lp.find_loop_branch_in_storage(PC));
        assert!(lp.main_entry(PC).is_none());

        for _ in 0..4 {
            lp.commit_loop_branch(PC, BODY, EXIT, false);
        }
        assert!(lp.commit_loop_branch(PC, EXIT, EXIT, false));

        let m = lp.main_entry(PC).unwrap();
        assert!(m.valid);
        assert_eq!((m.trip_cnt, m.spec_cnt, m.conf.value()), (5, 0, 0));
        let t = lp.training_entry(PC).unwrap();
        assert_eq!((t.trip_cnt, t.spec_cnt), (5, 0));
        assert_eq!(lp.stats().promotions, 1);
    }

    #[test]
    fn promotion_happens_once() {
        let mut lp = LoopPredictor::default();
        for _ in 0..5 {
            assert_eq!(run_loop(&mut lp, 6), 1);
        }
        assert_eq!(lp.stats().promotions, 1);
        assert_eq!(lp.stats().exits, 5);
        let m = lp.main_entry(PC).unwrap();
        assert_eq!(m.trip_cnt, 6);
        assert_eq!(m.conf.value(), 4);
    }

    #[test]
    fn confidence_decays_on_new_trip_count() {
        let mut lp = LoopPredictor::default();
        for _ in 0..10 {
            run_loop(&mut lp, 3);
        }
        assert_eq!(lp.main_entry(PC).unwrap().conf.value(), 7);

        run_loop(&mut lp, 4);
        let m = lp.main_entry(PC).unwrap();
        assert_eq!(m.conf.value(), 6);
        assert_eq!(m.trip_cnt, 3);
        assert_eq!(lp.training_entry(PC).unwrap().trip_cnt, 4);

        // The new count becomes the training baseline, main storage keeps
        // predicting the count it was promoted with
        run_loop(&mut lp, 4);
        let m = lp.main_entry(PC).unwrap();
        assert_eq!(m.conf.value(), 7);
        assert_eq!(m.trip_cnt, 3);
    }

    #[test]
    fn predicts_exit_after_trip_count() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 3);

        for i in 1..=3 {
            let p = lp.should_end_loop(true, PC, false);
            assert!(!p.end_loop);
            assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, i);
            assert_eq!(lp.main_entry(PC).unwrap().trip_cnt, 3);
        }
        assert_eq!(lp.remaining_iterations(PC), Some(0));
        let p = lp.should_end_loop(true, PC, false);
        assert!(p.end_loop);
        assert!(!p.is_double);
        assert!(p.info.end_loop);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 0);
        assert_eq!(lp.stats().predicted_exits, 1);
    }

    #[test]
    fn not_taken_input_resets_spec_count() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 3);
        lp.should_end_loop(true, PC, false);
        lp.should_end_loop(true, PC, false);

        let p = lp.should_end_loop(false, PC, false);
        assert!(!p.end_loop);
        assert!(!p.is_double);
        assert!(p.info.entry.valid);
        assert_eq!(p.info.entry.spec_cnt, 2);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 0);
    }

    #[test]
    fn double_iteration_collapse() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 4);
        for _ in 0..3 {
            lp.should_end_loop(true, PC, false);
        }
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 3);

        let p = lp.should_end_loop(true, PC, true);
        assert!(p.end_loop);
        assert!(p.is_double);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 0);
        assert_eq!(lp.stats().double_exits, 1);
    }

    #[test]
    fn double_continuation_advances_by_two() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 4);
        let p = lp.should_end_loop(true, PC, true);
        assert!(!p.end_loop);
        assert!(p.is_double);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 2);

        // remaining == 1 without doubling continues by one
        lp.should_end_loop(true, PC, false);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 3);
    }

    #[test]
    fn overshoot_makes_no_prediction() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 2);
        lp.storage.lookup_mut(PC).unwrap().spec_cnt = 4;
        assert_eq!(lp.remaining_iterations(PC), Some(-2));

        let p = lp.should_end_loop(true, PC, false);
        assert!(!p.end_loop);
        assert!(!p.is_double);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 4);
    }

    #[test]
    fn recover_resynchronizes_spec_count() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 5);

        let before = lp.remaining_iterations(PC);
        let first = lp.should_end_loop(true, PC, false);
        assert!(!first.end_loop);
        lp.should_end_loop(true, PC, false);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 2);

        // Squash: the branch actually resolved not taken
        lp.recover(first.info, false, PC);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 0);
        assert_eq!(lp.remaining_iterations(PC), before);
        assert_eq!(lp.stats().recoveries, 1);

        let again = lp.should_end_loop(true, PC, false);
        assert_eq!(again.info.entry.remaining(), first.info.entry.remaining());
    }

    #[test]
    fn recover_ignores_unmatched_info() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 5);
        let p = lp.should_end_loop(true, PC, false);

        // Taken outcome keeps the speculative count
        lp.recover(p.info, true, PC);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 1);

        // Different branch
        lp.recover(p.info, false, PC + 8);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 1);

        // No prediction was made
        let none = LoopRedirectInfo { branch_pc: PC, ..Default::default() };
        lp.recover(none, false, PC);
        assert_eq!(lp.main_entry(PC).unwrap().spec_cnt, 1);
        assert_eq!(lp.stats().recoveries, 0);
    }

    #[test]
    fn confidence_gating() {
        let mut lp = LoopPredictor::default();
        run_loop(&mut lp, 2);
        let p = lp.should_end_loop(true, PC, false);
        assert!(p.info.is_confident(0));
        assert!(!p.info.is_confident(1));
        assert!(!LoopRedirectInfo::default().is_confident(0));
    }

    proptest! {
        #[test]
        fn learns_stable_trip_count(trip in 1u32..64, extra in 7usize..12) {
            let mut lp = LoopPredictor::default();
            for _ in 0..(1 + extra) {
                prop_assert_eq!(run_loop(&mut lp, trip), 1);
            }
            let m = lp.main_entry(PC).unwrap();
            prop_assert_eq!(m.trip_cnt, trip);
            prop_assert_eq!(m.conf.value(), lp.cfg.max_confidence);
            prop_assert_eq!(lp.stats().promotions, 1);
        }

        #[test]
        fn confidence_never_leaves_bounds(trips in prop::collection::vec(0u32..8, 1..40)) {
            let mut lp = LoopPredictor::default();
            for trip in trips {
                run_loop(&mut lp, trip);
                let t = lp.training_entry(PC).unwrap();
                prop_assert!(t.conf.value() <= lp.cfg.max_confidence);
            }
        }
    }
}
