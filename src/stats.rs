//! Helpers for collecting statistics.

use std::collections::*;
use crate::branch::*;
use bitvec::prelude::*;
use itertools::*;

/// Container for recording simple statistics while evaluating some model.
#[derive(Default)]
pub struct BranchStats {
    /// Per-branch statistics (indexed by program counter value).
    pub data: BTreeMap<usize, BranchData>,

    /// Number of correct predictions
    pub global_hits: usize,

    /// Number of times any branch instruction was executed
    pub global_brns: usize,
}
impl BranchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the global hit rate.
    pub fn hit_rate(&self) -> f64 {
        if self.global_brns == 0 { return 0.0; }
        self.global_hits as f64 / self.global_brns as f64
    }

    /// Return the global miss count.
    pub fn global_miss(&self) -> usize { self.global_brns - self.global_hits }

    /// Record a prediction for some retired branch.
    pub fn update(&mut self, record: &BranchRecord, prediction: Outcome) {
        let hit = prediction == record.outcome;
        self.global_brns += 1;
        if hit { self.global_hits += 1; }

        let data = self.get_mut(record.pc);
        data.occ += 1;
        data.pat.push(record.outcome.into());
        data.hit_pat.push(hit);
        if hit { data.hits += 1; }
    }

    /// Returns a reference to data collected for a particular branch.
    pub fn get(&self, pc: usize) -> Option<&BranchData> {
        self.data.get(&pc)
    }

    /// Returns a mutable reference to data collected for a particular branch.
    /// Creates a new entry if one doesn't already exist.
    pub fn get_mut(&mut self, pc: usize) -> &mut BranchData {
        self.data.entry(pc).or_default()
    }

    /// Returns the number of unique observed branch instructions.
    pub fn num_unique_branches(&self) -> usize {
        self.data.len()
    }

    /// Returns the `n` most frequently executed branches.
    pub fn get_common_branches(&self, n: usize) -> Vec<(usize, &BranchData)> {
        self.data.iter()
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }

    /// Returns up to `n` branches with a hit rate at or below `rate`,
    /// most frequently executed first.
    pub fn get_low_rate_branches(&self, n: usize, rate: f64)
        -> Vec<(usize, &BranchData)>
    {
        self.data.iter()
            .filter(|(_, s)| s.hit_rate() <= rate)
            .sorted_by_key(|(_, s)| s.occ)
            .rev()
            .take(n)
            .map(|(pc, s)| (*pc, s))
            .collect()
    }
}

/// Container for per-branch statistics.
#[derive(Default)]
pub struct BranchData {
    /// Number of times this branch was encountered.
    pub occ: usize,

    /// Number of correct predictions for this branch.
    pub hits: usize,

    /// Record of all observed outcomes for this branch.
    pub pat: BitVec,

    /// Record of which predictions were correct.
    pub hit_pat: BitVec,
}
impl BranchData {
    /// Return the hit rate for this branch.
    pub fn hit_rate(&self) -> f64 {
        if self.occ == 0 { return 0.0; }
        self.hits as f64 / self.occ as f64
    }

    pub fn times_taken(&self) -> usize {
        self.pat.count_ones()
    }

    /// Number of predictions since the last misprediction.
    pub fn hit_streak(&self) -> usize {
        self.hit_pat.iter().by_vals().rev().take_while(|hit| *hit).count()
    }

    /// Return the position of the first misprediction at or after `start`.
    pub fn first_miss_after(&self, start: usize) -> Option<usize> {
        self.hit_pat.iter().by_vals()
            .skip(start)
            .position(|hit| !hit)
            .map(|off| off + start)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn records_hits_and_patterns() {
        let mut s = BranchStats::new();
        let t = BranchRecord::new(0x100, 0x80, Outcome::T);
        let n = BranchRecord::new(0x100, 0x104, Outcome::N);
        s.update(&t, Outcome::T);
        s.update(&t, Outcome::T);
        s.update(&n, Outcome::T);
        s.update(&t, Outcome::T);

        assert_eq!(s.global_brns, 4);
        assert_eq!(s.global_miss(), 1);
        let d = s.get(0x100).unwrap();
        assert_eq!(d.times_taken(), 3);
        assert_eq!(d.hit_streak(), 1);
        assert_eq!(d.first_miss_after(0), Some(2));
        assert_eq!(d.first_miss_after(3), None);
    }

    #[test]
    fn ranks_branches() {
        let mut s = BranchStats::new();
        for _ in 0..3 {
            s.update(&BranchRecord::new(0x200, 0x100, Outcome::T), Outcome::N);
        }
        s.update(&BranchRecord::new(0x300, 0x100, Outcome::T), Outcome::T);

        let common = s.get_common_branches(1);
        assert_eq!(common[0].0, 0x200);
        let low = s.get_low_rate_branches(4, 0.5);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].0, 0x200);
        assert_eq!(s.num_unique_branches(), 2);
    }
}
