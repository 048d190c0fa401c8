
use std::collections::BTreeMap;
use crate::predictor::*;

/// An entry tracking one loop branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopEntry {
    pub valid: bool,

    /// Iterations observed before the last committed exit
    pub trip_cnt: u32,

    /// Iterations counted since the last exit
    pub spec_cnt: u32,

    /// Agreement between consecutive trip counts
    pub conf: ConfidenceCounter,
}
impl LoopEntry {
    /// A fresh, valid entry.
    pub fn new(trip_cnt: u32, spec_cnt: u32, max_confidence: u8) -> Self {
        Self {
            valid: true,
            trip_cnt,
            spec_cnt,
            conf: ConfidenceCounter::new(max_confidence),
        }
    }

    /// Iterations left before the loop is expected to exit. Negative when
    /// the speculative count has run past the trip count.
    pub fn remaining(&self) -> i64 {
        self.trip_cnt as i64 - self.spec_cnt as i64
    }
}

/// Splits a program counter into index and tag fields.
#[derive(Clone, Copy, Debug)]
pub struct AddrSlicer {
    inst_offset_bits: usize,
    idx_mask: usize,
    tag_mask: usize,
}
impl AddrSlicer {
    pub fn new(inst_offset_bits: usize, index_bits: usize, tag_bits: usize)
        -> Self
    {
        Self {
            inst_offset_bits,
            idx_mask: low_mask(index_bits),
            tag_mask: low_mask(tag_bits),
        }
    }
    pub fn index(&self, pc: usize) -> usize {
        (pc >> self.inst_offset_bits) & self.idx_mask
    }
    pub fn tag(&self, pc: usize) -> usize {
        (pc >> self.inst_offset_bits) & self.tag_mask
    }
}

fn low_mask(bits: usize) -> usize {
    if bits >= usize::BITS as usize { usize::MAX } else { (1 << bits) - 1 }
}

/// Tagged, set-indexed storage for promoted loop branches.
#[derive(Clone, Debug)]
pub struct LoopStorage {
    sets: Vec<BTreeMap<usize, LoopEntry>>,
    slicer: AddrSlicer,
}
impl LoopStorage {
    pub fn new(num_sets: usize, slicer: AddrSlicer) -> Self {
        Self { sets: vec![BTreeMap::new(); num_sets], slicer }
    }

    pub fn insert(&mut self, pc: usize, entry: LoopEntry) {
        let idx = self.get_index(pc);
        let tag = self.get_tag(pc);
        self.sets[idx].insert(tag, entry);
    }

    /// Number of entries held in the set selected by `pc`.
    pub fn set_occupancy(&self, pc: usize) -> usize {
        self.sets[self.get_index(pc)].len()
    }

    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
impl PredictorTable for LoopStorage {
    type Entry = LoopEntry;
    fn num_sets(&self) -> usize { self.sets.len() }
    fn get_index(&self, pc: usize) -> usize { self.slicer.index(pc) }
}
impl TaggedPredictorTable for LoopStorage {
    fn get_tag(&self, pc: usize) -> usize { self.slicer.tag(pc) }
    fn lookup(&self, pc: usize) -> Option<&LoopEntry> {
        self.sets[self.get_index(pc)].get(&self.get_tag(pc))
    }
    fn lookup_mut(&mut self, pc: usize) -> Option<&mut LoopEntry> {
        let idx = self.get_index(pc);
        let tag = self.get_tag(pc);
        self.sets[idx].get_mut(&tag)
    }
}

/// Storage for branches that are still being learned. Not set-partitioned:
/// entries are matched on tag alone.
#[derive(Clone, Debug)]
pub struct TrainingStorage {
    data: BTreeMap<usize, LoopEntry>,
    slicer: AddrSlicer,
}
impl TrainingStorage {
    pub fn new(slicer: AddrSlicer) -> Self {
        Self { data: BTreeMap::new(), slicer }
    }

    pub fn insert(&mut self, pc: usize, entry: LoopEntry) {
        let tag = self.get_tag(pc);
        self.data.insert(tag, entry);
    }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}
impl PredictorTable for TrainingStorage {
    type Entry = LoopEntry;
    fn num_sets(&self) -> usize { 1 }
    fn get_index(&self, _pc: usize) -> usize { 0 }
}
impl TaggedPredictorTable for TrainingStorage {
    fn get_tag(&self, pc: usize) -> usize { self.slicer.tag(pc) }
    fn lookup(&self, pc: usize) -> Option<&LoopEntry> {
        self.data.get(&self.get_tag(pc))
    }
    fn lookup_mut(&mut self, pc: usize) -> Option<&mut LoopEntry> {
        let tag = self.get_tag(pc);
        self.data.get_mut(&tag)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slicing_drops_alignment_bits() {
        let s = AddrSlicer::new(1, 6, 28);
        assert_eq!(s.index(0x7e), 0x3f);
        assert_eq!(s.index(0x1_0080), 0x00);
        assert_eq!(s.tag(0x1_0080), 0x8040);
        // The alignment bit is ignored
        assert_eq!(s.tag(0x1_0081), s.tag(0x1_0080));
    }

    #[test]
    fn training_storage_ignores_sets() {
        let s = AddrSlicer::new(1, 6, 28);
        let mut t = TrainingStorage::new(s);
        t.insert(0x1000, LoopEntry::new(0, 1, 7));
        assert_eq!(t.index_mask(), 0);
        assert!(t.lookup(0x1000).is_some());
        assert!(t.lookup(0x1004).is_none());
    }

    #[test]
    fn main_storage_is_set_indexed() {
        let s = AddrSlicer::new(1, 6, 28);
        let mut m = LoopStorage::new(64, s);
        m.insert(0x1000, LoopEntry::new(3, 0, 7));
        assert_eq!(m.set_occupancy(0x1000), 1);
        assert_eq!(m.len(), 1);
        assert_eq!(m.lookup(0x1000).map(|e| e.trip_cnt), Some(3));
        assert!(m.lookup_mut(0x1002).is_none());
    }
}
