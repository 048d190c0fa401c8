//! A fetch target queue (FTQ) decoupling branch prediction from instruction
//! fetch.
//!
//! The branch predictor produces [`FtqEntry`] values and places them in the
//! queue at an identifier it owns ([`EnqueueState::desire_target_id`]). The
//! fetch unit consumes them strictly in identifier order, starting from the
//! demand identifier. Only the open window of the identifier space is kept
//! in the backing map.

use std::collections::BTreeMap;
use itertools::Itertools;
use tracing::{ debug, error, trace };

/// Identifies a fetch target. Monotonically increasing.
pub type FetchTargetId = u64;

/// Identifies the prediction stream that produced a fetch target.
pub type FetchStreamId = u64;

/// Program counter where fetch begins after reset.
pub const RESET_PC: usize = 0x8000_0000;

/// A taken branch terminating a fetch block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TakenBranch {
    /// Program counter of the branch
    pub pc: usize,
    /// Predicted target of the branch
    pub target: usize,
}

/// A predicted fetch block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FtqEntry {
    /// First byte of the block
    pub start_pc: usize,

    /// Address following the last byte of the block
    pub fall_thru_pc: usize,

    /// The branch ending this block, when it is predicted taken
    pub taken_branch: Option<TakenBranch>,

    /// The prediction stream this block belongs to
    pub fsq_id: FetchStreamId,
}
impl FtqEntry {
    pub fn new(start_pc: usize, fall_thru_pc: usize, fsq_id: FetchStreamId)
        -> Self
    {
        Self { start_pc, fall_thru_pc, taken_branch: None, fsq_id }
    }

    pub fn with_taken_branch(mut self, pc: usize, target: usize) -> Self {
        self.taken_branch = Some(TakenBranch { pc, target });
        self
    }

    /// Return the address fetch continues from after this block.
    pub fn next_pc(&self) -> usize {
        match self.taken_branch {
            Some(brn) => brn.target,
            None => self.fall_thru_pc,
        }
    }
}

/// Producer-side bookkeeping. Only [`FetchTargetQueue::squash`] resets it;
/// the predictor driving enqueue advances it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnqueueState {
    /// The identifier the next enqueued entry is written to
    pub desire_target_id: FetchTargetId,

    /// The current prediction stream
    pub stream_id: FetchStreamId,

    /// The next program counter to predict from
    pub pc: usize,
}

/// Cached result of the last successful supply.
///
/// Holds the key of the supplied entry rather than a reference into the
/// backing map; the entry is resolved again on every access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupplyState {
    pub valid: bool,
    pub target_id: FetchTargetId,
}

/// Container for [`FetchTargetQueue`] runtime stats.
#[derive(Clone, Debug, Default)]
pub struct FtqStats {
    pub enqueues: usize,
    pub supplies: usize,
    pub supply_misses: usize,
    pub finished: usize,
    pub squashes: usize,
}

pub struct FetchTargetQueue {
    /// Nominal capacity
    size: usize,

    /// Queued entries, ordered by identifier
    ftq: BTreeMap<FetchTargetId, FtqEntry>,

    enq_state: EnqueueState,

    /// The identifier the fetch unit wants next
    demand_target_id: FetchTargetId,

    supply_state: SupplyState,

    stat: FtqStats,
}
impl FetchTargetQueue {
    pub fn new(size: usize) -> Self {
        assert!(size != 0, "FTQ must have a non-zero capacity");
        Self {
            size,
            ftq: BTreeMap::new(),
            enq_state: EnqueueState {
                desire_target_id: 0,
                stream_id: 0,
                pc: RESET_PC,
            },
            demand_target_id: 0,
            supply_state: SupplyState::default(),
            stat: FtqStats::default(),
        }
    }

    pub fn size(&self) -> usize { self.size }
    pub fn len(&self) -> usize { self.ftq.len() }
    pub fn is_empty(&self) -> bool { self.ftq.is_empty() }

    /// Returns 'true' when the producer should stop enqueuing.
    pub fn is_full(&self) -> bool { self.ftq.len() >= self.size }

    pub fn demand_target_id(&self) -> FetchTargetId { self.demand_target_id }
    pub fn enqueue_state(&self) -> &EnqueueState { &self.enq_state }
    pub fn enqueue_state_mut(&mut self) -> &mut EnqueueState {
        &mut self.enq_state
    }
    pub fn stats(&self) -> &FtqStats { &self.stat }

    /// Iterate over queued entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&FetchTargetId, &FtqEntry)> {
        self.ftq.iter()
    }
}

impl FetchTargetQueue {
    /// Discard every queued entry and restart both sides of the queue at
    /// `new_target_id`.
    pub fn squash(&mut self,
        new_target_id: FetchTargetId,
        new_stream_id: FetchStreamId,
        new_pc: usize,
    )
    {
        self.ftq.clear();
        self.enq_state = EnqueueState {
            desire_target_id: new_target_id,
            stream_id: new_stream_id,
            pc: new_pc,
        };
        self.supply_state = SupplyState::default();
        self.demand_target_id = new_target_id;
        self.stat.squashes += 1;
        debug!("squash: demand restarts at target {}, stream {}, pc {:#x}",
            new_target_id, new_stream_id, new_pc
        );
    }

    /// Write `entry` at the producer's desired identifier. Reusing an
    /// identifier replaces the previous entry.
    pub fn enqueue(&mut self, entry: FtqEntry) {
        let id = self.enq_state.desire_target_id;
        debug!("enqueue target {}: pc {:#x}, stream {}",
            id, entry.start_pc, entry.fsq_id
        );
        self.ftq.insert(id, entry);
        self.stat.enqueues += 1;
    }

    /// Returns 'true' if the supplied entry is the one the fetch unit wants.
    pub fn fetch_target_available(&self) -> bool {
        self.supply_state.valid
            && self.supply_state.target_id == self.demand_target_id
    }

    /// Returns 'true' if the last supply attempt succeeded, regardless of
    /// the current demand.
    pub fn valid_supply_fetch_target_state(&self) -> bool {
        self.supply_state.valid
    }

    /// Try to supply the entry for the current demand identifier.
    ///
    /// Panics if a younger entry is queued while the demanded one is missing.
    pub fn try_supply_fetch_with_target(&mut self) -> bool {
        if self.fetch_target_available() {
            trace!("supply cached, supply id: {}, demand id: {}",
                self.supply_state.target_id, self.demand_target_id
            );
            return true;
        }

        let demand = self.demand_target_id;
        if self.ftq.contains_key(&demand) {
            debug!("supply target {}", demand);
            self.supply_state = SupplyState { valid: true, target_id: demand };
            self.stat.supplies += 1;
            return true;
        }

        debug!("target {} not yet enqueued", demand);
        if let Some((&last, _)) = self.ftq.last_key_value() {
            trace!("youngest queued target: {}", last);
            if last > demand {
                error!("targets in buffer go beyond demand {}: [{}]",
                    demand, self.ftq.keys().join(", ")
                );
                self.dump("targets in buffer go beyond demand");
                panic!("FTQ holds target {} while demanded target {} is missing",
                    last, demand
                );
            }
        }
        self.stat.supply_misses += 1;
        false
    }

    /// Return the supplied entry.
    ///
    /// Must only be called while [`Self::fetch_target_available`] holds.
    pub fn get_target(&self) -> &FtqEntry {
        assert!(self.fetch_target_available(),
            "no fetch target available for demand id {}", self.demand_target_id
        );
        match self.ftq.get(&self.supply_state.target_id) {
            Some(entry) => entry,
            None => panic!("supplied target {} is not in the FTQ",
                self.supply_state.target_id
            ),
        }
    }

    /// Retire the supplied entry and advance demand to the next identifier.
    pub fn finish_current_fetch_target(&mut self) {
        assert!(self.fetch_target_available(),
            "finishing fetch target {} without a supplied entry",
            self.demand_target_id
        );
        let finished = self.supply_state.target_id;
        self.demand_target_id += 1;
        self.ftq.remove(&finished);
        self.supply_state.valid = false;
        self.stat.finished += 1;
        debug!("finished target {}, demand now {}",
            finished, self.demand_target_id
        );
    }

    /// Look up the entry for the current demand identifier without touching
    /// the supply state.
    pub fn get_demand_target_entry(&mut self) -> Option<&mut FtqEntry> {
        self.ftq.get_mut(&self.demand_target_id)
    }

    /// Log every queued entry.
    pub fn dump(&self, when: &str) {
        debug!("{}: FTQ contents", when);
        for (id, entry) in self.ftq.iter() {
            debug!("  target {}: pc {:#x}, stream {}",
                id, entry.start_pc, entry.fsq_id
            );
        }
    }
}
