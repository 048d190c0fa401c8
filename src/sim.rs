//! Synthetic loop workloads and a single-path front-end model.
//!
//! [`LoopFrontend`] wires a [`LoopPredictor`] and a [`FetchTargetQueue`]
//! together the way a decoupled front end drives them: predict, enqueue,
//! fetch, resolve, commit, and squash/recover on a misprediction.

use rand::Rng;
use tracing::{ debug, info };

use crate::branch::*;
use crate::ftq::*;
use crate::predictor::*;
use crate::stats::*;

/// Size of an instruction in the synthetic programs.
pub const INST_BYTES: usize = 4;

/// A single loop whose closing branch at `branch_pc` jumps back to
/// `body_pc`. Each loop instance runs for one of `trip_counts` iterations.
#[derive(Clone, Debug)]
pub struct LoopWorkload {
    pub branch_pc: usize,
    pub body_pc: usize,
    pub trip_counts: Vec<u32>,
}
impl LoopWorkload {
    pub fn new(branch_pc: usize, body_pc: usize) -> Self {
        assert!(body_pc < branch_pc, "loop body must precede the branch");
        Self { branch_pc, body_pc, trip_counts: Vec::new() }
    }

    /// Append `instances` loop instances with the same trip count.
    pub fn fixed(mut self, trip: u32, instances: usize) -> Self {
        self.trip_counts.extend(std::iter::repeat(trip).take(instances));
        self
    }

    /// Append `instances` loop instances whose trip count is moved by one
    /// (up or down, never below one) with probability `jitter`.
    pub fn jittered(mut self,
        trip: u32,
        instances: usize,
        jitter: f64,
        rng: &mut impl Rng,
    ) -> Self
    {
        for _ in 0..instances {
            let t = if rng.gen_bool(jitter) {
                if rng.gen::<bool>() { trip.saturating_add(1) } else { trip.saturating_sub(1).max(1) }
            } else {
                trip
            };
            self.trip_counts.push(t);
        }
        self
    }

    pub fn fall_thru_pc(&self) -> usize { self.branch_pc + INST_BYTES }

    /// Return the retired instances of the loop branch in program order.
    pub fn records(&self) -> Vec<BranchRecord> {
        let mut res = Vec::new();
        for trip in self.trip_counts.iter() {
            for _ in 0..*trip {
                res.push(BranchRecord::new(self.branch_pc, self.body_pc, Outcome::T));
            }
            res.push(BranchRecord::new(
                self.branch_pc, self.fall_thru_pc(), Outcome::N
            ));
        }
        res
    }
}

/// A single-path front end predicting one loop branch per fetch block.
pub struct LoopFrontend {
    pub lp: LoopPredictor,
    pub ftq: FetchTargetQueue,
    pub stats: BranchStats,

    /// Minimum confidence before an end-of-loop prediction overrides the
    /// default taken prediction
    pub confidence_threshold: u8,

    stream_id: FetchStreamId,
}
impl LoopFrontend {
    pub fn new(lp: LoopPredictor, ftq_size: usize, confidence_threshold: u8)
        -> Self
    {
        Self {
            lp,
            ftq: FetchTargetQueue::new(ftq_size),
            stats: BranchStats::new(),
            confidence_threshold,
            stream_id: 0,
        }
    }

    /// Run every record of `workload` through the front end.
    pub fn run(&mut self, workload: &LoopWorkload) {
        let records = workload.records();
        info!("running {} loop instances ({} branches)",
            workload.trip_counts.len(), records.len()
        );
        self.ftq.squash(0, self.stream_id, workload.body_pc);
        for record in records.iter() {
            self.step(workload, record);
        }
        info!("done: {}/{} correct", self.stats.global_hits, self.stats.global_brns);
    }

    /// Predict, fetch, resolve and retire one dynamic instance of the loop
    /// branch.
    fn step(&mut self, workload: &LoopWorkload, record: &BranchRecord) {
        let fall_thru_pc = workload.fall_thru_pc();

        // Backward branches default to taken; a confident loop prediction
        // can override that with an exit.
        let prediction = self.lp.should_end_loop(true, record.pc, false);
        let use_loop = prediction.end_loop
            && prediction.info.is_confident(self.confidence_threshold);
        let predicted = if use_loop { Outcome::N } else { Outcome::T };

        let mut block = FtqEntry::new(workload.body_pc, fall_thru_pc, self.stream_id);
        if predicted == Outcome::T {
            block = block.with_taken_branch(record.pc, workload.body_pc);
        }
        self.ftq.enqueue(block);
        let enq = self.ftq.enqueue_state_mut();
        enq.desire_target_id += 1;
        enq.pc = block.next_pc();

        // Fetch consumes the block it was just given
        if !self.ftq.try_supply_fetch_with_target() {
            unreachable!("enqueued target {} not supplied", self.ftq.demand_target_id());
        }
        let fetched_next_pc = self.ftq.get_target().next_pc();
        self.ftq.finish_current_fetch_target();

        let mispredicted = fetched_next_pc != record.tgt;
        if mispredicted {
            debug!("loop branch {:#x} mispredicted as {:?}, redirect to {:#x}",
                record.pc, predicted, record.tgt
            );
            self.stream_id += 1;
            self.ftq.squash(self.ftq.demand_target_id(), self.stream_id, record.tgt);
            self.lp.recover(prediction.info, record.is_taken(), record.pc);
        }

        self.lp.commit_loop_branch(record.pc, record.tgt, fall_thru_pc, mispredicted);
        self.stats.update(record, predicted);
    }
}
