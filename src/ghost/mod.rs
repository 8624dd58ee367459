//! Deterministic speculative-execution scheduler.
//!
//! A ghost is a tiny state machine that either steps forward directly
//! (`step`) or proposes several candidate next-states (`propose_candidates`)
//! and lets [`GhostSystem::collapse_by_consensus`] pick one deterministically
//! from the content of the system's own ledger. Given the same sequence of
//! calls with the same ids and tags, every run produces the same chosen
//! indices and the same final states — the scheduler has no clock, no
//! randomness and no thread-pool dependency of its own.
//!
//! A [`GhostSystem`] is **not** safe to share across threads without
//! external synchronization: every operation takes `&mut self` and a single
//! call sequence must be observed in one total order for determinism to
//! hold.

pub mod hash;
pub mod ledger;

use std::collections::VecDeque;

use crate::config::Config;
use crate::error::{Error, Result};
use hash::Fnv1a64;
use ledger::{Candidate, Ledger, LedgerEntry, Proposal};

pub use ledger::Candidate as GhostCandidate;

/// Opaque handle to a ghost registered with a [`GhostSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GhostId(usize);

/// A non-speculative step function: given the ghost's argument bytes,
/// produce the next state.
pub type StepFn = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

struct GhostRecord {
    id_str: String,
    step_index: u64,
    state: Option<Vec<u8>>,
    candidates: Option<Vec<Candidate>>,
    func: Option<StepFn>,
    arg: Vec<u8>,
    finished: bool,
}

/// Owns one ledger and one scheduler queue; every ghost operation is scoped
/// to the `GhostSystem` it was created on.
pub struct GhostSystem {
    ledger: Ledger,
    queue: VecDeque<GhostId>,
    queue_capacity: usize,
    ghosts: Vec<GhostRecord>,
}

impl GhostSystem {
    pub fn new(config: &Config) -> Self {
        log::debug!(target: "ghost", "init");
        Self {
            ledger: Ledger::new(config.ghost_ledger_capacity),
            queue: VecDeque::new(),
            queue_capacity: config.ghost_queue_capacity,
            ghosts: Vec::new(),
        }
    }

    /// Register a new ghost. `func`, if present, is the non-speculative
    /// step function invoked by [`GhostSystem::step`].
    pub fn create(&mut self, id_str: impl Into<String>, func: Option<StepFn>, arg: Vec<u8>) -> Result<GhostId> {
        let id_str = id_str.into();
        let id = GhostId(self.ghosts.len());
        self.ghosts.push(GhostRecord {
            id_str: id_str.clone(),
            step_index: 0,
            state: None,
            candidates: None,
            func,
            arg,
            finished: false,
        });
        self.ledger.append(LedgerEntry {
            ghost_id: id_str,
            step_index: 0,
            proposal: None,
            chosen_index: None,
            state_snapshot: None,
        })?;
        Ok(id)
    }

    fn record_mut(&mut self, ghost: GhostId) -> Result<&mut GhostRecord> {
        self.ghosts
            .get_mut(ghost.0)
            .ok_or_else(|| Error::InvalidArg("unknown ghost".into()))
    }

    fn record(&self, ghost: GhostId) -> Result<&GhostRecord> {
        self.ghosts
            .get(ghost.0)
            .ok_or_else(|| Error::InvalidArg("unknown ghost".into()))
    }

    /// Attach candidate next-states to `ghost`, to be resolved by a later
    /// call to [`GhostSystem::collapse_by_consensus`].
    pub fn propose_candidates(&mut self, ghost: GhostId, candidates: Vec<Candidate>) -> Result<()> {
        if candidates.is_empty() {
            return Err(Error::InvalidArg("no candidates proposed".into()));
        }
        let tags = candidates.iter().map(|c| c.tag.clone()).collect();
        let (id_str, step_index) = {
            let rec = self.record_mut(ghost)?;
            rec.candidates = Some(candidates);
            (rec.id_str.clone(), rec.step_index)
        };
        self.ledger.append(LedgerEntry {
            ghost_id: id_str,
            step_index,
            proposal: Some(Proposal { tags }),
            chosen_index: None,
            state_snapshot: None,
        })?;
        Ok(())
    }

    /// Deterministically choose one of `ghost`'s pending candidates and
    /// install it as the ghost's state. Returns the chosen index.
    pub fn collapse_by_consensus(&mut self, ghost: GhostId) -> Result<usize> {
        let id_str = self.record(ghost)?.id_str.clone();
        let entry_index = self
            .ledger
            .last_pending_proposal(&id_str)
            .ok_or_else(|| Error::InvalidArg("no pending proposal".into()))?;

        let (tags, step_index) = {
            let entry = self.ledger.get(entry_index).expect("looked up above");
            let tags = entry
                .proposal
                .as_ref()
                .expect("pending proposal has a Proposal")
                .tags
                .clone();
            (tags, entry.step_index)
        };

        let mut hasher = Fnv1a64::seeded(hash::SEED);
        hasher
            .mix_u64(self.ledger.len() as u64)
            .mix_str(&id_str)
            .mix_u64(step_index);
        for tag in &tags {
            hasher.mix_str(tag);
        }
        let digest = hasher.finish();

        let rec = self.record_mut(ghost)?;
        let candidates = rec
            .candidates
            .take()
            .ok_or_else(|| Error::InvalidArg("no pending proposal".into()))?;
        let chosen = (digest % candidates.len() as u64) as usize;
        let chosen_state = candidates[chosen].data.clone();
        rec.state = Some(chosen_state.clone());

        let entry = self.ledger.get_mut(entry_index).expect("looked up above");
        entry.chosen_index = Some(chosen);
        entry.state_snapshot = Some(chosen_state);

        log::debug!(target: "ghost", "collapsed {id_str} -> candidate {chosen}");
        Ok(chosen)
    }

    /// Non-speculative advance: run `func(arg)` and record the result.
    pub fn step(&mut self, ghost: GhostId) -> Result<()> {
        let rec = self.record_mut(ghost)?;
        let mut func = rec
            .func
            .take()
            .ok_or_else(|| Error::InvalidArg("ghost has no step function".into()))?;
        let out = func(&rec.arg);
        rec.func = Some(func);
        rec.state = Some(out.clone());
        rec.step_index += 1;
        let id_str = rec.id_str.clone();
        let step_index = rec.step_index;

        self.ledger.append(LedgerEntry {
            ghost_id: id_str,
            step_index,
            proposal: None,
            chosen_index: None,
            state_snapshot: Some(out),
        })?;
        Ok(())
    }

    /// Append `ghost` to the scheduler queue.
    pub fn queue_add(&mut self, ghost: GhostId) -> Result<()> {
        if self.queue.len() >= self.queue_capacity {
            return Err(Error::NoMem);
        }
        self.queue.push_back(ghost);
        Ok(())
    }

    /// One pass over the queue: collapse ghosts with a pending proposal,
    /// step ghosts with a step function, skip finished ghosts.
    pub fn schedule(&mut self) -> Result<()> {
        let round: Vec<GhostId> = self.queue.iter().copied().collect();
        for ghost in round {
            let rec = self.record(ghost)?;
            if rec.finished {
                continue;
            }
            let has_pending = self
                .ledger
                .last_pending_proposal(&rec.id_str)
                .map(|idx| self.ledger.get(idx).unwrap().chosen_index.is_none())
                .unwrap_or(false);
            if has_pending {
                self.collapse_by_consensus(ghost)?;
            } else if self.record(ghost)?.func.is_some() {
                self.step(ghost)?;
            }
        }
        Ok(())
    }

    pub fn state(&self, ghost: GhostId) -> Result<Option<&[u8]>> {
        Ok(self.record(ghost)?.state.as_deref())
    }

    pub fn finished(&self, ghost: GhostId) -> Result<bool> {
        Ok(self.record(ghost)?.finished)
    }

    pub fn mark_finished(&mut self, ghost: GhostId) -> Result<()> {
        self.record_mut(ghost)?.finished = true;
        Ok(())
    }

    /// Clear the ghost's state and mark it finished. The ledger entries it
    /// produced are kept; only the live record is torn down.
    pub fn dispose(&mut self, ghost: GhostId) -> Result<()> {
        let rec = self.record_mut(ghost)?;
        rec.state = None;
        rec.candidates = None;
        rec.func = None;
        rec.finished = true;
        Ok(())
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Reset the system to an empty ledger and queue, as if freshly
    /// constructed.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.queue.clear();
        self.ghosts.clear();
    }
}
