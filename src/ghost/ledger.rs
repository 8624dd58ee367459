//! Append-only, bounded, content-addressed log of ghost activity.
//!
//! The ledger is the sole source of randomness-free entropy for
//! [`super::GhostSystem::collapse_by_consensus`]: its running length and
//! per-ghost history are hashed to deterministically pick a candidate.

use crate::error::{Error, Result};

/// One proposed next-state, tagged for hashing and diagnostics.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub tag: String,
    pub data: Vec<u8>,
}

/// A proposal recorded against a ledger entry: the tags of every candidate
/// offered, in the order they were proposed.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub tags: Vec<String>,
}

/// One append-only ledger record.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub ghost_id: String,
    pub step_index: u64,
    pub proposal: Option<Proposal>,
    pub chosen_index: Option<usize>,
    pub state_snapshot: Option<Vec<u8>>,
}

/// Bounded append-only log.
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    capacity: usize,
}

impl Ledger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Total entries ever appended. Fed into the consensus hash, so this
    /// number must never be recomputed or rewound once returned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: LedgerEntry) -> Result<usize> {
        if self.entries.len() >= self.capacity {
            return Err(Error::NoMem);
        }
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&LedgerEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(index)
    }

    /// Most recent entry for `ghost_id` carrying an unresolved proposal.
    pub fn last_pending_proposal(&self, ghost_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| {
                e.ghost_id == ghost_id && e.proposal.is_some() && e.chosen_index.is_none()
            })
            .map(|(i, _)| i)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rejects_once_full() {
        let mut ledger = Ledger::new(1);
        ledger
            .append(LedgerEntry {
                ghost_id: "g".into(),
                step_index: 0,
                proposal: None,
                chosen_index: None,
                state_snapshot: None,
            })
            .unwrap();
        let err = ledger
            .append(LedgerEntry {
                ghost_id: "g".into(),
                step_index: 1,
                proposal: None,
                chosen_index: None,
                state_snapshot: None,
            })
            .unwrap_err();
        assert_eq!(err, Error::NoMem);
    }

    #[test]
    fn finds_the_most_recent_unresolved_proposal() {
        let mut ledger = Ledger::new(8);
        ledger
            .append(LedgerEntry {
                ghost_id: "g".into(),
                step_index: 0,
                proposal: Some(Proposal {
                    tags: vec!["a".into()],
                }),
                chosen_index: None,
                state_snapshot: None,
            })
            .unwrap();
        assert_eq!(ledger.last_pending_proposal("g"), Some(0));
        assert_eq!(ledger.last_pending_proposal("other"), None);
    }
}
