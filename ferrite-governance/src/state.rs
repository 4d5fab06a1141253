//! In-memory governance state: proposals and votes indexed by hash, plus a
//! secondary vote index by superblock height.
//!
//! Every insert, remove, and spend path goes through this type, which keeps
//! the `votes`/`sb_votes` indexes in sync by construction. Thread safety is
//! provided by the owning [`crate::Governance`], which wraps the state in a
//! single mutex.

use std::collections::HashMap;

use crate::proposal::Proposal;
use crate::vote::Vote;
use ferrite_shared_types::{Hash, OutPoint};

#[derive(Debug, Default)]
pub struct GovernanceState {
    proposals: HashMap<Hash, Proposal>,
    /// Keyed by vote id; a later vote on the same utxo overwrites.
    votes: HashMap<Hash, Vote>,
    /// Secondary index: superblock height to the votes targeting it.
    sb_votes: HashMap<u64, HashMap<Hash, Vote>>,
}

impl GovernanceState {
    pub fn new() -> Self {
        GovernanceState::default()
    }

    /// Clears all governance state.
    pub fn reset(&mut self) {
        self.proposals.clear();
        self.votes.clear();
        self.sb_votes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty() && self.votes.is_empty() && self.sb_votes.is_empty()
    }

    pub fn has_proposal(&self, hash: &Hash) -> bool {
        self.proposals.contains_key(hash)
    }

    /// True when the proposal exists and was recorded strictly before the
    /// given height.
    pub fn has_proposal_before(&self, hash: &Hash, height: u64) -> bool {
        self.proposals
            .get(hash)
            .map(|p| p.block_number() < height)
            .unwrap_or(false)
    }

    pub fn get_proposal(&self, hash: &Hash) -> Option<&Proposal> {
        self.proposals.get(hash)
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.proposals.values().cloned().collect()
    }

    pub fn proposals_for_superblock(&self, superblock: u64) -> Vec<Proposal> {
        self.proposals
            .values()
            .filter(|p| p.superblock() == superblock)
            .cloned()
            .collect()
    }

    /// Proposals whose superblock is at or after the given height.
    pub fn proposals_since(&self, height: u64) -> Vec<Proposal> {
        self.proposals
            .values()
            .filter(|p| p.superblock() >= height)
            .cloned()
            .collect()
    }

    /// Records a proposal. A proposal hash is never overwritten by a later
    /// observation: the copy from the earliest block wins, so the sharded
    /// chain load converges to the same record regardless of scan order.
    pub fn add_proposal(&mut self, proposal: Proposal) {
        match self.proposals.entry(proposal.hash()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if proposal.block_number() < entry.get().block_number() {
                    entry.insert(proposal);
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(proposal);
            }
        }
    }

    /// Removes a proposal. Votes are not cascaded; callers remove the
    /// proposal's votes first, as the block-disconnect path does.
    pub fn remove_proposal(&mut self, hash: &Hash) {
        self.proposals.remove(hash);
    }

    pub fn has_vote(&self, id: &Hash) -> bool {
        self.votes.contains_key(id)
    }

    pub fn get_vote(&self, id: &Hash) -> Option<&Vote> {
        self.votes.get(id)
    }

    /// All votes that haven't been spent.
    pub fn votes(&self) -> Vec<Vote> {
        self.votes
            .values()
            .filter(|v| !v.is_spent())
            .cloned()
            .collect()
    }

    /// Unspent votes for one proposal, served from the superblock index.
    pub fn votes_for_proposal(&self, proposal: &Hash) -> Vec<Vote> {
        let Some(p) = self.proposals.get(proposal) else {
            return Vec::new();
        };
        let Some(votes) = self.sb_votes.get(&p.superblock()) else {
            return Vec::new();
        };
        votes
            .values()
            .filter(|v| v.proposal() == proposal && !v.is_spent())
            .cloned()
            .collect()
    }

    /// Unspent votes targeting one superblock.
    pub fn votes_in_superblock(&self, superblock: u64) -> Vec<Vote> {
        let Some(votes) = self.sb_votes.get(&superblock) else {
            return Vec::new();
        };
        votes
            .values()
            .filter(|v| !v.is_spent())
            .cloned()
            .collect()
    }

    /// Snapshot of all votes, including spent ones, with their ids.
    pub fn copy_votes(&self) -> Vec<(Hash, Vote)> {
        self.votes.iter().map(|(id, v)| (*id, v.clone())).collect()
    }

    /// Snapshot of all proposals.
    pub fn copy_proposals(&self) -> Vec<Proposal> {
        self.proposals.values().cloned().collect()
    }

    /// Records a vote, applying the replacement rule when a vote with the
    /// same id exists: strictly newer time wins, equal time falls back to
    /// the larger sig-hash (see [`Vote::supersedes`]). The rule is a total
    /// order, so the surviving record does not depend on insertion order.
    ///
    /// Votes whose proposal is unknown are dropped; the chain loader buffers
    /// early-scanned votes until every proposal has been seen rather than
    /// bypassing this check.
    ///
    /// Returns whether the vote was stored.
    pub fn add_vote(&mut self, vote: Vote) -> bool {
        let id = vote.id();
        if let Some(existing) = self.votes.get(&id) {
            if !vote.supersedes(existing) {
                return false;
            }
        }
        let Some(proposal) = self.proposals.get(vote.proposal()) else {
            return false;
        };
        self.sb_votes
            .entry(proposal.superblock())
            .or_default()
            .insert(id, vote.clone());
        self.votes.insert(id, vote);
        true
    }

    /// Removes a vote from both indexes.
    pub fn remove_vote(&mut self, id: &Hash) {
        let Some(vote) = self.votes.remove(id) else {
            return;
        };
        let Some(proposal) = self.proposals.get(vote.proposal()) else {
            return;
        };
        if let Some(votes) = self.sb_votes.get_mut(&proposal.superblock()) {
            votes.remove(id);
            if votes.is_empty() {
                self.sb_votes.remove(&proposal.superblock());
            }
        }
    }

    /// Marks a vote's utxo as spent by `txhash` at `block`. A spend at a
    /// block after the proposal's superblock is ignored: the vote already
    /// contributed to that superblock's outcome.
    pub fn spend_vote(&mut self, id: &Hash, block: u64, txhash: Hash) {
        let Some(vote) = self.votes.get(id) else {
            return;
        };
        let Some(proposal) = self.proposals.get(vote.proposal()) else {
            return;
        };
        if block > proposal.superblock() {
            return;
        }
        let superblock = proposal.superblock();
        if let Some(vote) = self.votes.get_mut(id) {
            vote.spend(block, txhash);
        }
        if let Some(vote) = self
            .sb_votes
            .get_mut(&superblock)
            .and_then(|votes| votes.get_mut(id))
        {
            vote.spend(block, txhash);
        }
    }

    /// Reverts a vote spend. Only reverts when the recorded spend matches
    /// `(block, txhash)` exactly, and never for votes whose superblock has
    /// already passed.
    pub fn unspend_vote(&mut self, id: &Hash, block: u64, txhash: &Hash) {
        let Some(vote) = self.votes.get(id) else {
            return;
        };
        let Some(proposal) = self.proposals.get(vote.proposal()) else {
            return;
        };
        if block > proposal.superblock() {
            return;
        }
        let superblock = proposal.superblock();
        if let Some(vote) = self.votes.get_mut(id) {
            vote.unspend(block, txhash);
        }
        if let Some(vote) = self
            .sb_votes
            .get_mut(&superblock)
            .and_then(|votes| votes.get_mut(id))
        {
            vote.unspend(block, txhash);
        }
    }

    /// Marks as spent every known vote of a not-yet-paid proposal whose utxo
    /// appears in the block's prevout map.
    pub fn mark_spent_votes(&mut self, prevouts: &HashMap<OutPoint, Hash>, height: u64) {
        let targets = self.votes_spent_by(prevouts, height);
        for (id, txhash) in targets {
            self.spend_vote(&id, height, txhash);
        }
    }

    /// Reverts the spends a disconnected block applied at `height`.
    pub fn unmark_spent_votes(&mut self, prevouts: &HashMap<OutPoint, Hash>, height: u64) {
        let targets: Vec<(Hash, Hash)> = self
            .votes
            .iter()
            .filter(|(_, v)| v.spent_block() == height)
            .filter_map(|(id, v)| prevouts.get(v.utxo()).map(|txhash| (*id, *txhash)))
            .collect();
        for (id, txhash) in targets {
            self.unspend_vote(&id, height, &txhash);
        }
    }

    /// Vote ids whose unspent utxo is consumed by the given prevout map and
    /// whose proposal's superblock is at or after `height`.
    fn votes_spent_by(&self, prevouts: &HashMap<OutPoint, Hash>, height: u64) -> Vec<(Hash, Hash)> {
        let mut targets = Vec::new();
        for (proposal_hash, proposal) in &self.proposals {
            if proposal.superblock() < height {
                continue;
            }
            let Some(votes) = self.sb_votes.get(&proposal.superblock()) else {
                continue;
            };
            for (id, vote) in votes {
                if vote.proposal() != proposal_hash || vote.is_spent() {
                    continue;
                }
                if let Some(txhash) = prevouts.get(vote.utxo()) {
                    targets.push((*id, *txhash));
                }
            }
        }
        targets
    }

}
