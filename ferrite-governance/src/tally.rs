//! Vote aggregation and superblock payout selection.
//!
//! Tallying defends against one economic identity counting the same coins
//! twice: votes in the same transaction are assumed co-authored, as are
//! votes paying to the same key, and every vote is counted at most once
//! across those groupings.

use std::collections::{BTreeMap, HashSet};

use crate::error::GovernanceError;
use crate::proposal::Proposal;
use crate::validator::{inside_vote_cutoff, is_superblock, next_superblock};
use crate::vote::{Vote, VoteChoice};
use ferrite_shared_types::{
    address, Amount, Block, ConsensusParams, Hash, OutPoint, PubKeyHash, TxOutput,
};

use crate::governance::Governance;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub yes: i64,
    pub no: i64,
    pub abstain: i64,
    /// Coin amounts backing each count.
    pub cyes: Amount,
    pub cno: Amount,
    pub cabstain: Amount,
}

impl Tally {
    pub fn net_yes(&self) -> i64 {
        self.yes - self.no
    }

    /// Fraction of yes among decided votes. For reporting only; consensus
    /// thresholds are evaluated in integer arithmetic.
    pub fn passing(&self) -> f64 {
        self.yes as f64 / (self.yes + self.no) as f64
    }

    fn accumulate(&mut self, other: &Tally) {
        self.yes += other.yes;
        self.no += other.no;
        self.abstain += other.abstain;
        self.cyes += other.cyes;
        self.cno += other.cno;
        self.cabstain += other.cabstain;
    }
}

/// Aggregates the votes for one proposal.
///
/// Votes are grouped by their enclosing transaction and cross-referenced by
/// the key their utxo pays; each group is sub-tallied separately with its
/// amounts integer-divided by `vote_balance`, then the sub-tallies are
/// summed. A global counted set guarantees no vote contributes twice.
pub fn tally_votes(proposal: &Hash, votes: &[Vote], params: &ConsensusParams) -> Tally {
    // Ordered grouping keeps the per-user sub-tallies, and therefore the
    // integer truncation, identical across runs and input permutations.
    let mut by_tx: BTreeMap<Hash, Vec<&Vote>> = BTreeMap::new();
    let mut by_key: BTreeMap<PubKeyHash, Vec<&Vote>> = BTreeMap::new();
    for vote in votes.iter().filter(|v| v.proposal() == proposal) {
        by_tx.entry(vote.outpoint().txid).or_default().push(vote);
        by_key.entry(*vote.key_id()).or_default().push(vote);
    }

    let mut counted: HashSet<Hash> = HashSet::new();
    let mut total = Tally::default();
    for group in by_tx.values() {
        // The votes in this transaction plus every vote sharing a key with
        // one of them form a single economic identity.
        let mut user: BTreeMap<Hash, &Vote> = BTreeMap::new();
        for &vote in group {
            user.insert(vote.id(), vote);
            if let Some(related) = by_key.get(vote.key_id()) {
                for &vote in related {
                    user.insert(vote.id(), vote);
                }
            }
        }
        user.retain(|id, _| !counted.contains(id));
        if user.is_empty() {
            continue;
        }
        counted.extend(user.keys().copied());

        let mut sub = Tally::default();
        for vote in user.values() {
            match vote.choice() {
                VoteChoice::Yes => sub.cyes += vote.amount(),
                VoteChoice::No => sub.cno += vote.amount(),
                VoteChoice::Abstain => sub.cabstain += vote.amount(),
            }
        }
        sub.yes = (sub.cyes / params.vote_balance).max(0);
        sub.no = (sub.cno / params.vote_balance).max(0);
        sub.abstain = (sub.cabstain / params.vote_balance).max(0);
        total.accumulate(&sub);
    }
    total
}

/// The deterministic payee list for a superblock's surviving proposals.
///
/// Proposals are ordered by net yes votes descending, then yes votes
/// descending, then submission height ascending, then proposal hash, and
/// greedily fitted into the superblock budget; a proposal that does not fit
/// is skipped so smaller ones behind it still can.
pub fn superblock_payees(
    superblock: u64,
    results: &[(Proposal, Tally)],
    params: &ConsensusParams,
) -> Vec<TxOutput> {
    let mut ordered: Vec<&(Proposal, Tally)> = results.iter().collect();
    ordered.sort_by(|a, b| {
        b.1.net_yes()
            .cmp(&a.1.net_yes())
            .then_with(|| b.1.yes.cmp(&a.1.yes))
            .then_with(|| a.0.block_number().cmp(&b.0.block_number()))
            .then_with(|| a.0.hash().cmp(&b.0.hash()))
    });

    let mut remaining = params
        .proposal_max_amount
        .min(params.block_subsidy(superblock));
    let mut payees = Vec::new();
    for (proposal, _) in ordered {
        if proposal.amount() > remaining {
            continue;
        }
        let Some(dest) = address::decode_destination(proposal.address()) else {
            continue;
        };
        remaining -= proposal.amount();
        payees.push(TxOutput::new(
            proposal.amount(),
            address::script_for_destination(&dest),
        ));
    }
    payees
}

impl Governance {
    /// The proposals scheduled for a superblock together with their votes.
    pub fn proposals_and_votes_for_superblock(
        &self,
        superblock: u64,
    ) -> (Vec<Proposal>, Vec<Vote>) {
        let (proposals, votes) = self.with_state(|state| {
            (
                state.proposals_for_superblock(superblock),
                state.votes_in_superblock(superblock),
            )
        });
        let hashes: HashSet<Hash> = proposals.iter().map(|p| p.hash()).collect();
        let votes = votes
            .into_iter()
            .filter(|v| hashes.contains(v.proposal()))
            .collect();
        (proposals, votes)
    }

    /// Tallies every proposal scheduled for the superblock and drops those
    /// failing any threshold: at least one decided vote, 60% approval, 25%
    /// participation relative to all distinct voting utxos, and at least one
    /// yes. The result is ordered by proposal hash.
    pub fn superblock_results(&self, superblock: u64) -> Vec<(Proposal, Tally)> {
        if !is_superblock(superblock, self.params()) {
            return Vec::new();
        }
        let (proposals, votes) = self.proposals_and_votes_for_superblock(superblock);

        let mut unique: HashSet<&OutPoint> = HashSet::new();
        let mut unique_amount: Amount = 0;
        for vote in &votes {
            if unique.insert(vote.utxo()) {
                unique_amount += vote.amount();
            }
        }
        let unique_votes = unique_amount / self.params().vote_balance;

        let mut results: Vec<(Proposal, Tally)> = proposals
            .into_iter()
            .map(|proposal| {
                let tally = tally_votes(&proposal.hash(), &votes, self.params());
                (proposal, tally)
            })
            .filter(|(_, tally)| {
                let decided = tally.yes + tally.no;
                let participation = tally.yes + tally.no + tally.abstain;
                decided > 0
                    && 5 * tally.yes >= 3 * decided
                    && 4 * participation >= unique_votes
                    && tally.yes > 0
            })
            .collect();
        results.sort_by(|a, b| a.0.hash().cmp(&b.0.hash()));
        results
    }

    /// Validates a superblock's payout set against the governance results.
    /// Returns the total amount expected to be paid.
    ///
    /// With no passing proposals any proof-of-stake block passes. Otherwise
    /// the coinstake must pay each expected payee exactly once, with at most
    /// two unmatched outputs allowed for the coinstake marker and the
    /// staker's own payment.
    pub fn is_valid_superblock(
        &self,
        block: &Block,
        height: u64,
    ) -> Result<Amount, GovernanceError> {
        if !is_superblock(height, self.params()) {
            return Err(GovernanceError::ConsensusViolation(format!(
                "height {height} is not a superblock"
            )));
        }
        if !block.is_proof_of_stake() {
            return Err(GovernanceError::ConsensusViolation(
                "superblock payout must be in a proof-of-stake coinstake".to_string(),
            ));
        }

        let results = self.superblock_results(height);
        if results.is_empty() {
            return Ok(0);
        }
        let payees = superblock_payees(height, &results, self.params());
        if payees.is_empty() {
            return Err(GovernanceError::ConsensusViolation(
                "no passing proposal fits the superblock budget".to_string(),
            ));
        }
        let total: Amount = payees.iter().map(|payee| payee.value).sum();

        let outputs = &block.transactions[1].outputs;
        if outputs.len() > payees.len() + 2 {
            return Err(GovernanceError::ConsensusViolation(format!(
                "superblock coinstake has {} outputs for {} payees",
                outputs.len(),
                payees.len()
            )));
        }

        let mut expected = payees;
        let mut unmatched = 0usize;
        for output in outputs {
            if let Some(pos) = expected.iter().position(|payee| payee == output) {
                expected.remove(pos);
            } else {
                unmatched += 1;
            }
        }
        if !expected.is_empty() {
            return Err(GovernanceError::ConsensusViolation(format!(
                "superblock coinstake is missing {} expected payee(s)",
                expected.len()
            )));
        }
        if unmatched > 2 {
            return Err(GovernanceError::ConsensusViolation(format!(
                "superblock coinstake has {unmatched} unexpected outputs"
            )));
        }
        Ok(total)
    }

    /// True when the utxo backs a vote for the upcoming superblock and the
    /// tip is inside that superblock's vote cutoff. The wallet refuses to
    /// spend such utxos while their votes are being counted.
    pub fn utxo_in_vote_cutoff(&self, utxo: &OutPoint, tip_height: u64) -> bool {
        let superblock = next_superblock(tip_height, self.params());
        if !inside_vote_cutoff(superblock, tip_height, self.params()) {
            return false;
        }
        let (_, votes) = self.proposals_and_votes_for_superblock(superblock);
        votes.iter().any(|vote| vote.utxo() == utxo)
    }
}
