//! The governance engine: indexes proposals and votes observed on chain,
//! applies and undoes blocks, and answers queries from block validation and
//! the RPC layer.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::chain::{ChainView, LiveView};
use crate::codec::{NetworkObject, TYPE_PROPOSAL, TYPE_VOTE};
use crate::proposal::Proposal;
use crate::state::GovernanceState;
use crate::validator::{
    check_proposal, check_vote, outside_proposal_cutoff, outside_voting_cutoff,
};
use crate::vote::{make_vin_hash, VinHash, Vote, VoteChoice};
use ferrite_shared_types::{script, Block, ConsensusParams, Hash, OutPoint};

/// How block extraction treats proposal existence and cutoff windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExtractMode {
    /// A freshly connected tip block: votes require a proposal from a
    /// strictly earlier block, and every cutoff applies.
    Live,
    /// Initial chain load: the proposal cutoff still applies (a proposal
    /// carries its own superblock), but a scanned vote may precede its
    /// proposal, so vote-side proposal and cutoff checks are deferred to
    /// the loader's reconciliation pass.
    Load,
    /// Block disconnect: reconstruct exactly what was added when the block
    /// connected, with no cutoff or proposal checks.
    Undo,
}

/// Owned governance instance. The chain event adapter and RPC handlers hold
/// a shared reference; the single internal mutex is the only synchroniser
/// for the governance state.
pub struct Governance {
    params: ConsensusParams,
    state: Mutex<GovernanceState>,
}

impl Governance {
    pub fn new(params: ConsensusParams) -> Self {
        Governance {
            params,
            state: Mutex::new(GovernanceState::new()),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn lock(&self) -> MutexGuard<'_, GovernanceState> {
        self.state.lock().unwrap()
    }

    /// Clears all governance state.
    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn has_proposal(&self, hash: &Hash) -> bool {
        self.lock().has_proposal(hash)
    }

    /// True when the proposal exists and was recorded strictly before the
    /// given height.
    pub fn has_proposal_before(&self, hash: &Hash, height: u64) -> bool {
        self.lock().has_proposal_before(hash, height)
    }

    /// True when a proposal with this name targets the given superblock.
    pub fn has_proposal_named(&self, name: &str, superblock: u64) -> bool {
        self.lock()
            .proposals_for_superblock(superblock)
            .iter()
            .any(|p| p.name() == name)
    }

    pub fn has_vote(&self, id: &Hash) -> bool {
        self.lock().has_vote(id)
    }

    /// True when a known vote matches the proposal, choice, and utxo.
    pub fn has_vote_choice(&self, proposal: &Hash, choice: VoteChoice, utxo: &OutPoint) -> bool {
        self.votes_for_proposal(proposal)
            .iter()
            .any(|v| v.choice() == choice && v.utxo() == utxo)
    }

    pub fn get_proposal(&self, hash: &Hash) -> Option<Proposal> {
        self.lock().get_proposal(hash).cloned()
    }

    pub fn get_vote(&self, id: &Hash) -> Option<Vote> {
        self.lock().get_vote(id).cloned()
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.lock().proposals()
    }

    pub fn proposals_for_superblock(&self, superblock: u64) -> Vec<Proposal> {
        self.lock().proposals_for_superblock(superblock)
    }

    /// Proposals whose superblock is at or after the given height.
    pub fn proposals_since(&self, height: u64) -> Vec<Proposal> {
        self.lock().proposals_since(height)
    }

    /// All votes that haven't been spent.
    pub fn votes(&self) -> Vec<Vote> {
        self.lock().votes()
    }

    /// Unspent votes for one proposal.
    pub fn votes_for_proposal(&self, proposal: &Hash) -> Vec<Vote> {
        self.lock().votes_for_proposal(proposal)
    }

    /// Unspent votes targeting one superblock.
    pub fn votes_in_superblock(&self, superblock: u64) -> Vec<Vote> {
        self.lock().votes_in_superblock(superblock)
    }

    /// Snapshot of all votes, including spent ones.
    pub fn copy_votes(&self) -> Vec<(Hash, Vote)> {
        self.lock().copy_votes()
    }

    /// Snapshot of all proposals.
    pub fn copy_proposals(&self) -> Vec<Proposal> {
        self.lock().copy_proposals()
    }

    /// Applies the governance content of a block at the given height.
    ///
    /// `live` carries the utxo-set and mempool views used to reject new
    /// votes on already-spent utxos; a caller replaying blocks whose votes
    /// were already screened may pass `None` to skip those checks.
    pub fn process_block(
        &self,
        block: &Block,
        height: u64,
        chain: &dyn ChainView,
        live: Option<&LiveView<'_>>,
    ) {
        let (proposals, votes) = self.data_from_block(block, height, chain, ExtractMode::Live);

        // Consult the utxo set and mempool before taking the state lock; no
        // chain I/O happens while it is held.
        let votes: Vec<(Vote, bool)> = votes
            .into_iter()
            .map(|vote| {
                let spent = live
                    .map(|view| view.vote_utxo_spent(vote.utxo()))
                    .unwrap_or(false);
                (vote, spent)
            })
            .collect();

        {
            let mut state = self.lock();
            // Proposals first: vote insertion may depend on them.
            for proposal in proposals {
                state.add_proposal(proposal);
            }
            for (vote, utxo_spent) in votes {
                // Only brand-new votes get the spent check; a replacement
                // vote rides on the utxo already being accepted.
                if utxo_spent && !state.has_vote(&vote.id()) {
                    debug!(
                        "skipping vote {} whose utxo {} is already spent",
                        hex::encode(vote.id()),
                        vote.utxo()
                    );
                    continue;
                }
                state.add_vote(vote);
            }
        }

        // Mark known votes whose utxos this block spends. Votes of proposals
        // whose superblock has passed keep their contribution.
        let prevouts = block_prevouts(block);
        if !prevouts.is_empty() {
            self.lock().mark_spent_votes(&prevouts, height);
        }
    }

    /// Undoes the governance content of a disconnected block.
    pub fn undo_block(&self, block: &Block, height: u64, chain: &dyn ChainView) {
        let (proposals, votes) = self.data_from_block(block, height, chain, ExtractMode::Undo);
        let prevouts = block_prevouts(block);

        let mut state = self.lock();
        // Remove votes before proposals: vote removal resolves its
        // superblock index through the proposal.
        for vote in votes {
            let id = vote.id();
            let recorded_here = state
                .get_vote(&id)
                .map(|v| v.block_number() == height)
                .unwrap_or(false);
            if recorded_here {
                state.remove_vote(&id);
            }
        }
        for proposal in proposals {
            let hash = proposal.hash();
            let recorded_here = state
                .get_proposal(&hash)
                .map(|p| p.block_number() == height)
                .unwrap_or(false);
            if recorded_here {
                state.remove_proposal(&hash);
            }
        }
        state.unmark_spent_votes(&prevouts, height);
    }

    /// Extracts valid proposals and votes from a block's OP_RETURN outputs.
    /// Malformed or invalid objects are skipped without failing the block.
    /// In-block votes sharing a vote id are resolved by the replacement rule
    /// before they reach the store.
    pub(crate) fn data_from_block(
        &self,
        block: &Block,
        height: u64,
        chain: &dyn ChainView,
        mode: ExtractMode,
    ) -> (Vec<Proposal>, Vec<Vote>) {
        let mut proposals = Vec::new();
        let mut votes: HashMap<Hash, Vote> = HashMap::new();
        let block_time = block.header.timestamp;

        for tx in &block.transactions {
            if tx.is_coinbase() {
                continue;
            }
            let txid = tx.txid();
            let mut vin_hashes: Option<HashSet<VinHash>> = None;
            for (n, output) in tx.outputs.iter().enumerate() {
                let Some(payload) = script::op_return_payload(&output.script_pubkey) else {
                    continue;
                };
                let Ok(header) = NetworkObject::parse(payload) else {
                    continue;
                };
                if !header.is_valid() {
                    continue;
                }
                match header.obj_type {
                    TYPE_PROPOSAL => {
                        let proposal = match Proposal::deserialize(payload, height) {
                            Ok(proposal) => proposal,
                            Err(e) => {
                                debug!("skipping proposal in {}: {e}", hex::encode(txid));
                                continue;
                            }
                        };
                        if let Err(e) = check_proposal(&proposal, &self.params) {
                            debug!("skipping proposal {:?}: {e}", proposal.name());
                            continue;
                        }
                        if mode != ExtractMode::Undo
                            && !outside_proposal_cutoff(&proposal, height, &self.params)
                        {
                            debug!(
                                "skipping proposal {:?} inside the cutoff for superblock {}",
                                proposal.name(),
                                proposal.superblock()
                            );
                            continue;
                        }
                        proposals.push(proposal);
                    }
                    TYPE_VOTE => {
                        let hashes = vin_hashes.get_or_insert_with(|| {
                            tx.inputs
                                .iter()
                                .map(|input| make_vin_hash(&input.previous_output))
                                .collect()
                        });
                        let outpoint = OutPoint::new(txid, n as u32);
                        let mut vote =
                            match Vote::deserialize(payload, outpoint, block_time, height) {
                                Ok(vote) => vote,
                                Err(e) => {
                                    debug!("skipping vote in {}: {e}", hex::encode(txid));
                                    continue;
                                }
                            };
                        // A live vote needs its proposal confirmed in an
                        // earlier block.
                        if mode == ExtractMode::Live
                            && !self.has_proposal_before(vote.proposal(), height)
                        {
                            debug!(
                                "skipping vote for unknown proposal {}",
                                hex::encode(vote.proposal())
                            );
                            continue;
                        }
                        if let Err(e) = check_vote(&mut vote, hashes, chain, &self.params) {
                            debug!("skipping vote in {}: {e}", hex::encode(txid));
                            continue;
                        }
                        if mode == ExtractMode::Live {
                            if let Some(proposal) = self.get_proposal(vote.proposal()) {
                                if !outside_voting_cutoff(&proposal, height, &self.params) {
                                    debug!(
                                        "skipping vote inside the cutoff for superblock {}",
                                        proposal.superblock()
                                    );
                                    continue;
                                }
                            }
                        }
                        match votes.entry(vote.id()) {
                            std::collections::hash_map::Entry::Occupied(mut entry) => {
                                if vote.supersedes(entry.get()) {
                                    entry.insert(vote);
                                }
                            }
                            std::collections::hash_map::Entry::Vacant(entry) => {
                                entry.insert(vote);
                            }
                        }
                    }
                    other => {
                        debug!("skipping unknown governance object type {other}");
                    }
                }
            }
        }
        (proposals, votes.into_values().collect())
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut GovernanceState) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Map of every outpoint a block spends to the spending transaction's hash.
/// Computed once per block and shared by the apply and undo paths.
pub(crate) fn block_prevouts(block: &Block) -> HashMap<OutPoint, Hash> {
    let mut prevouts = HashMap::new();
    for tx in &block.transactions {
        let txid = tx.txid();
        for input in &tx.inputs {
            if input.previous_output.is_null() {
                continue;
            }
            prevouts.insert(input.previous_output.clone(), txid);
        }
    }
    prevouts
}
