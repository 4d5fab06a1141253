//! Stateless validation rules for parsed governance objects, plus the
//! superblock and cutoff arithmetic used throughout the subsystem.
//!
//! Signature recovery happens here rather than in the codec, keeping parsing
//! cheap and letting tests inject invalid signatures directly.

use std::collections::HashSet;

use crate::chain::ChainView;
use crate::codec::NETWORK_VERSION;
use crate::error::GovernanceError;
use crate::proposal::Proposal;
use crate::vote::{VinHash, Vote};
use ferrite_crypto::{pubkey_hash, recover_compact};
use ferrite_shared_types::{address, script, ConsensusParams};

/// Checks every proposal invariant. Returns the first violated rule.
pub fn check_proposal(proposal: &Proposal, params: &ConsensusParams) -> Result<(), GovernanceError> {
    if proposal.version() != NETWORK_VERSION {
        return Err(GovernanceError::Validation(format!(
            "bad proposal network version {}",
            proposal.version()
        )));
    }
    if !valid_proposal_name(proposal.name()) {
        return Err(GovernanceError::Validation(format!(
            "proposal name {:?} is invalid, only alphanumerics, spaces, dashes and underscores are accepted",
            proposal.name()
        )));
    }
    if proposal.superblock() == 0 || proposal.superblock() % params.superblock != 0 {
        return Err(GovernanceError::Validation(format!(
            "bad superblock number {}",
            proposal.superblock()
        )));
    }
    let max_amount = params
        .proposal_max_amount
        .min(params.block_subsidy(proposal.superblock()));
    if proposal.amount() < params.proposal_min_amount || proposal.amount() > max_amount {
        return Err(GovernanceError::Validation(format!(
            "bad proposal amount {}, specify an amount between {} and {}",
            proposal.amount(),
            params.proposal_min_amount,
            max_amount
        )));
    }
    if address::decode_destination(proposal.address()).is_none() {
        return Err(GovernanceError::Validation(format!(
            "bad payment address {}",
            proposal.address()
        )));
    }
    // -1 for OP_RETURN, -2 for the push-data opcode bytes.
    let max_bytes = params.max_op_return_relay - 3;
    let serialized = proposal.serialize();
    if serialized.len() > max_bytes {
        return Err(GovernanceError::Validation(format!(
            "proposal is too long by {} bytes, reduce the name, url, or description",
            serialized.len() - max_bytes
        )));
    }
    Ok(())
}

/// Proposal names are word characters with interior spaces and dashes
/// allowed: the first and last character must be alphanumeric or '_'.
fn valid_proposal_name(name: &str) -> bool {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let interior = |c: char| word(c) || c == '-' || c == ' ';
    let mut chars = name.chars();
    let (Some(first), Some(last)) = (chars.next(), name.chars().next_back()) else {
        return false;
    };
    name.chars().count() >= 2 && word(first) && word(last) && chars.all(interior)
}

/// Checks every vote invariant and fills the vote's memory-only owner and
/// amount fields from the chain.
///
/// `vin_hashes` is the set of truncated prevout hashes of the enclosing
/// transaction's inputs; requiring membership binds the vote to that
/// transaction and defeats replay in a different one.
pub fn check_vote(
    vote: &mut Vote,
    vin_hashes: &HashSet<VinHash>,
    chain: &dyn ChainView,
    params: &ConsensusParams,
) -> Result<(), GovernanceError> {
    if vote.version() != NETWORK_VERSION {
        return Err(GovernanceError::Validation(format!(
            "bad vote network version {}",
            vote.version()
        )));
    }
    if !vin_hashes.contains(vote.vin_hash()) {
        return Err(GovernanceError::Validation(
            "vote vin hash does not match any input of its transaction".to_string(),
        ));
    }
    let output = chain.utxo_output(vote.utxo()).ok_or_else(|| {
        GovernanceError::Validation(format!("voting utxo {} not found", vote.utxo()))
    })?;
    if output.value < params.vote_min_utxo_amount {
        return Err(GovernanceError::Validation(format!(
            "voting utxo amount {} is below the minimum {}",
            output.value, params.vote_min_utxo_amount
        )));
    }
    let key_id = script::extract_destination(&output.script_pubkey).ok_or_else(|| {
        GovernanceError::Validation(format!(
            "voting utxo {} has no spendable destination",
            vote.utxo()
        ))
    })?;
    let pubkey = recover_compact(&vote.sig_hash(), vote.signature())
        .map_err(|e| GovernanceError::Validation(format!("vote signature invalid: {e}")))?;
    if pubkey_hash(&pubkey.serialize()) != key_id {
        return Err(GovernanceError::Validation(
            "vote signature does not match the utxo owner".to_string(),
        ));
    }
    vote.resolve(key_id, output.value);
    Ok(())
}

/// True when `height` is a superblock: a positive multiple of the period at
/// or past governance activation.
pub fn is_superblock(height: u64, params: &ConsensusParams) -> bool {
    height >= params.governance_block && height > 0 && height % params.superblock == 0
}

/// The first superblock strictly after `from`.
pub fn next_superblock(from: u64, params: &ConsensusParams) -> u64 {
    from - from % params.superblock + params.superblock
}

/// The superblock at or before `from`.
pub fn previous_superblock(from: u64, params: &ConsensusParams) -> u64 {
    next_superblock(from, params) - params.superblock
}

/// A proposal may only be ingested from blocks before its superblock's
/// proposal cutoff window opens.
pub fn outside_proposal_cutoff(proposal: &Proposal, height: u64, params: &ConsensusParams) -> bool {
    if proposal.is_null() {
        return false;
    }
    height < proposal.superblock().saturating_sub(params.proposal_cutoff)
}

/// A vote may only be ingested from blocks before its proposal's voting
/// cutoff window opens.
pub fn outside_voting_cutoff(proposal: &Proposal, height: u64, params: &ConsensusParams) -> bool {
    if proposal.is_null() {
        return false;
    }
    height < proposal.superblock().saturating_sub(params.voting_cutoff)
}

/// True when `height` falls in the superblock's vote cutoff window, during
/// which vote utxos are being counted and should not be spent.
pub fn inside_vote_cutoff(superblock: u64, height: u64, params: &ConsensusParams) -> bool {
    height >= superblock.saturating_sub(params.voting_cutoff) && height <= superblock
}
