//! Votes are cast on proposals by the holders of unspent outputs, with the
//! referenced utxo's value acting as voting weight.

use crate::codec::{NetworkObject, Reader, Writer, NETWORK_VERSION, TYPE_VOTE};
use crate::error::GovernanceError;
use ferrite_crypto::{sign_compact, tagged_hash256, SecretKey};
use ferrite_shared_types::{Amount, Hash, OutPoint, PubKeyHash};
use serde::{Deserialize, Serialize};

/// Domain string for vote identity digests.
const VOTE_HASH_DOMAIN: &str = "ferrite governance vote v1";
/// Domain string for vote signature digests.
const VOTE_SIG_DOMAIN: &str = "ferrite governance vote sig v1";
/// Domain string for vin-hash digests.
const VIN_HASH_DOMAIN: &str = "ferrite governance vin v1";

pub const VIN_HASH_SIZE: usize = 12;

/// Truncated digest of a transaction input's prevout. Votes declare the vin
/// hash of one input of their enclosing transaction, binding the vote to that
/// transaction and preventing replay in another.
pub type VinHash = [u8; VIN_HASH_SIZE];

/// Computes the vin hash of a prevout.
pub fn make_vin_hash(prevout: &OutPoint) -> VinHash {
    let mut writer = Writer::new();
    writer.put_outpoint(prevout);
    let digest = tagged_hash256(VIN_HASH_DOMAIN, &writer.into_bytes());
    let mut out = [0u8; VIN_HASH_SIZE];
    out.copy_from_slice(&digest[..VIN_HASH_SIZE]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteChoice {
    No = 0,
    Yes = 1,
    Abstain = 2,
}

impl VoteChoice {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(VoteChoice::No),
            1 => Some(VoteChoice::Yes),
            2 => Some(VoteChoice::Abstain),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoteChoice::No => "no",
            VoteChoice::Yes => "yes",
            VoteChoice::Abstain => "abstain",
        }
    }

    /// Parses the lowercase label used by the wallet and RPC layers.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "no" => Some(VoteChoice::No),
            "yes" => Some(VoteChoice::Yes),
            "abstain" => Some(VoteChoice::Abstain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    version: u8,
    proposal: Hash,
    choice: VoteChoice,
    utxo: OutPoint,
    vin_hash: VinHash,
    signature: Vec<u8>,

    // Memory-only fields, populated while processing the containing block.
    key_id: PubKeyHash,
    amount: Amount,
    /// Outpoint of the OP_RETURN output carrying this vote (not the voting
    /// utxo above).
    outpoint: OutPoint,
    /// Time of the containing block.
    time: u64,
    /// Height of the containing block.
    block_number: u64,
    /// Height of the block that spent the voting utxo, 0 while unspent.
    spent_block: u64,
    /// Hash of the transaction that spent the voting utxo.
    spent_hash: Hash,
}

impl Vote {
    pub fn new(proposal: Hash, choice: VoteChoice, utxo: OutPoint, vin_hash: VinHash) -> Self {
        Vote {
            version: NETWORK_VERSION,
            proposal,
            choice,
            utxo,
            vin_hash,
            signature: Vec::new(),
            key_id: [0u8; 20],
            amount: 0,
            outpoint: OutPoint::null(),
            time: 0,
            block_number: 0,
            spent_block: 0,
            spent_hash: [0u8; 32],
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn proposal(&self) -> &Hash {
        &self.proposal
    }

    pub fn choice(&self) -> VoteChoice {
        self.choice
    }

    pub fn utxo(&self) -> &OutPoint {
        &self.utxo
    }

    pub fn vin_hash(&self) -> &VinHash {
        &self.vin_hash
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn key_id(&self) -> &PubKeyHash {
        &self.key_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn outpoint(&self) -> &OutPoint {
        &self.outpoint
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn spent_block(&self) -> u64 {
        self.spent_block
    }

    pub fn is_spent(&self) -> bool {
        self.spent_block > 0
    }

    /// Fills the fields the validator resolves from the chain: the owning
    /// key and the value of the voting utxo.
    pub(crate) fn resolve(&mut self, key_id: PubKeyHash, amount: Amount) {
        self.key_id = key_id;
        self.amount = amount;
    }

    /// Marks the voting utxo as spent by `txhash` at `block`.
    pub fn spend(&mut self, block: u64, txhash: Hash) {
        self.spent_block = block;
        self.spent_hash = txhash;
    }

    /// Reverts a spend. Only succeeds when the recorded spend matches the
    /// given block and transaction exactly.
    pub fn unspend(&mut self, block: u64, txhash: &Hash) -> bool {
        if self.spent_block == block && self.spent_hash == *txhash {
            self.spent_block = 0;
            self.spent_hash = [0u8; 32];
            return true;
        }
        false
    }

    /// Canonical wire bytes: `version, type, proposal, choice, utxo,
    /// vin_hash, signature`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.put_u8(self.version);
        writer.put_u8(TYPE_VOTE);
        writer.put_hash(&self.proposal);
        writer.put_u8(self.choice.to_u8());
        writer.put_outpoint(&self.utxo);
        writer.put_raw(&self.vin_hash);
        writer.put_bytes(&self.signature);
        writer.into_bytes()
    }

    /// Parses a vote payload. `outpoint` is the location of the OP_RETURN
    /// output the vote was read from, `time` and `block_number` describe the
    /// containing block.
    pub fn deserialize(
        payload: &[u8],
        outpoint: OutPoint,
        time: u64,
        block_number: u64,
    ) -> Result<Self, GovernanceError> {
        let header = NetworkObject::parse(payload)?;
        if header.obj_type != TYPE_VOTE {
            return Err(GovernanceError::Parse(format!(
                "expected vote payload, got type {}",
                header.obj_type
            )));
        }
        let mut reader = Reader::new(payload);
        let version = reader.get_u8()?;
        let _obj_type = reader.get_u8()?;
        let proposal = reader.get_hash()?;
        let choice_byte = reader.get_u8()?;
        let choice = VoteChoice::from_u8(choice_byte)
            .ok_or_else(|| GovernanceError::Parse(format!("invalid vote choice {choice_byte}")))?;
        let utxo = reader.get_outpoint()?;
        let vin_bytes = reader.get_raw(VIN_HASH_SIZE)?;
        let mut vin_hash = [0u8; VIN_HASH_SIZE];
        vin_hash.copy_from_slice(vin_bytes);
        let signature = reader.get_bytes()?;
        Ok(Vote {
            version,
            proposal,
            choice,
            utxo,
            vin_hash,
            signature,
            key_id: [0u8; 20],
            amount: 0,
            outpoint,
            time,
            block_number,
            spent_block: 0,
            spent_hash: [0u8; 32],
        })
    }

    /// Vote identity: digest over `version, type, proposal, utxo`. The
    /// choice is deliberately excluded so that a later vote on the same utxo
    /// replaces the earlier one instead of coexisting with it.
    pub fn id(&self) -> Hash {
        let mut writer = Writer::new();
        writer.put_u8(self.version);
        writer.put_u8(TYPE_VOTE);
        writer.put_hash(&self.proposal);
        writer.put_outpoint(&self.utxo);
        tagged_hash256(VOTE_HASH_DOMAIN, &writer.into_bytes())
    }

    /// The digest the compact signature covers: `version, type, proposal,
    /// choice, utxo, vin_hash`. Unlike [`Vote::id`] it includes the choice,
    /// binding the signature to one specific vote.
    pub fn sig_hash(&self) -> Hash {
        let mut writer = Writer::new();
        writer.put_u8(self.version);
        writer.put_u8(TYPE_VOTE);
        writer.put_hash(&self.proposal);
        writer.put_u8(self.choice.to_u8());
        writer.put_outpoint(&self.utxo);
        writer.put_raw(&self.vin_hash);
        tagged_hash256(VOTE_SIG_DOMAIN, &writer.into_bytes())
    }

    /// Signs the vote with the key controlling the voting utxo. Used by the
    /// wallet when casting votes.
    pub fn sign(&mut self, secret: &SecretKey) {
        self.signature = sign_compact(secret, &self.sig_hash()).to_vec();
    }

    /// Replacement rule for competing votes with the same [`Vote::id`]: a
    /// strictly newer block time wins; at equal times the larger
    /// [`Vote::sig_hash`], compared as a big-endian 256-bit integer, wins.
    /// The equal-time tie-break is kept for consensus compatibility even
    /// though a voter could find it surprising; wallets avoid it by waiting
    /// one block between vote changes.
    pub fn supersedes(&self, other: &Vote) -> bool {
        self.time > other.time || (self.time == other.time && self.sig_hash() > other.sig_hash())
    }
}
