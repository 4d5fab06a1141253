use serde::{Deserialize, Serialize};

pub mod address;
pub mod script;

pub type Hash = [u8; 32];
pub type PubKeyHash = [u8; 20];

/// Amounts are expressed in the chain's smallest unit.
pub type Amount = i64;

/// One whole coin in base units.
pub const COIN: Amount = 100_000_000;

/// Represents a reference to a specific transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// The transaction ID (hash) of the transaction containing the output.
    pub txid: Hash,
    /// The index of the output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// The null outpoint marks coinbase inputs.
    pub fn null() -> Self {
        OutPoint {
            txid: [0u8; 32],
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == [0u8; 32] && self.vout == u32::MAX
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.vout)
    }
}

/// Represents a transaction input, referencing a previous transaction's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The `OutPoint` referencing the output being spent.
    pub previous_output: OutPoint,
    /// The script signature, providing proof of ownership.
    pub script_sig: Vec<u8>,
    /// A sequence number, typically used for replace-by-fee or relative lock-times.
    pub sequence: u32,
}

impl TxInput {
    pub fn new(previous_output: OutPoint) -> Self {
        TxInput {
            previous_output,
            script_sig: Vec::new(),
            sequence: u32::MAX,
        }
    }
}

/// Represents a transaction output, specifying a value and a locking script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// The value of the output in base units.
    pub value: Amount,
    /// The locking script (scriptPubKey) that defines the conditions for spending this output.
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        TxOutput {
            value,
            script_pubkey,
        }
    }

    /// An empty output, used as the coinstake marker in proof-of-stake blocks.
    pub fn empty() -> Self {
        TxOutput {
            value: 0,
            script_pubkey: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// Represents a transaction in the blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The version of the transaction format.
    pub version: u32,
    /// A list of transaction inputs.
    pub inputs: Vec<TxInput>,
    /// A list of transaction outputs.
    pub outputs: Vec<TxOutput>,
    /// The lock time of the transaction.
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Transaction {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Returns the canonical byte representation of the transaction.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }

    /// Calculates and returns the transaction ID (hash) of the transaction.
    pub fn txid(&self) -> Hash {
        blake3::hash(&self.to_bytes()).into()
    }

    /// Checks if the transaction is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Checks if the transaction is a coinstake transaction. A coinstake
    /// spends real inputs and carries an empty marker as its first output.
    pub fn is_coinstake(&self) -> bool {
        !self.is_coinbase()
            && !self.inputs.is_empty()
            && !self.outputs.is_empty()
            && self.outputs[0].is_empty()
    }
}

/// Represents a block header in the blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub previous_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u64,
    pub nonce: u64,
    pub difficulty_target: u32,
    pub height: u64,
}

impl BlockHeader {
    /// Calculates the hash of the block header.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).unwrap();
        blake3::hash(&bytes).into()
    }
}

/// Represents a block in the blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Calculates the hash of the block.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// A block is proof-of-stake when its second transaction is a coinstake.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }
}

/// Defines the consensus parameters for the blockchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Interval in blocks between superblocks.
    pub superblock: u64,
    /// Height at which the governance system activates.
    pub governance_block: u64,
    /// Blocks before a superblock after which new proposals are refused.
    pub proposal_cutoff: u64,
    /// Blocks before a superblock after which new votes are refused.
    pub voting_cutoff: u64,
    /// Minimum amount a proposal may request.
    pub proposal_min_amount: Amount,
    /// Maximum amount a proposal may request.
    pub proposal_max_amount: Amount,
    /// Fee burned when submitting a proposal.
    pub proposal_fee: Amount,
    /// Minimum value of a utxo used to cast a vote.
    pub vote_min_utxo_amount: Amount,
    /// Coin balance backing one counted vote.
    pub vote_balance: Amount,
    /// Maximum relayed OP_RETURN script size in bytes.
    pub max_op_return_relay: usize,
    /// Initial block reward (in base units).
    pub initial_block_reward: Amount,
    /// Halving interval for block rewards (in blocks).
    pub halving_interval: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            superblock: 43_200,                    // monthly at 1 block/min
            governance_block: 100_000,
            proposal_cutoff: 2_880,                // 2 days
            voting_cutoff: 60,                     // 1 hour
            proposal_min_amount: 10 * COIN,
            proposal_max_amount: 40_000 * COIN,
            proposal_fee: 10 * COIN,
            vote_min_utxo_amount: COIN,
            vote_balance: 1_000 * COIN,
            max_op_return_relay: 160,
            initial_block_reward: 50 * COIN,
            halving_interval: 210_000,
        }
    }
}

impl ConsensusParams {
    pub fn regtest() -> Self {
        ConsensusParams {
            superblock: 100,
            governance_block: 1,
            proposal_cutoff: 20,
            voting_cutoff: 10,
            proposal_min_amount: COIN,
            proposal_max_amount: 1_000 * COIN,
            proposal_fee: COIN,
            vote_min_utxo_amount: COIN,
            vote_balance: COIN,
            max_op_return_relay: 160,
            initial_block_reward: 1_000 * COIN,
            halving_interval: 150_000,
        }
    }

    /// Block reward at the given height, halving every `halving_interval` blocks.
    pub fn block_subsidy(&self, height: u64) -> Amount {
        let halvings = height / self.halving_interval;
        if halvings >= 63 {
            return 0;
        }
        self.initial_block_reward >> halvings
    }
}
