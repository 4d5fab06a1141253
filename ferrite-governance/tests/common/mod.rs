//! In-memory chain harness shared by the governance integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::{HashMap, HashSet};

use ferrite_crypto::{pubkey_hash, public_key, SecretKey};
use ferrite_governance::{
    make_vin_hash, ChainView, CoinView, Governance, GovernanceError, LiveView, MempoolView,
    Proposal, Vote, VoteChoice,
};
use ferrite_shared_types::{
    script, Amount, Block, BlockHeader, ConsensusParams, Hash, OutPoint, PubKeyHash, Transaction,
    TxInput, TxOutput, COIN,
};

/// Deterministic secret key for test identity `i`.
pub fn key(i: u8) -> SecretKey {
    let mut bytes = [0u8; 32];
    bytes[31] = i;
    bytes[0] = 1;
    SecretKey::from_slice(&bytes).expect("secret key")
}

pub fn dest(secret: &SecretKey) -> PubKeyHash {
    pubkey_hash(&public_key(secret).serialize())
}

/// In-memory chain implementing the governance collaborator traits.
#[derive(Default)]
pub struct MockChain {
    pub blocks: Vec<Block>,
    outputs: HashMap<OutPoint, TxOutput>,
    spent: HashSet<OutPoint>,
    pub mempool_spent: HashSet<OutPoint>,
}

impl MockChain {
    /// Creates a chain holding only the genesis block.
    pub fn new() -> Self {
        let mut chain = MockChain::default();
        chain.push_block(Vec::new());
        chain
    }

    /// Appends a block carrying the given transactions after a synthetic
    /// coinbase, indexes its outputs and spends, and returns it with its
    /// height.
    pub fn push_block(&mut self, txs: Vec<Transaction>) -> (Block, u64) {
        self.push_block_with_coinbase(Vec::new(), txs)
    }

    /// Appends a block whose coinbase pays the given outputs.
    pub fn push_block_with_coinbase(
        &mut self,
        coinbase_outputs: Vec<TxOutput>,
        txs: Vec<Transaction>,
    ) -> (Block, u64) {
        let height = self.blocks.len() as u64;
        let mut coinbase = Transaction::new(vec![TxInput::new(OutPoint::null())], coinbase_outputs);
        // Distinct lock times keep coinbase txids unique across heights.
        coinbase.lock_time = height as u32;

        let mut transactions = vec![coinbase];
        transactions.extend(txs);
        let previous_block_hash = self
            .blocks
            .last()
            .map(|b| b.hash())
            .unwrap_or([0u8; 32]);
        let block = Block {
            header: BlockHeader {
                version: 1,
                previous_block_hash,
                merkle_root: [0u8; 32],
                timestamp: 1_000_000 + height * 60,
                nonce: 0,
                difficulty_target: 0x1d00_ffff,
                height,
            },
            transactions,
        };
        self.index(&block);
        self.blocks.push(block.clone());
        (block, height)
    }

    fn index(&mut self, block: &Block) {
        for tx in &block.transactions {
            let txid = tx.txid();
            for input in &tx.inputs {
                if !input.previous_output.is_null() {
                    self.spent.insert(input.previous_output.clone());
                }
            }
            for (n, output) in tx.outputs.iter().enumerate() {
                self.outputs
                    .insert(OutPoint::new(txid, n as u32), output.clone());
            }
        }
    }

    /// Mines a block whose coinbase pays one P2PKH output per requested
    /// (destination, amount) pair, returning the outpoints.
    pub fn fund(&mut self, specs: &[(PubKeyHash, Amount)]) -> (Block, u64, Vec<OutPoint>) {
        let outputs: Vec<TxOutput> = specs
            .iter()
            .map(|(dest, amount)| TxOutput::new(*amount, script::p2pkh_script(dest)))
            .collect();
        let (block, height) = self.push_block_with_coinbase(outputs, Vec::new());
        let txid = block.transactions[0].txid();
        let outpoints = (0..specs.len())
            .map(|n| OutPoint::new(txid, n as u32))
            .collect();
        (block, height, outpoints)
    }
}

impl ChainView for MockChain {
    fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn read_block(&self, height: u64) -> Result<Block, GovernanceError> {
        self.blocks
            .get(height as usize)
            .cloned()
            .ok_or(GovernanceError::ChainIo {
                height,
                reason: "block not found".to_string(),
            })
    }

    fn utxo_output(&self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.outputs.get(outpoint).cloned()
    }
}

impl CoinView for MockChain {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<TxOutput> {
        if self.spent.contains(outpoint) {
            return None;
        }
        self.outputs.get(outpoint).cloned()
    }
}

impl MempoolView for MockChain {
    fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.mempool_spent.contains(outpoint)
    }
}

/// Applies a block to the governance engine with the live views, the way
/// the event adapter does for a freshly connected block.
pub fn connect(gov: &Governance, chain: &MockChain, block: &Block, height: u64) {
    let live = LiveView {
        coins: chain,
        mempool: chain,
    };
    gov.process_block(block, height, chain, Some(&live));
}

/// Mines and connects empty blocks until the chain tip is at `height`.
pub fn mine_until(gov: &Governance, chain: &mut MockChain, height: u64) {
    while chain.height() < height {
        let (block, h) = chain.push_block(Vec::new());
        connect(gov, chain, &block, h);
    }
}

/// A transaction submitting a proposal, paying the fee from `fee_utxo`.
pub fn proposal_tx(proposal: &Proposal, fee_utxo: &OutPoint) -> Transaction {
    Transaction::new(
        vec![TxInput::new(fee_utxo.clone())],
        vec![TxOutput::new(
            0,
            script::op_return_script(&proposal.serialize()),
        )],
    )
}

/// A transaction casting a vote with `vote_utxo` as the voting coin, signed
/// by the utxo's owner, spending `fee_utxo` as the vin-hash binding input.
pub fn vote_tx(
    proposal: Hash,
    choice: VoteChoice,
    vote_utxo: &OutPoint,
    fee_utxo: &OutPoint,
    owner: &SecretKey,
) -> (Transaction, Vote) {
    let mut vote = Vote::new(proposal, choice, vote_utxo.clone(), make_vin_hash(fee_utxo));
    vote.sign(owner);
    let tx = Transaction::new(
        vec![TxInput::new(fee_utxo.clone())],
        vec![TxOutput::new(0, script::op_return_script(&vote.serialize()))],
    );
    (tx, vote)
}

/// The standard regtest proposal used across tests: pay `amount` to the
/// address of identity 99 at superblock 200.
pub fn test_proposal(name: &str, amount: Amount) -> Proposal {
    Proposal::new(
        name,
        200,
        amount,
        hex::encode(dest(&key(99))),
        "https://example.org/proposal",
        "integration test proposal",
    )
}

pub fn regtest() -> ConsensusParams {
    ConsensusParams::regtest()
}

/// Funds `n` voting utxos of 1 COIN for identities `first..first+n` plus one
/// fee utxo each, connecting the funding block. Returns (vote utxo, fee
/// utxo, key index) triples.
pub fn fund_voters(
    gov: &Governance,
    chain: &mut MockChain,
    first: u8,
    n: u8,
) -> Vec<(OutPoint, OutPoint, u8)> {
    let mut specs = Vec::new();
    for i in 0..n {
        specs.push((dest(&key(first + i)), COIN));
        specs.push((dest(&key(first + i)), COIN / 2));
    }
    let (block, height, outpoints) = chain.fund(&specs);
    connect(gov, chain, &block, height);
    (0..n as usize)
        .map(|i| {
            (
                outpoints[2 * i].clone(),
                outpoints[2 * i + 1].clone(),
                first + i as u8,
            )
        })
        .collect()
}

/// Sorted proposal and vote snapshots for state comparisons.
pub fn snapshot(gov: &Governance) -> (Vec<Proposal>, Vec<(Hash, Vote)>) {
    let mut proposals = gov.copy_proposals();
    proposals.sort_by_key(|p| p.hash());
    let mut votes = gov.copy_votes();
    votes.sort_by_key(|(id, _)| *id);
    (proposals, votes)
}
