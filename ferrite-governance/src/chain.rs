//! Read-only views of the node's chain state consumed by the governance
//! subsystem. The node wires its chainstate, utxo set, and mempool into
//! these traits.

use crate::error::GovernanceError;
use ferrite_shared_types::{Block, OutPoint, TxOutput};

/// Access to the active chain and historical transaction outputs.
pub trait ChainView: Send + Sync {
    /// Height of the current chain tip.
    fn height(&self) -> u64;

    /// Reads the block at the given height from disk.
    fn read_block(&self, height: u64) -> Result<Block, GovernanceError>;

    /// Resolves an outpoint to the output it created, whether or not that
    /// output has since been spent. Votes reference utxos that may
    /// legitimately be consumed later in the chain.
    fn utxo_output(&self, outpoint: &OutPoint) -> Option<TxOutput>;
}

/// The unspent output set at the current tip.
pub trait CoinView: Send + Sync {
    /// Returns the output if it is currently unspent.
    fn get_coin(&self, outpoint: &OutPoint) -> Option<TxOutput>;
}

/// Pending-transaction visibility, for rejecting votes whose utxo is already
/// spent by an unconfirmed transaction.
pub trait MempoolView: Send + Sync {
    fn is_spent(&self, outpoint: &OutPoint) -> bool;
}

/// The live-tip views consulted when processing a freshly connected block.
/// Absent during the initial chain load, where spentness is reconciled from
/// the replayed prevout map instead.
#[derive(Clone, Copy)]
pub struct LiveView<'a> {
    pub coins: &'a dyn CoinView,
    pub mempool: &'a dyn MempoolView,
}

impl LiveView<'_> {
    /// True when the voting utxo is no longer spendable at the tip.
    pub fn vote_utxo_spent(&self, utxo: &OutPoint) -> bool {
        self.coins.get_coin(utxo).is_none() || self.mempool.is_spent(utxo)
    }
}
