//! On-chain governance for Ferrite Coin.
//!
//! Anyone may submit a proposal requesting a payment at a future superblock,
//! and holders of unspent outputs vote on it with their coin balance as
//! weight. Proposals and votes live inside OP_RETURN outputs of ordinary
//! transactions; this crate extracts and validates them, indexes them in
//! memory, tracks vote-utxo spentness across reorgs, rebuilds the whole
//! state from the chain at startup, and computes the deterministic payout
//! set a superblock's coinstake must pay.

pub mod chain;
pub mod codec;
pub mod error;
pub mod events;
mod governance;
mod loader;
pub mod proposal;
mod state;
pub mod tally;
pub mod validator;
pub mod vote;

pub use chain::{ChainView, CoinView, LiveView, MempoolView};
pub use error::GovernanceError;
pub use events::{ChainEvent, EventBus, GovernanceEventAdapter};
pub use governance::Governance;
pub use proposal::Proposal;
pub use tally::{superblock_payees, tally_votes, Tally};
pub use vote::{make_vin_hash, VinHash, Vote, VoteChoice, VIN_HASH_SIZE};
