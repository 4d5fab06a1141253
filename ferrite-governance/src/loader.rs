//! Startup reconstruction of the governance state from the block history.
//!
//! The chain carries the only durable copy of governance data, so every
//! start replays all blocks since the activation height. The replay is
//! sharded across worker threads; because a shard may scan a vote before
//! another shard scans its proposal, votes are buffered as candidates and
//! a second pass applies the proposal, ordering, and cutoff rules once the
//! whole history has been seen. The vote replacement rule is a total order,
//! so the reconstructed state does not depend on shard timing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::{debug, info};

use crate::chain::ChainView;
use crate::error::GovernanceError;
use crate::governance::{ExtractMode, Governance};
use crate::validator::outside_voting_cutoff;
use crate::vote::Vote;
use ferrite_shared_types::{Hash, OutPoint};

impl Governance {
    /// Rebuilds the governance state by scanning every block from the
    /// activation height to the tip.
    ///
    /// Pass 1 shards the range across `nthreads` workers (0 = one per CPU
    /// core); each reads its blocks sequentially, records every spent
    /// prevout, inserts the proposals it finds, and buffers vote
    /// candidates. Pass 2 shards the candidates and, per vote, requires a
    /// proposal recorded in a strictly earlier block and outside the voting
    /// cutoff, applies any spend found in the replayed prevout map at or
    /// before the proposal's superblock, and inserts the vote.
    ///
    /// Workers poll `shutdown` between items; a set flag aborts the load
    /// with [`GovernanceError::Cancelled`] and the caller should discard the
    /// partially built state.
    pub fn load(
        &self,
        chain: &dyn ChainView,
        nthreads: usize,
        shutdown: &AtomicBool,
    ) -> Result<(), GovernanceError> {
        let tip = chain.height();
        let start_height = self.params().governance_block;
        if tip == 0 || tip < start_height {
            return Ok(());
        }

        let workers = if nthreads == 0 {
            num_cpus::get().max(1)
        } else {
            nthreads
        };
        let total = tip - start_height + 1;
        let slice = total / workers as u64;
        info!("loading governance data from {total} blocks across {workers} workers");

        // Every prevout spent anywhere on the chain, for vote spentness
        // reconciliation. Guarded by its own mutex; workers never hold it
        // together with the state mutex.
        let spent_prevouts: Mutex<HashMap<OutPoint, (Hash, u64)>> = Mutex::new(HashMap::new());
        // Vote candidates awaiting the reconciliation pass.
        let candidates: Mutex<Vec<Vote>> = Mutex::new(Vec::new());

        let replay_shard = |start: u64, end: u64| -> Result<(), GovernanceError> {
            for height in start..end {
                if shutdown.load(Ordering::Relaxed) {
                    return Err(GovernanceError::Cancelled);
                }
                let block = chain.read_block(height)?;
                {
                    let mut spent = spent_prevouts.lock().unwrap();
                    for tx in &block.transactions {
                        let txid = tx.txid();
                        for input in &tx.inputs {
                            if !input.previous_output.is_null() {
                                spent.insert(input.previous_output.clone(), (txid, height));
                            }
                        }
                    }
                }
                let (proposals, votes) =
                    self.data_from_block(&block, height, chain, ExtractMode::Load);
                if !proposals.is_empty() {
                    self.with_state(|state| {
                        for proposal in proposals {
                            state.add_proposal(proposal);
                        }
                    });
                }
                if !votes.is_empty() {
                    candidates.lock().unwrap().extend(votes);
                }
            }
            Ok(())
        };

        let mut outcome = Ok(());
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for k in 0..workers {
                let start = start_height + k as u64 * slice;
                let end = if k == workers - 1 {
                    tip + 1
                } else {
                    start + slice
                };
                let replay_shard = &replay_shard;
                handles.push(scope.spawn(move || replay_shard(start, end)));
            }
            for handle in handles {
                let result = handle.join().expect("governance load worker panicked");
                if outcome.is_ok() {
                    outcome = result;
                }
            }
        });
        outcome?;

        let candidates = candidates.into_inner().unwrap();
        if candidates.is_empty() {
            return Ok(());
        }
        debug!("reconciling {} vote candidates", candidates.len());

        let reconcile_shard = |votes: &[Vote]| -> Result<(), GovernanceError> {
            for vote in votes {
                if shutdown.load(Ordering::Relaxed) {
                    return Err(GovernanceError::Cancelled);
                }
                // The proposal must predate the vote and the vote must sit
                // outside its voting cutoff, exactly as at the live tip.
                let superblock = self.with_state(|state| {
                    state.get_proposal(vote.proposal()).and_then(|proposal| {
                        let accepted = proposal.block_number() < vote.block_number()
                            && outside_voting_cutoff(proposal, vote.block_number(), self.params());
                        accepted.then(|| proposal.superblock())
                    })
                });
                let Some(superblock) = superblock else {
                    continue;
                };
                let spent = {
                    let spent = spent_prevouts.lock().unwrap();
                    spent.get(vote.utxo()).copied()
                };
                let mut vote = vote.clone();
                if let Some((txhash, height)) = spent {
                    if height <= superblock {
                        vote.spend(height, txhash);
                    }
                }
                self.with_state(|state| state.add_vote(vote));
            }
            Ok(())
        };

        let chunk = (candidates.len() + workers - 1) / workers;
        let mut outcome = Ok(());
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for votes in candidates.chunks(chunk.max(1)) {
                let reconcile_shard = &reconcile_shard;
                handles.push(scope.spawn(move || reconcile_shard(votes)));
            }
            for handle in handles {
                let result = handle.join().expect("governance load worker panicked");
                if outcome.is_ok() {
                    outcome = result;
                }
            }
        });
        outcome
    }
}
