//! Bridges the node's block notifications into the governance engine.

use std::sync::Arc;

use crate::chain::{ChainView, CoinView, LiveView, MempoolView};
use crate::governance::Governance;
use ferrite_shared_types::Block;

/// Chain events published by the node's validation layer.
#[derive(Clone)]
pub enum ChainEvent {
    /// A block was connected to the active chain at the given height.
    Connected { block: Arc<Block>, height: u64 },
    /// A block was disconnected from the active chain.
    Disconnected { block: Arc<Block> },
}

/// Synchronous fan-out event bus for chain events.
///
/// Listeners are invoked inline on the notifying thread; handlers must not
/// block longer than their own locked critical sections require.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&ChainEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ChainEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &ChainEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

/// Forwards connected blocks into [`Governance::process_block`] with the
/// live utxo and mempool views, and disconnected blocks into
/// [`Governance::undo_block`].
pub struct GovernanceEventAdapter {
    governance: Arc<Governance>,
    chain: Arc<dyn ChainView>,
    coins: Arc<dyn CoinView>,
    mempool: Arc<dyn MempoolView>,
}

impl GovernanceEventAdapter {
    pub fn new(
        governance: Arc<Governance>,
        chain: Arc<dyn ChainView>,
        coins: Arc<dyn CoinView>,
        mempool: Arc<dyn MempoolView>,
    ) -> Arc<Self> {
        Arc::new(GovernanceEventAdapter {
            governance,
            chain,
            coins,
            mempool,
        })
    }

    /// Subscribes this adapter to the bus.
    pub fn register(self: &Arc<Self>, bus: &mut EventBus) {
        let adapter = Arc::clone(self);
        bus.subscribe(Box::new(move |event| adapter.handle(event)));
    }

    pub fn handle(&self, event: &ChainEvent) {
        match event {
            ChainEvent::Connected { block, height } => {
                let live = LiveView {
                    coins: self.coins.as_ref(),
                    mempool: self.mempool.as_ref(),
                };
                self.governance
                    .process_block(block, *height, self.chain.as_ref(), Some(&live));
            }
            ChainEvent::Disconnected { block } => {
                self.governance
                    .undo_block(block, block.header.height, self.chain.as_ref());
            }
        }
    }
}
