//! Gateway adapters for relaying accepted transactions.

use crate::domain::Transaction;
use crate::ports::Gateway;
use tracing::debug;

/// Gateway that drops every transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpGateway;

impl Gateway for NoOpGateway {
    fn broadcast_transaction(&self, _tx: &Transaction) {}
}

/// Gateway that only logs what it would relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingGateway;

impl Gateway for TracingGateway {
    fn broadcast_transaction(&self, tx: &Transaction) {
        debug!(
            tx_id = %tx.id(),
            inputs = tx.value_inputs.len() + tx.asset_inputs.len(),
            "Relaying transaction"
        );
    }
}

/// Gateway that records every relayed transaction.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingGateway {
    relayed: parking_lot::Mutex<Vec<Transaction>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relayed(&self) -> Vec<Transaction> {
        self.relayed.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Gateway for RecordingGateway {
    fn broadcast_transaction(&self, tx: &Transaction) {
        self.relayed.lock().push(tx.clone());
    }
}
