//! Outbound (Driven) ports for the transaction pool.
//!
//! The ledger the pool follows and the network it relays through.

use super::inbound::ConsensusChangeListener;
use crate::domain::Transaction;
use std::sync::Arc;

/// Source of confirmed-state changes.
///
/// After `subscribe`, the ledger delivers every change (starting from
/// genesis) to the listener, in order, one call at a time.
pub trait ConsensusSet: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn ConsensusChangeListener>);
}

/// Network relay for accepted transactions.
///
/// Called after the pool lock is released. Implementations must not block
/// and must not call back into the pool.
pub trait Gateway: Send + Sync {
    fn broadcast_transaction(&self, tx: &Transaction);
}
