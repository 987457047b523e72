//! Core domain entities for the transaction pool.
//!
//! Defines the arena entry that holds a pending transaction and the pool
//! configuration.

use serde::{Deserialize, Serialize};

// Re-export from shared-types for convenience
pub use shared_types::{
    AssetOutput, AssetOutputId, Block, BlockHeight, Contract, ContractId, Currency, Hash,
    OutputDiffs, Transaction, TransactionId, ValueOutput, ValueOutputId, U256,
};

use super::errors::PoolError;

/// Ids of the objects a transaction touched, per map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectIds {
    pub value_outputs: Vec<ValueOutputId>,
    pub contracts: Vec<ContractId>,
    pub asset_outputs: Vec<AssetOutputId>,
}

/// A pending transaction stored in the unconfirmed set's arena.
///
/// Consumed objects are not copied here: they sit in the reference set
/// under this entry's id until the transaction is undone.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    /// Content hash of the transaction.
    pub id: TransactionId,
    /// The transaction itself (never edited while pooled).
    pub transaction: Transaction,
    /// Objects the transaction added to the output maps.
    pub created: ObjectIds,
}

impl PoolEntry {
    pub fn new(id: TransactionId, transaction: Transaction, created: ObjectIds) -> Self {
        Self {
            id,
            transaction,
            created,
        }
    }
}

/// Transaction pool configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on waiting for the pool lock (milliseconds).
    ///
    /// Exceeding it yields `PoolError::LockTimeout` instead of blocking.
    pub lock_timeout_ms: u64,
    /// Capacity of each subscriber's notification queue.
    ///
    /// Signals to a full queue are dropped; subscribers catch up through
    /// the update log.
    pub subscriber_channel_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1_000,
            subscriber_channel_capacity: 16,
        }
    }
}

impl PoolConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            lock_timeout_ms: 100,
            subscriber_channel_capacity: 1,
        }
    }

    /// Rejects values the pool cannot operate with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.lock_timeout_ms == 0 {
            return Err(PoolError::Config("lock_timeout_ms must be non-zero".into()));
        }
        if self.subscriber_channel_capacity == 0 {
            return Err(PoolError::Config(
                "subscriber_channel_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
