//! # Inbound Ports - TransactionPoolApi and ConsensusChangeListener
//!
//! Driving ports exposing the pool.
//!
//! | Method                | Caller                       |
//! |-----------------------|------------------------------|
//! | `accept_transaction`  | Wallet, network gateway      |
//! | `resync`              | Ledger (via listener)        |
//! | `read_updates`        | Subscribers                  |
//! | `subscribe`           | Subscribers                  |
//! | read helpers          | Anyone                       |

use crate::adapters::SubscriberHandle;
use crate::domain::{
    AssetOutput, AssetOutputId, Block, Contract, ContractId, PoolError, PoolStatus,
    ResyncOutcome, Transaction, TransactionId, UpdateEntry, ValueOutput, ValueOutputId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Receives confirmed-state changes from the ledger.
///
/// A change is delivered once; the listener must apply it before returning.
pub trait ConsensusChangeListener: Send + Sync {
    /// `reverted` is most recent first, `applied` is oldest first.
    fn on_consensus_change(&self, reverted: &[Block], applied: &[Block]);
}

/// Primary API of the transaction pool.
///
/// # Example
///
/// ```rust,ignore
/// use qc_06_transaction_pool::ports::TransactionPoolApi;
///
/// async fn follow(pool: &impl TransactionPoolApi) {
///     let mut handle = pool.subscribe();
///     let mut cursor = 0;
///     while handle.recv().await.is_some() {
///         for entry in pool.read_updates(cursor) {
///             cursor = entry.sequence + 1;
///         }
///     }
/// }
/// ```
pub trait TransactionPoolApi: Send + Sync {
    /// Validates and adds a transaction, then relays it.
    ///
    /// # Errors
    /// - `DuplicateTransaction`: already pending
    /// - `DoubleSpend`: an input is consumed by a pending transaction
    /// - `UnknownInput` / `UnknownContract`: the object does not exist
    /// - `LockTimeout`: the pool is busy (retryable)
    /// - any other variant: the transaction is invalid
    fn accept_transaction(&self, tx: Transaction) -> Result<TransactionId, PoolError>;

    /// Rebases the pool on a ledger change.
    fn resync(&self, reverted: &[Block], applied: &[Block]) -> Result<ResyncOutcome, PoolError>;

    /// Pending transactions in dependency order.
    fn transaction_set(&self) -> Result<Vec<Transaction>, PoolError>;

    fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, PoolError>;

    fn contains(&self, id: &TransactionId) -> Result<bool, PoolError>;

    /// Spendable value output in the unconfirmed view.
    fn value_output(&self, id: &ValueOutputId) -> Result<Option<ValueOutput>, PoolError>;

    /// Open contract in the unconfirmed view.
    fn contract(&self, id: &ContractId) -> Result<Option<Contract>, PoolError>;

    /// Spendable asset output in the unconfirmed view.
    fn asset_output(&self, id: &AssetOutputId) -> Result<Option<AssetOutput>, PoolError>;

    fn status(&self) -> Result<PoolStatus, PoolError>;

    /// Log entries from `cursor` on. Never takes the pool lock.
    fn read_updates(&self, cursor: u64) -> Vec<Arc<UpdateEntry>>;

    /// Registers for "new entries available" signals.
    fn subscribe(&self) -> SubscriberHandle;

    /// Returns false if the subscriber was not registered.
    fn unsubscribe(&self, id: &Uuid) -> bool;
}
