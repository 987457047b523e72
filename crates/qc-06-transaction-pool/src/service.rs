//! Transaction Pool Service
//!
//! Owns the unconfirmed set behind one lock, the update log and the
//! subscriber hub, and wires them to the ledger and the gateway.
//!
//! ## Locking
//!
//! | Step                         | Pool lock |
//! |------------------------------|-----------|
//! | validate, mutate, append log | held      |
//! | notify subscribers           | released  |
//! | broadcast to gateway         | released  |
//! | `read_updates`               | never     |

use crate::adapters::{SubscriberHandle, SubscriberHub};
use crate::domain::resync;
use crate::domain::{
    AssetOutput, AssetOutputId, Block, Contract, ContractId, PoolConfig, PoolError, PoolStatus,
    ResyncOutcome, Transaction, TransactionId, UnconfirmedSet, UpdateEntry, UpdateLog,
    ValueOutput, ValueOutputId,
};
use crate::ports::{ConsensusChangeListener, ConsensusSet, Gateway, TransactionPoolApi};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// The transaction pool.
///
/// Build with [`TransactionPoolBuilder`]; the pool is shared as
/// `Arc<TransactionPool<G>>` between the ledger, the wallet and subscribers.
pub struct TransactionPool<G: Gateway> {
    config: PoolConfig,
    state: Mutex<UnconfirmedSet>,
    log: UpdateLog,
    subscribers: SubscriberHub,
    gateway: Arc<G>,
}

impl<G: Gateway> TransactionPool<G> {
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, UnconfirmedSet>, PoolError> {
        self.state
            .try_lock_for(Duration::from_millis(self.config.lock_timeout_ms))
            .ok_or(PoolError::LockTimeout {
                timeout_ms: self.config.lock_timeout_ms,
            })
    }

    /// Checks the unconfirmed set's invariants. Used by tests.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.lock().map_err(|e| e.to_string())?.check_invariants()
    }
}

impl<G: Gateway> TransactionPoolApi for TransactionPool<G> {
    fn accept_transaction(&self, tx: Transaction) -> Result<TransactionId, PoolError> {
        let id = tx.id();
        let log_len = {
            let mut set = self.lock()?;
            let diffs = set.accept(tx.clone()).map_err(|error| {
                debug!(tx_id = %id, %error, "Transaction rejected");
                error
            })?;
            let sequence = self.log.append(Vec::new(), Vec::new(), set.transactions(), diffs);
            sequence + 1
        };

        self.subscribers.notify(log_len);
        self.gateway.broadcast_transaction(&tx);
        debug!(tx_id = %id, log_len, "Transaction accepted");
        Ok(id)
    }

    fn resync(&self, reverted: &[Block], applied: &[Block]) -> Result<ResyncOutcome, PoolError> {
        let (outcome, log_len) = {
            let mut set = self.lock()?;
            let report = resync::run(&mut set, reverted, applied);
            let sequence = self.log.append(
                reverted.to_vec(),
                applied.to_vec(),
                set.transactions(),
                report.diffs,
            );
            let mut outcome = report.outcome;
            outcome.log_sequence = sequence;
            (outcome, sequence + 1)
        };

        self.subscribers.notify(log_len);
        Ok(outcome)
    }

    fn transaction_set(&self) -> Result<Vec<Transaction>, PoolError> {
        Ok(self.lock()?.transactions())
    }

    fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, PoolError> {
        Ok(self.lock()?.get(id).map(|e| e.transaction.clone()))
    }

    fn contains(&self, id: &TransactionId) -> Result<bool, PoolError> {
        Ok(self.lock()?.contains(id))
    }

    fn value_output(&self, id: &ValueOutputId) -> Result<Option<ValueOutput>, PoolError> {
        Ok(self.lock()?.value_output(id).cloned())
    }

    fn contract(&self, id: &ContractId) -> Result<Option<Contract>, PoolError> {
        Ok(self.lock()?.contract(id).cloned())
    }

    fn asset_output(&self, id: &AssetOutputId) -> Result<Option<AssetOutput>, PoolError> {
        Ok(self.lock()?.asset_output(id).cloned())
    }

    fn status(&self) -> Result<PoolStatus, PoolError> {
        let set = self.lock()?;
        Ok(PoolStatus {
            transactions: set.len(),
            value_outputs: set.value_outputs().len(),
            contracts: set.contracts().len(),
            asset_outputs: set.asset_outputs().len(),
            reference_objects: set.reference_set().len(),
            height: set.height(),
            log_entries: self.log.len(),
            subscribers: self.subscribers.subscriber_count(),
        })
    }

    fn read_updates(&self, cursor: u64) -> Vec<Arc<UpdateEntry>> {
        self.log.read_from(cursor)
    }

    fn subscribe(&self) -> SubscriberHandle {
        self.subscribers.register()
    }

    fn unsubscribe(&self, id: &Uuid) -> bool {
        self.subscribers.unregister(id)
    }
}

impl<G: Gateway> ConsensusChangeListener for TransactionPool<G> {
    /// Applies the change, waiting as long as it takes to get the lock.
    ///
    /// The ledger has no way to resend a change, so a lock timeout here is
    /// retried rather than returned.
    fn on_consensus_change(&self, reverted: &[Block], applied: &[Block]) {
        let mut attempts: u32 = 0;
        loop {
            match self.resync(reverted, applied) {
                Ok(_) => return,
                Err(error) if error.is_retryable() => {
                    attempts += 1;
                    warn!(
                        %error,
                        attempts,
                        reverted = reverted.len(),
                        applied = applied.len(),
                        "Transaction pool busy, retrying consensus change"
                    );
                }
                Err(error) => {
                    error!(
                        %error,
                        reverted = reverted.len(),
                        applied = applied.len(),
                        "Consensus change not applied to transaction pool"
                    );
                    return;
                }
            }
        }
    }
}

/// Builder for [`TransactionPool`].
///
/// The consensus set and the gateway are required.
pub struct TransactionPoolBuilder<C: ConsensusSet, G: Gateway> {
    config: PoolConfig,
    consensus: Option<Arc<C>>,
    gateway: Option<Arc<G>>,
}

impl<C: ConsensusSet, G: Gateway + 'static> TransactionPoolBuilder<C, G> {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            consensus: None,
            gateway: None,
        }
    }

    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_consensus(mut self, consensus: Arc<C>) -> Self {
        self.consensus = Some(consensus);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<G>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Creates the pool and subscribes it to the consensus set.
    pub fn build(self) -> Result<Arc<TransactionPool<G>>, PoolError> {
        self.config.validate()?;
        let consensus = self
            .consensus
            .ok_or_else(|| PoolError::Config("consensus set is required".into()))?;
        let gateway = self
            .gateway
            .ok_or_else(|| PoolError::Config("gateway is required".into()))?;

        let pool = Arc::new(TransactionPool {
            subscribers: SubscriberHub::new(self.config.subscriber_channel_capacity),
            config: self.config,
            state: Mutex::new(UnconfirmedSet::new()),
            log: UpdateLog::new(),
            gateway,
        });
        consensus.subscribe(pool.clone());
        debug!(
            lock_timeout_ms = pool.config.lock_timeout_ms,
            "Transaction pool subscribed to consensus set"
        );
        Ok(pool)
    }
}

impl<C: ConsensusSet, G: Gateway + 'static> Default for TransactionPoolBuilder<C, G> {
    fn default() -> Self {
        Self::new()
    }
}
