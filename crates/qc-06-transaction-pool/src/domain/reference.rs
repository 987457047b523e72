//! # Reference Set
//!
//! Holds objects that unconfirmed transactions have consumed. They are no
//! longer spendable, so they are absent from the unconfirmed maps, but
//! undoing the consuming transaction has to put them back, and the object
//! would otherwise be lost.
//!
//! This is the only copy of a consumed object while its consumer is pending;
//! undo rebuilds the maps from what [`ReferenceSet::release`] hands back.
//!
//! Every object is tagged with the transaction that consumed it. Releasing a
//! transaction returns exactly its own objects, so an object another pending
//! transaction still relies on is never reinstated by mistake.
//!
//! INVARIANT: the set is empty exactly when the unconfirmed sequence is empty.

use super::entities::{
    AssetOutput, AssetOutputId, Contract, ContractId, ObjectIds, TransactionId, ValueOutput,
    ValueOutputId,
};
use std::collections::HashMap;

/// A consumed object and the transaction that consumed it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Referenced<T> {
    consumer: TransactionId,
    object: T,
}

/// Objects handed back by [`ReferenceSet::release`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleasedObjects {
    pub value_outputs: HashMap<ValueOutputId, ValueOutput>,
    pub contracts: HashMap<ContractId, Contract>,
    pub asset_outputs: HashMap<AssetOutputId, AssetOutput>,
}

impl ReleasedObjects {
    pub fn len(&self) -> usize {
        self.value_outputs.len() + self.contracts.len() + self.asset_outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Objects consumed by pending transactions.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSet {
    value_outputs: HashMap<ValueOutputId, Referenced<ValueOutput>>,
    contracts: HashMap<ContractId, Referenced<Contract>>,
    asset_outputs: HashMap<AssetOutputId, Referenced<AssetOutput>>,
    by_consumer: HashMap<TransactionId, ObjectIds>,
}

impl ReferenceSet {
    /// Creates an empty reference set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of referenced objects.
    pub fn len(&self) -> usize {
        self.value_outputs.len() + self.contracts.len() + self.asset_outputs.len()
    }

    /// Returns true if nothing is referenced.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_value_output(&self, id: &ValueOutputId) -> bool {
        self.value_outputs.contains_key(id)
    }

    pub fn contains_contract(&self, id: &ContractId) -> bool {
        self.contracts.contains_key(id)
    }

    pub fn contains_asset_output(&self, id: &AssetOutputId) -> bool {
        self.asset_outputs.contains_key(id)
    }

    /// The consumed value output with this id, if any.
    pub fn value_output(&self, id: &ValueOutputId) -> Option<&ValueOutput> {
        self.value_outputs.get(id).map(|r| &r.object)
    }

    /// The consumed contract with this id, if any.
    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.contracts.get(id).map(|r| &r.object)
    }

    /// The consumed asset output with this id, if any.
    pub fn asset_output(&self, id: &AssetOutputId) -> Option<&AssetOutput> {
        self.asset_outputs.get(id).map(|r| &r.object)
    }

    /// The transaction that consumed the value output, if any.
    pub fn value_output_consumer(&self, id: &ValueOutputId) -> Option<TransactionId> {
        self.value_outputs.get(id).map(|r| r.consumer)
    }

    /// The transaction that consumed the contract, if any.
    pub fn contract_consumer(&self, id: &ContractId) -> Option<TransactionId> {
        self.contracts.get(id).map(|r| r.consumer)
    }

    /// The transaction that consumed the asset output, if any.
    pub fn asset_output_consumer(&self, id: &AssetOutputId) -> Option<TransactionId> {
        self.asset_outputs.get(id).map(|r| r.consumer)
    }

    pub(crate) fn hold_value_output(
        &mut self,
        consumer: TransactionId,
        id: ValueOutputId,
        object: ValueOutput,
    ) {
        self.value_outputs.insert(id, Referenced { consumer, object });
        self.by_consumer.entry(consumer).or_default().value_outputs.push(id);
    }

    pub(crate) fn hold_contract(&mut self, consumer: TransactionId, id: ContractId, object: Contract) {
        self.contracts.insert(id, Referenced { consumer, object });
        self.by_consumer.entry(consumer).or_default().contracts.push(id);
    }

    pub(crate) fn hold_asset_output(
        &mut self,
        consumer: TransactionId,
        id: AssetOutputId,
        object: AssetOutput,
    ) {
        self.asset_outputs.insert(id, Referenced { consumer, object });
        self.by_consumer.entry(consumer).or_default().asset_outputs.push(id);
    }

    /// Removes and returns every object consumed by `consumer`.
    pub(crate) fn release(&mut self, consumer: &TransactionId) -> ReleasedObjects {
        let mut released = ReleasedObjects::default();
        let Some(ids) = self.by_consumer.remove(consumer) else {
            return released;
        };

        for id in ids.value_outputs {
            if let Some(r) = self.value_outputs.remove(&id) {
                released.value_outputs.insert(id, r.object);
            }
        }
        for id in ids.contracts {
            if let Some(r) = self.contracts.remove(&id) {
                released.contracts.insert(id, r.object);
            }
        }
        for id in ids.asset_outputs {
            if let Some(r) = self.asset_outputs.remove(&id) {
                released.asset_outputs.insert(id, r.object);
            }
        }
        released
    }
}
