//! # Unconfirmed Set
//!
//! The pool's view of the ledger as if every pending transaction were
//! already confirmed.
//!
//! ## Data Structures
//!
//! | Field          | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `slots`        | Arena of entries, addressed by stable slot index   |
//! | `order`        | Slot indices in dependency order (head = oldest)   |
//! | `by_id`        | Transaction id to slot                             |
//! | output maps    | Spendable value outputs, open contracts, assets    |
//! | `reference`    | Objects consumed by pending transactions           |
//!
//! ## Invariants
//!
//! - Dependency order: a transaction spending an object created by another
//!   pending transaction comes strictly after it.
//! - Set consistency: an id is in an output map iff it is confirmed and
//!   unconsumed, or created by a pending transaction, and no pending
//!   transaction consumes it.
//! - The reference set is empty exactly when no transaction is pending.
//!
//! Accepting only ever appends at the tail and undoing only ever removes the
//! tail, which keeps the dependency order without a graph.

use super::entities::{
    AssetOutput, AssetOutputId, BlockHeight, Contract, ContractId, Currency, ObjectIds,
    PoolEntry, Transaction, TransactionId, ValueOutput, ValueOutputId,
};
use super::errors::PoolError;
use super::reference::ReferenceSet;
use super::services;
use super::value_objects::Reinsertion;
use shared_types::{AssetOutputDiff, ContractDiff, DiffDirection, OutputDiffs, ValueOutputDiff};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash as StdHash;
use tracing::{debug, warn};

/// Objects a validated transaction consumes and creates.
struct AcceptPlan {
    consumed_value_outputs: Vec<(ValueOutputId, ValueOutput)>,
    consumed_contracts: Vec<(ContractId, Contract)>,
    consumed_asset_outputs: Vec<(AssetOutputId, AssetOutput)>,
    created_value_outputs: Vec<(ValueOutputId, ValueOutput)>,
    created_contracts: Vec<(ContractId, Contract)>,
    created_asset_outputs: Vec<(AssetOutputId, AssetOutput)>,
}

/// Any object id, tagged with its map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ObjectRef {
    Value(ValueOutputId),
    Contract(ContractId),
    Asset(AssetOutputId),
}

/// Objects an entry consumed (`Revert`) and created (`Apply`).
fn touched(entry: &PoolEntry) -> impl Iterator<Item = (DiffDirection, ObjectRef)> + '_ {
    let tx = &entry.transaction;
    let consumed = tx
        .value_inputs
        .iter()
        .map(|i| ObjectRef::Value(i.parent_id))
        .chain(tx.storage_proofs.iter().map(|p| ObjectRef::Contract(p.parent_id)))
        .chain(tx.asset_inputs.iter().map(|i| ObjectRef::Asset(i.parent_id)))
        .map(|object| (DiffDirection::Revert, object));
    let created = &entry.created;
    let produced = created
        .value_outputs
        .iter()
        .map(|id| ObjectRef::Value(*id))
        .chain(created.contracts.iter().map(|id| ObjectRef::Contract(*id)))
        .chain(created.asset_outputs.iter().map(|id| ObjectRef::Asset(*id)))
        .map(|object| (DiffDirection::Apply, object));
    consumed.chain(produced)
}

/// Applies one diff to a map. Returns false if the map disagreed with it.
fn apply_one<K, V>(map: &mut HashMap<K, V>, direction: DiffDirection, id: K, object: &V) -> bool
where
    K: Eq + StdHash,
    V: Clone,
{
    match direction {
        DiffDirection::Apply => map.insert(id, object.clone()).is_none(),
        DiffDirection::Revert => map.remove(&id).is_some(),
    }
}

/// Pending transactions and the output maps they produce.
#[derive(Debug, Default)]
pub struct UnconfirmedSet {
    slots: Vec<Option<PoolEntry>>,
    free_slots: Vec<usize>,
    order: VecDeque<usize>,
    by_id: HashMap<TransactionId, usize>,

    value_outputs: HashMap<ValueOutputId, ValueOutput>,
    contracts: HashMap<ContractId, Contract>,
    asset_outputs: HashMap<AssetOutputId, AssetOutput>,

    reference: ReferenceSet,
    height: BlockHeight,
}

impl UnconfirmedSet {
    /// Creates an empty set at height zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no transaction is pending.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Height of the confirmed state the set is built on.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.by_id.contains_key(id)
    }

    /// The pending entry with this id, if any.
    pub fn get(&self, id: &TransactionId) -> Option<&PoolEntry> {
        let slot = *self.by_id.get(id)?;
        self.slots.get(slot)?.as_ref()
    }

    /// Pending entries in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> + '_ {
        self.order
            .iter()
            .filter_map(move |&slot| self.slots.get(slot).and_then(Option::as_ref))
    }

    /// Pending transactions in dependency order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.iter().map(|e| e.transaction.clone()).collect()
    }

    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.iter().map(|e| e.id).collect()
    }

    pub fn value_output(&self, id: &ValueOutputId) -> Option<&ValueOutput> {
        self.value_outputs.get(id)
    }

    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.contracts.get(id)
    }

    pub fn asset_output(&self, id: &AssetOutputId) -> Option<&AssetOutput> {
        self.asset_outputs.get(id)
    }

    pub fn value_outputs(&self) -> &HashMap<ValueOutputId, ValueOutput> {
        &self.value_outputs
    }

    pub fn contracts(&self) -> &HashMap<ContractId, Contract> {
        &self.contracts
    }

    pub fn asset_outputs(&self) -> &HashMap<AssetOutputId, AssetOutput> {
        &self.asset_outputs
    }

    pub fn reference_set(&self) -> &ReferenceSet {
        &self.reference
    }

    // =========================================================================
    // ACCEPT
    // =========================================================================

    /// Validates `tx` against the unconfirmed view and appends it.
    ///
    /// Returns every map change made, in order. On error nothing changes.
    pub fn accept(&mut self, tx: Transaction) -> Result<OutputDiffs, PoolError> {
        let id = tx.id();
        let plan = self.validate(&id, &tx)?;
        Ok(self.commit(id, tx, plan))
    }

    fn validate(&self, id: &TransactionId, tx: &Transaction) -> Result<AcceptPlan, PoolError> {
        if self.contains(id) {
            return Err(PoolError::DuplicateTransaction(*id));
        }
        services::check_structure(tx, self.height)?;
        if tx.value_inputs.is_empty() && tx.asset_inputs.is_empty() && tx.storage_proofs.is_empty() {
            return Err(PoolError::MalformedTransaction(
                "transaction consumes no objects".into(),
            ));
        }

        let mut value_in: Vec<Currency> = Vec::with_capacity(tx.value_inputs.len());
        let mut consumed_value_outputs = Vec::with_capacity(tx.value_inputs.len());
        for input in &tx.value_inputs {
            let output = self.spendable_value_output(&input.parent_id)?;
            services::check_spend(
                tx,
                &input.parent_id.0,
                &input.unlock_conditions,
                &output.unlock_hash,
                self.height,
            )?;
            value_in.push(output.value);
            consumed_value_outputs.push((input.parent_id, output.clone()));
        }

        let mut consumed_contracts = Vec::with_capacity(tx.storage_proofs.len());
        for proof in &tx.storage_proofs {
            let contract = self.open_contract(&proof.parent_id)?;
            services::check_storage_proof(proof, contract, self.height)?;
            consumed_contracts.push((proof.parent_id, contract.clone()));
        }

        let mut asset_in: Vec<Currency> = Vec::with_capacity(tx.asset_inputs.len());
        let mut consumed_asset_outputs = Vec::with_capacity(tx.asset_inputs.len());
        for input in &tx.asset_inputs {
            let output = self.spendable_asset_output(&input.parent_id)?;
            services::check_spend(
                tx,
                &input.parent_id.0,
                &input.unlock_conditions,
                &output.unlock_hash,
                self.height,
            )?;
            asset_in.push(output.value);
            consumed_asset_outputs.push((input.parent_id, output.clone()));
        }

        services::check_balance(&value_in, &asset_in, tx)?;

        let created_value_outputs = tx.created_value_outputs();
        for (oid, _) in &created_value_outputs {
            if self.value_outputs.contains_key(oid) || self.reference.contains_value_output(oid) {
                return Err(PoolError::ObjectAlreadyExists(oid.0));
            }
        }
        let created_contracts = tx.created_contracts();
        for (cid, _) in &created_contracts {
            if self.contracts.contains_key(cid) || self.reference.contains_contract(cid) {
                return Err(PoolError::ObjectAlreadyExists(cid.0));
            }
        }
        let created_asset_outputs = tx.created_asset_outputs();
        for (aid, _) in &created_asset_outputs {
            if self.asset_outputs.contains_key(aid) || self.reference.contains_asset_output(aid) {
                return Err(PoolError::ObjectAlreadyExists(aid.0));
            }
        }

        Ok(AcceptPlan {
            consumed_value_outputs,
            consumed_contracts,
            consumed_asset_outputs,
            created_value_outputs,
            created_contracts,
            created_asset_outputs,
        })
    }

    fn spendable_value_output(&self, id: &ValueOutputId) -> Result<&ValueOutput, PoolError> {
        if let Some(output) = self.value_outputs.get(id) {
            return Ok(output);
        }
        if self.reference.contains_value_output(id) {
            Err(PoolError::double_spent_value(id))
        } else {
            Err(PoolError::UnknownInput(id.0))
        }
    }

    fn open_contract(&self, id: &ContractId) -> Result<&Contract, PoolError> {
        if let Some(contract) = self.contracts.get(id) {
            return Ok(contract);
        }
        if self.reference.contains_contract(id) {
            Err(PoolError::DoubleSpend(id.0))
        } else {
            Err(PoolError::UnknownContract(*id))
        }
    }

    fn spendable_asset_output(&self, id: &AssetOutputId) -> Result<&AssetOutput, PoolError> {
        if let Some(output) = self.asset_outputs.get(id) {
            return Ok(output);
        }
        if self.reference.contains_asset_output(id) {
            Err(PoolError::double_spent_asset(id))
        } else {
            Err(PoolError::UnknownInput(id.0))
        }
    }

    fn commit(&mut self, id: TransactionId, tx: Transaction, plan: AcceptPlan) -> OutputDiffs {
        let mut diffs = OutputDiffs::new();

        for (oid, output) in plan.consumed_value_outputs {
            self.value_outputs.remove(&oid);
            self.reference.hold_value_output(id, oid, output.clone());
            diffs.value_outputs.push(ValueOutputDiff {
                direction: DiffDirection::Revert,
                id: oid,
                output,
            });
        }
        for (cid, contract) in plan.consumed_contracts {
            self.contracts.remove(&cid);
            self.reference.hold_contract(id, cid, contract.clone());
            diffs.contracts.push(ContractDiff {
                direction: DiffDirection::Revert,
                id: cid,
                contract,
            });
        }
        for (aid, output) in plan.consumed_asset_outputs {
            self.asset_outputs.remove(&aid);
            self.reference.hold_asset_output(id, aid, output.clone());
            diffs.asset_outputs.push(AssetOutputDiff {
                direction: DiffDirection::Revert,
                id: aid,
                output,
            });
        }

        let mut created = ObjectIds::default();
        for (oid, output) in plan.created_value_outputs {
            created.value_outputs.push(oid);
            self.value_outputs.insert(oid, output.clone());
            diffs.value_outputs.push(ValueOutputDiff {
                direction: DiffDirection::Apply,
                id: oid,
                output,
            });
        }
        for (cid, contract) in plan.created_contracts {
            created.contracts.push(cid);
            self.contracts.insert(cid, contract.clone());
            diffs.contracts.push(ContractDiff {
                direction: DiffDirection::Apply,
                id: cid,
                contract,
            });
        }
        for (aid, output) in plan.created_asset_outputs {
            created.asset_outputs.push(aid);
            self.asset_outputs.insert(aid, output.clone());
            diffs.asset_outputs.push(AssetOutputDiff {
                direction: DiffDirection::Apply,
                id: aid,
                output,
            });
        }

        let entry = PoolEntry::new(id, tx, created);
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.order.push_back(slot);
        self.by_id.insert(id, slot);

        debug!(tx_id = %id, changes = diffs.len(), "Transaction added to unconfirmed set");
        diffs
    }

    // =========================================================================
    // UNDO AND REINSERT
    // =========================================================================

    /// Removes the tail transaction and restores what it consumed.
    ///
    /// Created objects leave the maps (newest first) and the consumed ones
    /// come back from the reference set in input order. Returns the
    /// transaction and the map changes made.
    pub(crate) fn undo(
        &mut self,
        id: &TransactionId,
    ) -> Result<(Transaction, OutputDiffs), PoolError> {
        let tail = match (self.order.back(), self.by_id.get(id)) {
            (Some(&tail), Some(&slot)) if tail == slot => tail,
            _ => return Err(PoolError::UndoOutOfOrder(*id)),
        };
        let Some(entry) = self.slots.get_mut(tail).and_then(Option::take) else {
            return Err(PoolError::UndoOutOfOrder(*id));
        };
        self.order.pop_back();
        self.by_id.remove(id);
        self.free_slots.push(tail);

        let mut diffs = OutputDiffs::new();
        for oid in entry.created.value_outputs.iter().rev() {
            if let Some(output) = self.value_outputs.remove(oid) {
                diffs.value_outputs.push(ValueOutputDiff {
                    direction: DiffDirection::Revert,
                    id: *oid,
                    output,
                });
            }
        }
        for cid in entry.created.contracts.iter().rev() {
            if let Some(contract) = self.contracts.remove(cid) {
                diffs.contracts.push(ContractDiff {
                    direction: DiffDirection::Revert,
                    id: *cid,
                    contract,
                });
            }
        }
        for aid in entry.created.asset_outputs.iter().rev() {
            if let Some(output) = self.asset_outputs.remove(aid) {
                diffs.asset_outputs.push(AssetOutputDiff {
                    direction: DiffDirection::Revert,
                    id: *aid,
                    output,
                });
            }
        }

        let mut released = self.reference.release(id);
        let tx = &entry.transaction;
        for input in &tx.value_inputs {
            if let Some(output) = released.value_outputs.remove(&input.parent_id) {
                self.value_outputs.insert(input.parent_id, output.clone());
                diffs.value_outputs.push(ValueOutputDiff {
                    direction: DiffDirection::Apply,
                    id: input.parent_id,
                    output,
                });
            }
        }
        for proof in &tx.storage_proofs {
            if let Some(contract) = released.contracts.remove(&proof.parent_id) {
                self.contracts.insert(proof.parent_id, contract.clone());
                diffs.contracts.push(ContractDiff {
                    direction: DiffDirection::Apply,
                    id: proof.parent_id,
                    contract,
                });
            }
        }
        for input in &tx.asset_inputs {
            if let Some(output) = released.asset_outputs.remove(&input.parent_id) {
                self.asset_outputs.insert(input.parent_id, output.clone());
                diffs.asset_outputs.push(AssetOutputDiff {
                    direction: DiffDirection::Apply,
                    id: input.parent_id,
                    output,
                });
            }
        }
        debug_assert!(released.is_empty());

        debug!(tx_id = %id, "Transaction removed from unconfirmed set");
        Ok((entry.transaction, diffs))
    }

    /// Undoes every pending transaction, tail first.
    ///
    /// Returns the removed transactions in their original order.
    pub(crate) fn undo_all(&mut self) -> (Vec<Transaction>, OutputDiffs) {
        let mut removed = Vec::with_capacity(self.len());
        let mut diffs = OutputDiffs::new();
        while let Some(id) = self.tail_id() {
            match self.undo(&id) {
                Ok((tx, undone)) => {
                    removed.push(tx);
                    diffs.extend(undone);
                }
                Err(_) => break,
            }
        }
        removed.reverse();
        (removed, diffs)
    }

    fn tail_id(&self) -> Option<TransactionId> {
        let slot = *self.order.back()?;
        self.slots.get(slot)?.as_ref().map(|e| e.id)
    }

    /// Accepts each transaction in turn, dropping the ones that fail.
    fn readd(&mut self, transactions: Vec<Transaction>) -> Reinsertion {
        let mut result = Reinsertion::default();
        for tx in transactions {
            let id = tx.id();
            if self.contains(&id) {
                continue;
            }
            match self.validate(&id, &tx) {
                Ok(plan) => {
                    result.diffs.extend(self.commit(id, tx, plan));
                    result.readded += 1;
                }
                Err(error) => {
                    debug!(tx_id = %id, %error, "Dropping transaction that no longer validates");
                    result.dropped.push(id);
                }
            }
        }
        result
    }

    /// Puts transactions from reverted blocks at the head of the sequence.
    ///
    /// `pending` holds transactions the caller already took out of the set.
    /// Whatever is still in the sequence is undone as well. `reverted` is
    /// accepted first, then `pending`, then the undone sequence, each in its
    /// original order; anything that no longer validates is dropped.
    pub(crate) fn reinsert_after_revert(
        &mut self,
        reverted: Vec<Transaction>,
        pending: Vec<Transaction>,
    ) -> Reinsertion {
        let (still_pending, undone) = self.undo_all();
        let mut transactions = reverted;
        transactions.extend(pending);
        transactions.extend(still_pending);

        let readded = self.readd(transactions);
        let mut diffs = undone;
        diffs.extend(readded.diffs);
        Reinsertion {
            diffs,
            readded: readded.readded,
            dropped: readded.dropped,
        }
    }

    // =========================================================================
    // LEDGER STATE
    // =========================================================================

    /// Applies confirmed diffs to the output maps.
    ///
    /// The ledger is authoritative: diffs that disagree with the maps are
    /// applied anyway and counted. Only valid while nothing is pending.
    pub(crate) fn apply_diffs(&mut self, diffs: &OutputDiffs) -> usize {
        debug_assert!(self.is_empty());
        let mut mismatched = 0;
        for d in &diffs.value_outputs {
            if !apply_one(&mut self.value_outputs, d.direction, d.id, &d.output) {
                mismatched += 1;
                warn!(id = %d.id, direction = ?d.direction, "Value output diff does not match pool view");
            }
        }
        for d in &diffs.contracts {
            if !apply_one(&mut self.contracts, d.direction, d.id, &d.contract) {
                mismatched += 1;
                warn!(id = %d.id, direction = ?d.direction, "Contract diff does not match pool view");
            }
        }
        for d in &diffs.asset_outputs {
            if !apply_one(&mut self.asset_outputs, d.direction, d.id, &d.output) {
                mismatched += 1;
                warn!(id = %d.id, direction = ?d.direction, "Asset output diff does not match pool view");
            }
        }
        mismatched
    }

    pub(crate) fn set_height(&mut self, height: BlockHeight) {
        self.height = height;
    }

    // =========================================================================
    // INVARIANTS
    // =========================================================================

    fn is_spendable(&self, object: ObjectRef) -> bool {
        match object {
            ObjectRef::Value(id) => self.value_outputs.contains_key(&id),
            ObjectRef::Contract(id) => self.contracts.contains_key(&id),
            ObjectRef::Asset(id) => self.asset_outputs.contains_key(&id),
        }
    }

    fn consumer_of(&self, object: ObjectRef) -> Option<TransactionId> {
        match object {
            ObjectRef::Value(id) => self.reference.value_output_consumer(&id),
            ObjectRef::Contract(id) => self.reference.contract_consumer(&id),
            ObjectRef::Asset(id) => self.reference.asset_output_consumer(&id),
        }
    }

    /// Checks the ordering, consistency and reference-set invariants plus
    /// the agreement of the three indices.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.order.len() != self.by_id.len() {
            return Err(format!(
                "order has {} slots but id index has {}",
                self.order.len(),
                self.by_id.len()
            ));
        }
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.order.len() {
            return Err(format!(
                "{} occupied slots for {} ordered transactions",
                occupied,
                self.order.len()
            ));
        }

        let mut position = HashMap::new();
        let mut creator = HashMap::new();
        for (pos, &slot) in self.order.iter().enumerate() {
            let entry = self
                .slots
                .get(slot)
                .and_then(Option::as_ref)
                .ok_or_else(|| format!("ordered slot {slot} is empty"))?;
            if self.by_id.get(&entry.id) != Some(&slot) {
                return Err(format!("id index disagrees for {}", entry.id));
            }
            position.insert(entry.id, pos);
            for (direction, object) in touched(entry) {
                if direction == DiffDirection::Apply {
                    creator.insert(object, pos);
                }
            }
        }

        if self.reference.is_empty() != self.order.is_empty() {
            return Err(format!(
                "reference set holds {} objects with {} pending transactions",
                self.reference.len(),
                self.order.len()
            ));
        }

        let mut consumed_total = 0;
        for (pos, entry) in self.iter().enumerate() {
            for (direction, object) in touched(entry) {
                match direction {
                    DiffDirection::Revert => {
                        consumed_total += 1;
                        if self.consumer_of(object) != Some(entry.id) {
                            return Err(format!("{object:?} is not held for {}", entry.id));
                        }
                        if self.is_spendable(object) {
                            return Err(format!("{object:?} is consumed but still spendable"));
                        }
                        if let Some(&created_at) = creator.get(&object) {
                            if created_at >= pos {
                                return Err(format!(
                                    "{} spends {object:?} before it is created",
                                    entry.id
                                ));
                            }
                        }
                    }
                    DiffDirection::Apply => match self.consumer_of(object) {
                        Some(consumer) if !position.contains_key(&consumer) => {
                            return Err(format!("{object:?} held for absent {consumer}"));
                        }
                        Some(_) => {}
                        None if !self.is_spendable(object) => {
                            return Err(format!("created {object:?} missing from maps"));
                        }
                        None => {}
                    },
                }
            }
        }

        if consumed_total != self.reference.len() {
            return Err(format!(
                "reference set holds {} objects but {} are consumed",
                self.reference.len(),
                consumed_total
            ));
        }
        Ok(())
    }
}
