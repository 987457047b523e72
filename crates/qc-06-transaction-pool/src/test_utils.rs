//! Test fixtures: deterministic keys, signed spends and a mock ledger.
//!
//! Compiled for unit tests and, with the `test-utils` feature, for the
//! workspace integration tests.

use crate::ports::{ConsensusChangeListener, ConsensusSet};
use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use shared_types::{
    AssetOutput, AssetOutputDiff, AssetOutputId, Block, BlockHeight, BlockId, Contract,
    ContractDiff, ContractId, DiffDirection, Hash, OutputDiffs, PublicKey, Signature, Transaction,
    TransactionSignature, UnlockConditions, ValueInput, ValueOutput, ValueOutputDiff,
    ValueOutputId, U256,
};
use std::collections::HashMap;
use std::sync::Arc;

/// A deterministic Ed25519 key derived from a one-byte seed.
pub struct TestKey {
    signing: SigningKey,
}

impl TestKey {
    pub fn new(seed: u8) -> Self {
        Self {
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing.verifying_key().to_bytes()
    }

    /// Single-signature conditions for this key.
    pub fn unlock_conditions(&self) -> UnlockConditions {
        UnlockConditions::single_key(self.public_key())
    }

    pub fn unlock_hash(&self) -> Hash {
        self.unlock_conditions().unlock_hash()
    }

    pub fn sign(&self, message: &Hash) -> Signature {
        self.signing.sign(message).to_bytes()
    }
}

/// A value output of `value` locked to `unlock_hash`.
pub fn value_output(value: u64, unlock_hash: Hash) -> ValueOutput {
    ValueOutput {
        value: U256::from(value),
        unlock_hash,
    }
}

/// An asset output of `value` locked to `unlock_hash`.
pub fn asset_output(value: u64, unlock_hash: Hash) -> AssetOutput {
    AssetOutput {
        value: U256::from(value),
        unlock_hash,
    }
}

/// Adds a signature from `key` for every input whose conditions list it.
pub fn sign_inputs(tx: &mut Transaction, key: &TestKey) {
    let public = key.public_key();
    let parents: Vec<(Hash, usize)> = tx
        .value_inputs
        .iter()
        .map(|i| (i.parent_id.0, &i.unlock_conditions))
        .chain(tx.asset_inputs.iter().map(|i| (i.parent_id.0, &i.unlock_conditions)))
        .filter_map(|(parent, conditions)| {
            conditions
                .public_keys
                .iter()
                .position(|k| *k == public)
                .map(|index| (parent, index))
        })
        .collect();

    for (parent, index) in parents {
        let signature = key.sign(&tx.sig_hash(&parent));
        tx.signatures.push(TransactionSignature {
            parent_id: parent,
            public_key_index: index as u64,
            signature,
        });
    }
}

/// Spends `parents` (all locked to `key`) into one output per entry of
/// `outputs`, each locked to `to`, paying `fee` to miners.
pub fn signed_transfer(
    key: &TestKey,
    parents: &[ValueOutputId],
    outputs: &[u64],
    fee: u64,
    to: Hash,
) -> Transaction {
    let mut tx = Transaction {
        value_inputs: parents
            .iter()
            .map(|parent| ValueInput {
                parent_id: *parent,
                unlock_conditions: key.unlock_conditions(),
            })
            .collect(),
        value_outputs: outputs.iter().map(|v| value_output(*v, to)).collect(),
        ..Default::default()
    };
    if fee > 0 {
        tx.miner_fees.push(U256::from(fee));
    }
    sign_inputs(&mut tx, key);
    tx
}

#[derive(Default)]
struct LedgerState {
    chain: Vec<Block>,
    value_outputs: HashMap<ValueOutputId, ValueOutput>,
    contracts: HashMap<ContractId, Contract>,
    asset_outputs: HashMap<AssetOutputId, AssetOutput>,
}

impl LedgerState {
    fn apply(&mut self, diffs: &OutputDiffs) {
        for d in &diffs.value_outputs {
            match d.direction {
                DiffDirection::Apply => {
                    self.value_outputs.insert(d.id, d.output.clone());
                }
                DiffDirection::Revert => {
                    self.value_outputs.remove(&d.id);
                }
            }
        }
        for d in &diffs.contracts {
            match d.direction {
                DiffDirection::Apply => {
                    self.contracts.insert(d.id, d.contract.clone());
                }
                DiffDirection::Revert => {
                    self.contracts.remove(&d.id);
                }
            }
        }
        for d in &diffs.asset_outputs {
            match d.direction {
                DiffDirection::Apply => {
                    self.asset_outputs.insert(d.id, d.output.clone());
                }
                DiffDirection::Revert => {
                    self.asset_outputs.remove(&d.id);
                }
            }
        }
    }

    /// Diffs for confirming `tx` on top of the current state. Not validated.
    fn diffs_for(&mut self, tx: &Transaction) -> OutputDiffs {
        let mut diffs = OutputDiffs::new();
        for input in &tx.value_inputs {
            if let Some(output) = self.value_outputs.remove(&input.parent_id) {
                diffs.value_outputs.push(ValueOutputDiff {
                    direction: DiffDirection::Revert,
                    id: input.parent_id,
                    output,
                });
            }
        }
        for proof in &tx.storage_proofs {
            if let Some(contract) = self.contracts.remove(&proof.parent_id) {
                diffs.contracts.push(ContractDiff {
                    direction: DiffDirection::Revert,
                    id: proof.parent_id,
                    contract,
                });
            }
        }
        for input in &tx.asset_inputs {
            if let Some(output) = self.asset_outputs.remove(&input.parent_id) {
                diffs.asset_outputs.push(AssetOutputDiff {
                    direction: DiffDirection::Revert,
                    id: input.parent_id,
                    output,
                });
            }
        }
        for (id, output) in tx.created_value_outputs() {
            self.value_outputs.insert(id, output.clone());
            diffs.value_outputs.push(ValueOutputDiff {
                direction: DiffDirection::Apply,
                id,
                output,
            });
        }
        for (id, contract) in tx.created_contracts() {
            self.contracts.insert(id, contract.clone());
            diffs.contracts.push(ContractDiff {
                direction: DiffDirection::Apply,
                id,
                contract,
            });
        }
        for (id, output) in tx.created_asset_outputs() {
            self.asset_outputs.insert(id, output.clone());
            diffs.asset_outputs.push(AssetOutputDiff {
                direction: DiffDirection::Apply,
                id,
                output,
            });
        }
        diffs
    }
}

/// An in-memory ledger that mines blocks with correct diffs.
///
/// It trusts every transaction it is given; validation is the pool's job.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    listeners: Mutex<Vec<Arc<dyn ConsensusChangeListener>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mines the genesis block, creating the given outputs.
    ///
    /// The outputs belong to the block's only transaction, so their ids are
    /// `block.transactions[0].value_output_id(i)` and so on.
    pub fn genesis(&self, value_outputs: Vec<ValueOutput>, asset_outputs: Vec<AssetOutput>) -> Block {
        let tx = Transaction {
            value_outputs,
            asset_outputs,
            arbitrary_data: vec![b"genesis".to_vec()],
            ..Default::default()
        };
        self.mine(vec![tx])
    }

    /// Confirms `transactions` in a new block on top of the tip.
    pub fn mine(&self, transactions: Vec<Transaction>) -> Block {
        let mut state = self.state.lock();
        let mut diffs = OutputDiffs::new();
        for tx in &transactions {
            let tx_diffs = state.diffs_for(tx);
            diffs.extend(tx_diffs);
        }
        let (parent_id, height) = match state.chain.last() {
            Some(tip) => (tip.id, tip.height + 1),
            None => (BlockId::default(), 0),
        };
        let block = Block::new(parent_id, height, transactions, diffs);
        state.chain.push(block.clone());
        block
    }

    /// Removes the tip block and undoes its diffs.
    pub fn revert_tip(&self) -> Option<Block> {
        let mut state = self.state.lock();
        let block = state.chain.pop()?;
        let inverted = block.diffs.inverted();
        state.apply(&inverted);
        Some(block)
    }

    /// Height of the tip, or zero for an empty chain.
    pub fn height(&self) -> BlockHeight {
        self.state.lock().chain.last().map(|b| b.height).unwrap_or(0)
    }

    pub fn value_output(&self, id: &ValueOutputId) -> Option<ValueOutput> {
        self.state.lock().value_outputs.get(id).cloned()
    }

    pub fn confirmed_value_outputs(&self) -> HashMap<ValueOutputId, ValueOutput> {
        self.state.lock().value_outputs.clone()
    }

    /// Delivers a change to every subscribed listener.
    pub fn notify(&self, reverted: &[Block], applied: &[Block]) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_consensus_change(reverted, applied);
        }
    }

    /// Mines a block and tells the listeners about it.
    pub fn mine_and_notify(&self, transactions: Vec<Transaction>) -> Block {
        let block = self.mine(transactions);
        self.notify(&[], std::slice::from_ref(&block));
        block
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl ConsensusSet for MockLedger {
    /// Replays the current chain to the new listener, then keeps it.
    fn subscribe(&self, listener: Arc<dyn ConsensusChangeListener>) {
        let chain = self.state.lock().chain.clone();
        if !chain.is_empty() {
            listener.on_consensus_change(&[], &chain);
        }
        self.listeners.lock().push(listener);
    }
}
