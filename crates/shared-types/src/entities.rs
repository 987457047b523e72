//! # Core Ledger Entities
//!
//! Defines the UTXO ledger objects shared by the ledger collaborator, the
//! transaction pool and every client that builds transactions.
//!
//! ## Clusters
//!
//! - **Identifiers**: `TransactionId`, `ValueOutputId`, `ContractId`,
//!   `AssetOutputId`, `BlockId`
//! - **Spendable objects**: `ValueOutput`, `Contract`, `AssetOutput`
//! - **Transaction parts**: inputs, `UnlockConditions`, `StorageProof`,
//!   `TransactionSignature`
//! - **Chain**: `Transaction`, `Block`
//!
//! Object ids are derived from the id of the creating transaction, a domain
//! specifier and the index of the object inside that transaction, so two
//! different transactions can never create the same id.

use crate::diffs::OutputDiffs;
use crate::errors::LedgerError;
use ed25519_dalek::{Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use std::fmt;

// Re-export U256 from primitive-types for currency amounts
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: PRIMITIVES & IDENTIFIERS
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// Height of a block in the confirmed chain.
pub type BlockHeight = u64;

/// Currency amounts. All sums over currency must use checked arithmetic.
pub type Currency = U256;

/// Size in bytes of the file segment carried by a storage proof.
pub const SEGMENT_SIZE: usize = 64;

/// Maximum number of siblings in a storage proof's Merkle path.
pub const MAX_PROOF_DEPTH: usize = 64;

const SPECIFIER_VALUE_OUTPUT: &[u8] = b"value output";
const SPECIFIER_CONTRACT: &[u8] = b"file contract";
const SPECIFIER_ASSET_OUTPUT: &[u8] = b"asset output";

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub Hash);

        impl $name {
            /// Returns the raw digest.
            pub fn as_bytes(&self) -> &Hash {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(&self.0[..8]))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl From<Hash> for $name {
            fn from(hash: Hash) -> Self {
                Self(hash)
            }
        }
    };
}

define_id!(
    /// Content hash of a transaction.
    TransactionId
);
define_id!(
    /// Id of a value-transfer output.
    ValueOutputId
);
define_id!(
    /// Id of a contract object.
    ContractId
);
define_id!(
    /// Id of a secondary-asset output.
    AssetOutputId
);
define_id!(
    /// Id of a confirmed block.
    BlockId
);

fn derive_object_id(tx_id: &TransactionId, specifier: &[u8], index: usize) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(tx_id.0);
    hasher.update(specifier);
    hasher.update((index as u64).to_le_bytes());
    hasher.finalize().into()
}

fn hash_currency(hasher: &mut Sha256, value: &Currency) {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    hasher.update(bytes);
}

fn hash_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

/// Sums currency values, failing instead of wrapping on overflow.
pub fn checked_sum<'a, I>(values: I) -> Result<Currency, LedgerError>
where
    I: IntoIterator<Item = &'a Currency>,
{
    values
        .into_iter()
        .try_fold(Currency::zero(), |acc, value| {
            acc.checked_add(*value).ok_or(LedgerError::CurrencyOverflow)
        })
}

// =============================================================================
// CLUSTER B: SPEND CONDITIONS
// =============================================================================

/// Conditions that must be met to spend an output.
///
/// Outputs commit only to `unlock_hash()`; the full conditions are revealed
/// by the input that spends them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockConditions {
    /// The first block height at which the output may be spent.
    pub timelock: BlockHeight,
    /// Keys allowed to sign for the output.
    pub public_keys: Vec<PublicKey>,
    /// Number of distinct keys that must sign.
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// Conditions satisfied by a single signature from `key`.
    pub fn single_key(key: PublicKey) -> Self {
        Self {
            timelock: 0,
            public_keys: vec![key],
            signatures_required: 1,
        }
    }

    /// The hash that outputs commit to.
    pub fn unlock_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.timelock.to_le_bytes());
        hash_len(&mut hasher, self.public_keys.len());
        for key in &self.public_keys {
            hasher.update(key);
        }
        hasher.update(self.signatures_required.to_le_bytes());
        hasher.finalize().into()
    }
}

/// An input spending a value-transfer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueInput {
    pub parent_id: ValueOutputId,
    pub unlock_conditions: UnlockConditions,
}

/// An input spending a secondary-asset output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInput {
    pub parent_id: AssetOutputId,
    pub unlock_conditions: UnlockConditions,
}

/// A signature authorising one input of a transaction.
///
/// `parent_id` is the raw id of the output being spent; the signature covers
/// `Transaction::sig_hash(parent_id)`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub parent_id: Hash,
    pub public_key_index: u64,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

/// Verifies an Ed25519 signature over a 32-byte message.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &Hash,
    signature: &Signature,
) -> Result<(), LedgerError> {
    let key = VerifyingKey::from_bytes(public_key).map_err(|_| LedgerError::InvalidPublicKey)?;
    let signature = ed25519_dalek::Signature::from_bytes(signature);
    key.verify(message, &signature)
        .map_err(|_| LedgerError::BadSignature)
}

// =============================================================================
// CLUSTER C: SPENDABLE OBJECTS
// =============================================================================

/// A value-transfer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOutput {
    pub value: Currency,
    pub unlock_hash: Hash,
}

/// A secondary-asset output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutput {
    pub value: Currency,
    pub unlock_hash: Hash,
}

/// A storage contract. Consumed by a storage proof or by the ledger when it
/// expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub file_size: u64,
    pub file_merkle_root: Hash,
    /// First height at which a storage proof is accepted.
    pub start: BlockHeight,
    /// Height after which the contract is considered missed.
    pub expiration: BlockHeight,
    pub payout: Currency,
    pub valid_proof_unlock_hash: Hash,
    pub missed_proof_unlock_hash: Hash,
}

/// Proof that a segment of a contracted file is still stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub parent_id: ContractId,
    pub segment: Vec<u8>,
    /// Merkle path from the segment leaf up to the root.
    pub hash_set: Vec<Hash>,
}

impl StorageProof {
    /// Folds the segment and its Merkle path into a root.
    pub fn merkle_root(&self) -> Hash {
        let mut node: Hash = Sha256::new()
            .chain_update([0x00])
            .chain_update(&self.segment)
            .finalize()
            .into();
        for sibling in &self.hash_set {
            node = Sha256::new()
                .chain_update([0x01])
                .chain_update(node)
                .chain_update(sibling)
                .finalize()
                .into();
        }
        node
    }
}

// =============================================================================
// CLUSTER D: TRANSACTIONS & BLOCKS
// =============================================================================

/// A ledger transaction.
///
/// Immutable once built: the pool only ever changes a transaction's
/// membership, never its fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub value_inputs: Vec<ValueInput>,
    pub value_outputs: Vec<ValueOutput>,
    pub contracts: Vec<Contract>,
    pub storage_proofs: Vec<StorageProof>,
    pub asset_inputs: Vec<AssetInput>,
    pub asset_outputs: Vec<AssetOutput>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<Vec<u8>>,
    pub signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Content hash over every field, signatures included.
    pub fn id(&self) -> TransactionId {
        let mut hasher = Sha256::new();
        self.hash_body(&mut hasher);
        hash_len(&mut hasher, self.signatures.len());
        for sig in &self.signatures {
            hasher.update(sig.parent_id);
            hasher.update(sig.public_key_index.to_le_bytes());
            hasher.update(sig.signature);
        }
        TransactionId(hasher.finalize().into())
    }

    /// The message a signature for input `parent_id` must sign.
    ///
    /// Covers the whole transaction except the signatures themselves.
    pub fn sig_hash(&self, parent_id: &Hash) -> Hash {
        let mut hasher = Sha256::new();
        self.hash_body(&mut hasher);
        hasher.update(parent_id);
        hasher.finalize().into()
    }

    fn hash_body(&self, hasher: &mut Sha256) {
        hash_len(hasher, self.value_inputs.len());
        for input in &self.value_inputs {
            hasher.update(input.parent_id.0);
            hasher.update(input.unlock_conditions.unlock_hash());
        }
        hash_len(hasher, self.value_outputs.len());
        for output in &self.value_outputs {
            hash_currency(hasher, &output.value);
            hasher.update(output.unlock_hash);
        }
        hash_len(hasher, self.contracts.len());
        for contract in &self.contracts {
            hasher.update(contract.file_size.to_le_bytes());
            hasher.update(contract.file_merkle_root);
            hasher.update(contract.start.to_le_bytes());
            hasher.update(contract.expiration.to_le_bytes());
            hash_currency(hasher, &contract.payout);
            hasher.update(contract.valid_proof_unlock_hash);
            hasher.update(contract.missed_proof_unlock_hash);
        }
        hash_len(hasher, self.storage_proofs.len());
        for proof in &self.storage_proofs {
            hasher.update(proof.parent_id.0);
            hash_len(hasher, proof.segment.len());
            hasher.update(&proof.segment);
            hash_len(hasher, proof.hash_set.len());
            for sibling in &proof.hash_set {
                hasher.update(sibling);
            }
        }
        hash_len(hasher, self.asset_inputs.len());
        for input in &self.asset_inputs {
            hasher.update(input.parent_id.0);
            hasher.update(input.unlock_conditions.unlock_hash());
        }
        hash_len(hasher, self.asset_outputs.len());
        for output in &self.asset_outputs {
            hash_currency(hasher, &output.value);
            hasher.update(output.unlock_hash);
        }
        hash_len(hasher, self.miner_fees.len());
        for fee in &self.miner_fees {
            hash_currency(hasher, fee);
        }
        hash_len(hasher, self.arbitrary_data.len());
        for data in &self.arbitrary_data {
            hash_len(hasher, data.len());
            hasher.update(data);
        }
    }

    /// Id of the value output at `index`.
    pub fn value_output_id(&self, index: usize) -> ValueOutputId {
        ValueOutputId(derive_object_id(&self.id(), SPECIFIER_VALUE_OUTPUT, index))
    }

    /// Id of the contract at `index`.
    pub fn contract_id(&self, index: usize) -> ContractId {
        ContractId(derive_object_id(&self.id(), SPECIFIER_CONTRACT, index))
    }

    /// Id of the asset output at `index`.
    pub fn asset_output_id(&self, index: usize) -> AssetOutputId {
        AssetOutputId(derive_object_id(&self.id(), SPECIFIER_ASSET_OUTPUT, index))
    }

    /// All value outputs created by this transaction, paired with their ids.
    pub fn created_value_outputs(&self) -> Vec<(ValueOutputId, ValueOutput)> {
        let id = self.id();
        self.value_outputs
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let oid = ValueOutputId(derive_object_id(&id, SPECIFIER_VALUE_OUTPUT, i));
                (oid, o.clone())
            })
            .collect()
    }

    /// All contracts created by this transaction, paired with their ids.
    pub fn created_contracts(&self) -> Vec<(ContractId, Contract)> {
        let id = self.id();
        self.contracts
            .iter()
            .enumerate()
            .map(|(i, c)| (ContractId(derive_object_id(&id, SPECIFIER_CONTRACT, i)), c.clone()))
            .collect()
    }

    /// All asset outputs created by this transaction, paired with their ids.
    pub fn created_asset_outputs(&self) -> Vec<(AssetOutputId, AssetOutput)> {
        let id = self.id();
        self.asset_outputs
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let oid = AssetOutputId(derive_object_id(&id, SPECIFIER_ASSET_OUTPUT, i));
                (oid, o.clone())
            })
            .collect()
    }
}

/// A confirmed block as delivered by the ledger.
///
/// `diffs` is the ledger's own account of what the block did to the output
/// maps. Consumers apply it verbatim and never re-derive it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub parent_id: BlockId,
    pub height: BlockHeight,
    pub transactions: Vec<Transaction>,
    pub diffs: OutputDiffs,
}

impl Block {
    /// Builds a block whose id commits to its parent, height and transactions.
    pub fn new(
        parent_id: BlockId,
        height: BlockHeight,
        transactions: Vec<Transaction>,
        diffs: OutputDiffs,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(parent_id.0);
        hasher.update(height.to_le_bytes());
        for tx in &transactions {
            hasher.update(tx.id().0);
        }
        Self {
            id: BlockId(hasher.finalize().into()),
            parent_id,
            height,
            transactions,
            diffs,
        }
    }
}
