//! Domain services for the transaction pool.
//!
//! Stateless validation rules. Lookups against the unconfirmed view happen in
//! `UnconfirmedSet`; everything here only needs the transaction, the object
//! being spent and the current height.

use super::entities::{BlockHeight, Contract, Currency, Hash, Transaction};
use super::errors::PoolError;
use shared_types::{
    checked_sum, verify_signature, StorageProof, UnlockConditions, MAX_PROOF_DEPTH, SEGMENT_SIZE,
};
use std::collections::{HashMap, HashSet};

/// Checks every rule that needs nothing but the transaction and the height.
///
/// - no object is consumed twice by the same transaction
/// - contracts pay out something and start in the future
/// - storage proofs are well-formed
/// - every signature points at an input and a key that input reveals
pub fn check_structure(tx: &Transaction, height: BlockHeight) -> Result<(), PoolError> {
    let mut seen = HashSet::new();
    for input in &tx.value_inputs {
        if !seen.insert(input.parent_id.0) {
            return Err(PoolError::double_spent_value(&input.parent_id));
        }
    }
    for input in &tx.asset_inputs {
        if !seen.insert(input.parent_id.0) {
            return Err(PoolError::double_spent_asset(&input.parent_id));
        }
    }
    for proof in &tx.storage_proofs {
        if !seen.insert(proof.parent_id.0) {
            return Err(PoolError::DoubleSpend(proof.parent_id.0));
        }
    }

    for contract in &tx.contracts {
        check_contract_terms(contract, height)?;
    }

    for proof in &tx.storage_proofs {
        if proof.segment.is_empty() || proof.segment.len() > SEGMENT_SIZE {
            return Err(PoolError::MalformedTransaction(format!(
                "storage proof segment is {} bytes, expected 1..={}",
                proof.segment.len(),
                SEGMENT_SIZE
            )));
        }
        if proof.hash_set.len() > MAX_PROOF_DEPTH {
            return Err(PoolError::MalformedTransaction(format!(
                "storage proof path has {} hashes, maximum {}",
                proof.hash_set.len(),
                MAX_PROOF_DEPTH
            )));
        }
    }

    check_signature_structure(tx)
}

fn check_contract_terms(contract: &Contract, height: BlockHeight) -> Result<(), PoolError> {
    if contract.payout.is_zero() {
        return Err(PoolError::MalformedTransaction(
            "contract has zero payout".into(),
        ));
    }
    if contract.start <= height {
        return Err(PoolError::MalformedTransaction(format!(
            "contract starts at {} but height is already {}",
            contract.start, height
        )));
    }
    if contract.expiration <= contract.start {
        return Err(PoolError::MalformedTransaction(format!(
            "contract expires at {} before it starts at {}",
            contract.expiration, contract.start
        )));
    }
    Ok(())
}

fn check_signature_structure(tx: &Transaction) -> Result<(), PoolError> {
    let mut key_counts: HashMap<Hash, usize> = HashMap::new();
    for input in &tx.value_inputs {
        key_counts.insert(input.parent_id.0, input.unlock_conditions.public_keys.len());
    }
    for input in &tx.asset_inputs {
        key_counts.insert(input.parent_id.0, input.unlock_conditions.public_keys.len());
    }

    let mut seen = HashSet::new();
    for sig in &tx.signatures {
        let Some(&keys) = key_counts.get(&sig.parent_id) else {
            return Err(PoolError::MalformedTransaction(
                "signature does not reference an input of the transaction".into(),
            ));
        };
        if sig.public_key_index >= keys as u64 {
            return Err(PoolError::MalformedTransaction(format!(
                "signature key index {} out of range ({} keys)",
                sig.public_key_index, keys
            )));
        }
        if !seen.insert((sig.parent_id, sig.public_key_index)) {
            return Err(PoolError::MalformedTransaction(
                "duplicate signature for the same key".into(),
            ));
        }
    }
    Ok(())
}

/// Checks that `conditions` unlock an output committed to `unlock_hash`.
///
/// The conditions must hash to the committed value, the timelock must have
/// passed, and enough distinct keys must have signed `tx.sig_hash(parent_id)`.
pub fn check_spend(
    tx: &Transaction,
    parent_id: &Hash,
    conditions: &UnlockConditions,
    unlock_hash: &Hash,
    height: BlockHeight,
) -> Result<(), PoolError> {
    if conditions.unlock_hash() != *unlock_hash {
        return Err(PoolError::UnlockHashMismatch(*parent_id));
    }
    if conditions.timelock > height {
        return Err(PoolError::TimelockNotExpired {
            input: *parent_id,
            timelock: conditions.timelock,
            height,
        });
    }

    let message = tx.sig_hash(parent_id);
    let mut provided = 0u64;
    for sig in tx.signatures.iter().filter(|s| s.parent_id == *parent_id) {
        // Index range was checked by check_structure.
        let Some(key) = conditions.public_keys.get(sig.public_key_index as usize) else {
            return Err(PoolError::InvalidSignature(*parent_id));
        };
        verify_signature(key, &message, &sig.signature)
            .map_err(|_| PoolError::InvalidSignature(*parent_id))?;
        provided += 1;
    }

    if provided < conditions.signatures_required {
        return Err(PoolError::MissingSignatures {
            input: *parent_id,
            required: conditions.signatures_required,
            provided,
        });
    }
    Ok(())
}

/// Checks a storage proof against the contract it consumes.
///
/// The proof window is `start <= height < expiration`.
pub fn check_storage_proof(
    proof: &StorageProof,
    contract: &Contract,
    height: BlockHeight,
) -> Result<(), PoolError> {
    if height < contract.start || height >= contract.expiration {
        return Err(PoolError::InvalidStorageProof {
            contract: proof.parent_id,
            reason: format!(
                "height {} outside proof window {}..{}",
                height, contract.start, contract.expiration
            ),
        });
    }
    if proof.merkle_root() != contract.file_merkle_root {
        return Err(PoolError::InvalidStorageProof {
            contract: proof.parent_id,
            reason: "merkle root mismatch".into(),
        });
    }
    Ok(())
}

/// Checks that value and asset amounts are conserved.
///
/// Value: inputs = outputs + miner fees + contract payouts.
/// Assets: inputs = outputs.
pub fn check_balance(
    value_inputs: &[Currency],
    asset_inputs: &[Currency],
    tx: &Transaction,
) -> Result<(), PoolError> {
    let value_in = checked_sum(value_inputs).map_err(|_| PoolError::ArithmeticOverflow)?;
    let value_out = total_value_out(tx)?;
    if value_in != value_out {
        return Err(PoolError::ValueImbalance {
            inputs: value_in.to_string(),
            outputs: value_out.to_string(),
        });
    }

    let asset_in = checked_sum(asset_inputs).map_err(|_| PoolError::ArithmeticOverflow)?;
    let asset_out = checked_sum(tx.asset_outputs.iter().map(|o| &o.value))
        .map_err(|_| PoolError::ArithmeticOverflow)?;
    if asset_in != asset_out {
        return Err(PoolError::ValueImbalance {
            inputs: asset_in.to_string(),
            outputs: asset_out.to_string(),
        });
    }
    Ok(())
}

/// Sum of value outputs, miner fees and contract payouts.
pub fn total_value_out(tx: &Transaction) -> Result<Currency, PoolError> {
    let spent = tx
        .value_outputs
        .iter()
        .map(|o| &o.value)
        .chain(tx.miner_fees.iter())
        .chain(tx.contracts.iter().map(|c| &c.payout));
    checked_sum(spent).map_err(|_| PoolError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{signed_transfer, TestKey};
    use shared_types::{
        ContractId, TransactionSignature, ValueInput, ValueOutput, ValueOutputId, U256,
    };

    fn contract(start: u64, expiration: u64, root: Hash) -> Contract {
        Contract {
            file_size: 64,
            file_merkle_root: root,
            start,
            expiration,
            payout: U256::from(5u64),
            valid_proof_unlock_hash: [1; 32],
            missed_proof_unlock_hash: [2; 32],
        }
    }

    #[test]
    fn test_duplicate_input_is_double_spend() {
        let key = TestKey::new(1);
        let parent = ValueOutputId([9; 32]);
        let mut tx = signed_transfer(&key, &[parent], &[10], 0, [0; 32]);
        tx.value_inputs.push(tx.value_inputs[0].clone());

        assert_eq!(
            check_structure(&tx, 0),
            Err(PoolError::DoubleSpend(parent.0))
        );
    }

    #[test]
    fn test_contract_terms() {
        let mut tx = Transaction::default();
        tx.contracts.push(contract(5, 10, [0; 32]));
        assert!(check_structure(&tx, 4).is_ok());
        // Start must be in the future.
        assert!(matches!(
            check_structure(&tx, 5),
            Err(PoolError::MalformedTransaction(_))
        ));

        tx.contracts[0] = contract(5, 5, [0; 32]);
        assert!(check_structure(&tx, 0).is_err());

        let mut zero = contract(5, 10, [0; 32]);
        zero.payout = U256::zero();
        tx.contracts[0] = zero;
        assert!(check_structure(&tx, 0).is_err());
    }

    #[test]
    fn test_proof_segment_bounds() {
        let mut tx = Transaction::default();
        tx.storage_proofs.push(StorageProof {
            parent_id: ContractId([1; 32]),
            segment: vec![],
            hash_set: vec![],
        });
        assert!(check_structure(&tx, 0).is_err());

        tx.storage_proofs[0].segment = vec![0; SEGMENT_SIZE + 1];
        assert!(check_structure(&tx, 0).is_err());

        tx.storage_proofs[0].segment = vec![0; SEGMENT_SIZE];
        assert!(check_structure(&tx, 0).is_ok());
    }

    #[test]
    fn test_signature_must_reference_input() {
        let mut tx = Transaction::default();
        tx.signatures.push(TransactionSignature {
            parent_id: [7; 32],
            public_key_index: 0,
            signature: [0; 64],
        });
        assert!(matches!(
            check_structure(&tx, 0),
            Err(PoolError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_check_spend_accepts_valid_signature() {
        let key = TestKey::new(1);
        let parent = ValueOutputId([9; 32]);
        let tx = signed_transfer(&key, &[parent], &[10], 0, [0; 32]);

        assert!(check_spend(&tx, &parent.0, &key.unlock_conditions(), &key.unlock_hash(), 0).is_ok());
    }

    #[test]
    fn test_check_spend_wrong_key() {
        let key = TestKey::new(1);
        let other = TestKey::new(2);
        let parent = ValueOutputId([9; 32]);
        let tx = signed_transfer(&key, &[parent], &[10], 0, [0; 32]);

        assert_eq!(
            check_spend(&tx, &parent.0, &key.unlock_conditions(), &other.unlock_hash(), 0),
            Err(PoolError::UnlockHashMismatch(parent.0))
        );
    }

    #[test]
    fn test_check_spend_missing_signature() {
        let key = TestKey::new(1);
        let parent = ValueOutputId([9; 32]);
        let mut tx = signed_transfer(&key, &[parent], &[10], 0, [0; 32]);
        tx.signatures.clear();

        assert!(matches!(
            check_spend(&tx, &parent.0, &key.unlock_conditions(), &key.unlock_hash(), 0),
            Err(PoolError::MissingSignatures { provided: 0, required: 1, .. })
        ));
    }

    #[test]
    fn test_check_spend_tampered_transaction() {
        let key = TestKey::new(1);
        let parent = ValueOutputId([9; 32]);
        let mut tx = signed_transfer(&key, &[parent], &[10], 0, [0; 32]);
        tx.arbitrary_data.push(b"tampered".to_vec());

        assert_eq!(
            check_spend(&tx, &parent.0, &key.unlock_conditions(), &key.unlock_hash(), 0),
            Err(PoolError::InvalidSignature(parent.0))
        );
    }

    #[test]
    fn test_check_spend_timelock() {
        let key = TestKey::new(1);
        let mut conditions = key.unlock_conditions();
        conditions.timelock = 10;
        let parent = ValueOutputId([9; 32]);
        let tx = Transaction {
            value_inputs: vec![ValueInput {
                parent_id: parent,
                unlock_conditions: conditions.clone(),
            }],
            ..Default::default()
        };

        assert!(matches!(
            check_spend(&tx, &parent.0, &conditions, &conditions.unlock_hash(), 9),
            Err(PoolError::TimelockNotExpired { timelock: 10, height: 9, .. })
        ));
    }

    #[test]
    fn test_storage_proof_window_and_root() {
        let proof = StorageProof {
            parent_id: ContractId([1; 32]),
            segment: vec![1, 2, 3],
            hash_set: vec![[4; 32]],
        };
        let good = contract(5, 10, proof.merkle_root());

        assert!(check_storage_proof(&proof, &good, 5).is_ok());
        assert!(check_storage_proof(&proof, &good, 4).is_err());
        assert!(check_storage_proof(&proof, &good, 10).is_err());

        let bad_root = contract(5, 10, [0; 32]);
        assert!(matches!(
            check_storage_proof(&proof, &bad_root, 6),
            Err(PoolError::InvalidStorageProof { .. })
        ));
    }

    #[test]
    fn test_balance() {
        let tx = Transaction {
            value_outputs: vec![ValueOutput {
                value: U256::from(7u64),
                unlock_hash: [0; 32],
            }],
            miner_fees: vec![U256::from(3u64)],
            ..Default::default()
        };

        assert!(check_balance(&[U256::from(10u64)], &[], &tx).is_ok());
        assert!(matches!(
            check_balance(&[U256::from(11u64)], &[], &tx),
            Err(PoolError::ValueImbalance { .. })
        ));
        assert_eq!(
            check_balance(&[U256::MAX, U256::one()], &[], &tx),
            Err(PoolError::ArithmeticOverflow)
        );
    }
}
