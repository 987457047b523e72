//! Transaction pool error types.
//!
//! Every rejection of `accept` leaves the pool untouched, so callers can act
//! on the error (for example, by not rebroadcasting) without cleanup.

use shared_types::{AssetOutputId, ContractId, Hash, TransactionId, ValueOutputId};
use thiserror::Error;

/// Coarse classification of pool errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing collaborator or invalid configuration at construction.
    Config,
    /// An input is already consumed by the unconfirmed view.
    DoubleSpend,
    /// An input references an object that does not exist.
    UnknownInput,
    /// Structural, arithmetic or authorisation failure.
    Malformed,
    /// The pool lock could not be acquired in time.
    LockTimeout,
    /// Misuse of crate-internal operations.
    Internal,
}

/// Transaction pool error type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Construction failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transaction is already in the pool.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(TransactionId),

    /// The object is spendable in the confirmed set but already consumed by
    /// an unconfirmed transaction, or listed twice by the same transaction.
    #[error("Double spend of {}", hex_prefix(.0))]
    DoubleSpend(Hash),

    /// Value or asset input references an output that does not exist.
    #[error("Unknown input {}", hex_prefix(.0))]
    UnknownInput(Hash),

    /// Storage proof references a contract that does not exist.
    #[error("Unknown contract: {0}")]
    UnknownContract(ContractId),

    /// The transaction would create an object id that already exists.
    #[error("Object already exists: {}", hex_prefix(.0))]
    ObjectAlreadyExists(Hash),

    /// Structural rule violation.
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Revealed unlock conditions do not match the output being spent.
    #[error("Unlock conditions do not match output {}", hex_prefix(.0))]
    UnlockHashMismatch(Hash),

    /// Input is timelocked beyond the current height.
    #[error("Input {} locked until height {timelock} (height {height})", hex_prefix(.input))]
    TimelockNotExpired {
        input: Hash,
        timelock: u64,
        height: u64,
    },

    /// Not enough distinct valid signatures for an input.
    #[error("Input {} has {provided} of {required} required signatures", hex_prefix(.input))]
    MissingSignatures {
        input: Hash,
        required: u64,
        provided: u64,
    },

    /// A signature failed verification.
    #[error("Invalid signature for input {}", hex_prefix(.0))]
    InvalidSignature(Hash),

    /// Storage proof does not prove the contracted file or is out of window.
    #[error("Invalid storage proof for contract {contract}: {reason}")]
    InvalidStorageProof { contract: ContractId, reason: String },

    /// Inputs do not equal outputs plus fees plus payouts.
    #[error("Value imbalance: inputs {inputs}, outputs {outputs}")]
    ValueImbalance { inputs: String, outputs: String },

    /// A currency sum overflowed.
    #[error("Arithmetic overflow in currency sum")]
    ArithmeticOverflow,

    /// Undo was requested for a transaction that is not the tail.
    #[error("Undo out of order: {0} is not the last transaction")]
    UndoOutOfOrder(TransactionId),

    /// The pool lock was not acquired within the timeout.
    #[error("Pool lock not acquired within {timeout_ms}ms")]
    LockTimeout { timeout_ms: u64 },
}

fn hex_prefix(hash: &Hash) -> String {
    hash[..8].iter().map(|b| format!("{b:02x}")).collect()
}

impl PoolError {
    /// Maps the error to its coarse kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::DoubleSpend(_) | Self::DuplicateTransaction(_) => ErrorKind::DoubleSpend,
            Self::UnknownInput(_) | Self::UnknownContract(_) => ErrorKind::UnknownInput,
            Self::ObjectAlreadyExists(_)
            | Self::MalformedTransaction(_)
            | Self::UnlockHashMismatch(_)
            | Self::TimelockNotExpired { .. }
            | Self::MissingSignatures { .. }
            | Self::InvalidSignature(_)
            | Self::InvalidStorageProof { .. }
            | Self::ValueImbalance { .. }
            | Self::ArithmeticOverflow => ErrorKind::Malformed,
            Self::UndoOutOfOrder(_) => ErrorKind::Internal,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
        }
    }

    /// True only for errors where retrying the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Shorthand for a double spend of a value output.
    pub fn double_spent_value(id: &ValueOutputId) -> Self {
        Self::DoubleSpend(id.0)
    }

    /// Shorthand for a double spend of an asset output.
    pub fn double_spent_asset(id: &AssetOutputId) -> Self {
        Self::DoubleSpend(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoolError::MissingSignatures {
            input: [0xAB; 32],
            required: 2,
            provided: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("abababab"));
        assert!(msg.contains("1 of 2"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(PoolError::DoubleSpend([0; 32]).kind(), ErrorKind::DoubleSpend);
        assert_eq!(PoolError::UnknownInput([0; 32]).kind(), ErrorKind::UnknownInput);
        assert_eq!(PoolError::ArithmeticOverflow.kind(), ErrorKind::Malformed);
        assert_eq!(
            PoolError::Config("missing gateway".into()).kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_only_lock_timeout_is_retryable() {
        assert!(PoolError::LockTimeout { timeout_ms: 10 }.is_retryable());
        assert!(!PoolError::DoubleSpend([0; 32]).is_retryable());
        assert!(!PoolError::MalformedTransaction("x".into()).is_retryable());
    }
}
