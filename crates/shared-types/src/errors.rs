//! # Error Types
//!
//! Errors raised by the shared ledger primitives.

use thiserror::Error;

/// Failures of the cryptographic and arithmetic helpers in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Bytes do not decode to an Ed25519 public key.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature does not verify against the key and message.
    #[error("Signature verification failed")]
    BadSignature,

    /// A currency sum exceeded the representable range.
    #[error("Currency overflow")]
    CurrencyOverflow,
}
