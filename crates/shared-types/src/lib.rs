//! # Shared Types Crate
//!
//! Ledger data model shared by the transaction pool, the ledger collaborator
//! and the clients that build transactions.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: ids, objects, transactions and blocks are
//!   defined once, here.
//! - **Content Addressing**: a transaction's id is the hash of its content and
//!   every object id is derived from the id of the transaction that created it.
//! - **Ledger-Computed Diffs**: blocks carry the diffs the ledger computed;
//!   consumers apply them verbatim.

pub mod diffs;
pub mod entities;
pub mod errors;

pub use diffs::*;
pub use entities::*;
pub use errors::*;
