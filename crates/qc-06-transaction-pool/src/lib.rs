//! # Transaction Pool Subsystem
//!
//! **Subsystem ID:** 6
//!
//! ## Purpose
//!
//! Holds transactions that are valid against the confirmed ledger but not
//! yet in a block. Pending transactions may spend each other's outputs, so
//! the pool keeps an unconfirmed view of the output maps and validates every
//! new transaction against it. When the ledger reverts or applies blocks the
//! pool rebuilds itself, and every mutation is recorded in an append-only
//! log that subscribers replay at their own pace.
//!
//! ## Domain Invariants
//!
//! | Invariant           | Enforcement Location                             |
//! |---------------------|--------------------------------------------------|
//! | Dependency order    | `domain/unconfirmed.rs` - tail-only accept/undo  |
//! | Set consistency     | `domain/unconfirmed.rs` - `accept()`, `undo()`   |
//! | Reference set empty iff pool empty | `domain/reference.rs` - `release()` |
//! | Rejection leaves no trace | `domain/unconfirmed.rs` - validate before commit |
//!
//! ## Resync
//!
//! ```text
//! [Idle] ──revert──→ [Reverting] ──rebase──→ [Rebasing] ──readd──→ [Readding]
//!   ▲                                                                   │
//!   └──────────────────────────── finish ──────────────────────────────┘
//! ```
//!
//! | Phase     | Effect                                                  |
//! |-----------|---------------------------------------------------------|
//! | Reverting | Undo every pending transaction                          |
//! | Rebasing  | Apply the ledger's diffs for reverted and applied blocks |
//! | Readding  | Reverted-block transactions first, then the old pending set |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - gateways, subscriber fan-out                       │
//! │  service.rs - TransactionPool, TransactionPoolBuilder           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - TransactionPoolApi, ConsensusChangeListener│
//! │  ports/outbound.rs - ConsensusSet, Gateway                      │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/unconfirmed.rs  - UnconfirmedSet                        │
//! │  domain/reference.rs    - ReferenceSet                          │
//! │  domain/resync.rs       - ResyncEngine (type-state)             │
//! │  domain/update_log.rs   - UpdateLog                             │
//! │  domain/services.rs     - validation rules                      │
//! │  domain/errors.rs       - PoolError enum                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = TransactionPoolBuilder::new()
//!     .with_consensus(ledger)
//!     .with_gateway(Arc::new(TracingGateway))
//!     .build()?;
//! pool.accept_transaction(tx)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
pub use service::{TransactionPool, TransactionPoolBuilder};
