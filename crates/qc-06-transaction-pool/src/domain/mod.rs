//! # Domain Layer - Transaction Pool
//!
//! Pure pool logic with no knowledge of the ledger or the network.
//!
//! ## Components
//!
//! - `entities`: PoolEntry, PoolConfig, re-exported ledger types
//! - `unconfirmed`: UnconfirmedSet (ordered pending transactions + output maps)
//! - `reference`: ReferenceSet (objects consumed by pending transactions)
//! - `resync`: type-state ResyncEngine for ledger reorganisations
//! - `update_log`: UpdateLog, the append-only mutation history
//! - `services`: stateless validation rules
//! - `value_objects`: PoolStatus, ResyncOutcome, Reinsertion
//! - `errors`: PoolError enumeration

pub mod entities;
pub mod errors;
pub mod reference;
pub mod resync;
pub mod services;
pub mod unconfirmed;
pub mod update_log;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use reference::{ReferenceSet, ReleasedObjects};
pub use resync::{ResyncEngine, ResyncReport};
pub use unconfirmed::UnconfirmedSet;
pub use update_log::{UpdateEntry, UpdateLog};
pub use value_objects::*;
