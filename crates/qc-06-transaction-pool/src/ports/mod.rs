//! Ports layer for the transaction pool.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: the pool API and the ledger listener
//! - Outbound (Driven) ports: the ledger and the network gateway

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
