//! Integration flows for the transaction pool.

pub mod flows;
pub mod subscribers;
