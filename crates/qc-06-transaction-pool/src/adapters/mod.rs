//! Adapters layer for the transaction pool.
//!
//! Gateway implementations and the subscriber fan-out.

pub mod publisher;
pub mod subscriber;

#[cfg(any(test, feature = "test-utils"))]
pub use publisher::RecordingGateway;
pub use publisher::{NoOpGateway, TracingGateway};
pub use subscriber::{SubscriberHandle, SubscriberHub};
