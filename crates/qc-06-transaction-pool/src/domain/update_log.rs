//! # Update Log
//!
//! Append-only history of every pool mutation. Subscribers keep a cursor
//! and replay from it, so a missed notification never loses information.
//!
//! ```text
//!  cursor 0          cursor 2
//!     │                 │
//!     ▼                 ▼
//!  ┌──────┬──────┬──────┬──────┐
//!  │ #0   │ #1   │ #2   │ #3   │  ◄── append (pool lock held)
//!  └──────┴──────┴──────┴──────┘
//! ```
//!
//! Entries are immutable and shared through `Arc`. The log is never
//! truncated.

use super::entities::{Block, OutputDiffs, Transaction};
use parking_lot::RwLock;
use std::sync::Arc;

/// One atomic pool mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEntry {
    /// Position in the log, starting at zero.
    pub sequence: u64,
    /// Blocks reverted by the ledger, most recent first.
    pub reverted_blocks: Vec<Block>,
    /// Blocks applied by the ledger, oldest first.
    pub applied_blocks: Vec<Block>,
    /// The whole pending sequence after the mutation.
    pub unconfirmed_transactions: Vec<Transaction>,
    /// Every change made to the output maps, in order.
    pub diffs: OutputDiffs,
}

/// Shared, append-only list of [`UpdateEntry`].
#[derive(Debug, Default)]
pub struct UpdateLog {
    entries: RwLock<Vec<Arc<UpdateEntry>>>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its sequence number.
    ///
    /// Callers must hold the pool lock so entries follow mutation order.
    pub(crate) fn append(
        &self,
        reverted_blocks: Vec<Block>,
        applied_blocks: Vec<Block>,
        unconfirmed_transactions: Vec<Transaction>,
        diffs: OutputDiffs,
    ) -> u64 {
        let mut entries = self.entries.write();
        let sequence = entries.len() as u64;
        entries.push(Arc::new(UpdateEntry {
            sequence,
            reverted_blocks,
            applied_blocks,
            unconfirmed_transactions,
            diffs,
        }));
        sequence
    }

    /// Entries from `cursor` to the end as of this call.
    ///
    /// A cursor at or past the end yields nothing.
    pub fn read_from(&self, cursor: u64) -> Vec<Arc<UpdateEntry>> {
        let entries = self.entries.read();
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        entries.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
