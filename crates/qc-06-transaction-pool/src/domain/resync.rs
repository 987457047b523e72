//! # Type-State Resynchronization
//!
//! Rebuilds the unconfirmed set after the ledger reverts and applies blocks.
//! Each phase is a distinct type; a transition consumes the engine and
//! returns it in the next phase, so phases cannot be skipped or repeated:
//!
//! ```text
//! [Idle] ──revert──→ [Reverting] ──rebase──→ [Rebasing] ──readd──→ [Readding]
//!   ▲                                                                   │
//!   └──────────────────────────── finish ──────────────────────────────┘
//! ```
//!
//! | Phase     | Work done on entering it                                  |
//! |-----------|-----------------------------------------------------------|
//! | Reverting | Snapshot the pending sequence, undo it tail to head       |
//! | Rebasing  | Reverted blocks' diffs inverted, then applied blocks' diffs |
//! | Readding  | Reverted-block transactions, then the snapshot            |
//!
//! The caller holds the pool lock for the whole run, so no intermediate
//! phase is ever observable.

use super::entities::{Block, OutputDiffs, Transaction, TransactionId};
use super::unconfirmed::UnconfirmedSet;
use super::value_objects::ResyncOutcome;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::info;

// =============================================================================
// PHASE MARKERS (Zero-Sized Types)
// =============================================================================

/// Marker: no resync in progress.
#[derive(Debug, Clone, Copy)]
pub struct Idle;

/// Marker: pending transactions have been undone.
#[derive(Debug, Clone, Copy)]
pub struct Reverting;

/// Marker: the output maps follow the new ledger tip.
#[derive(Debug, Clone, Copy)]
pub struct Rebasing;

/// Marker: surviving transactions are back in the set.
#[derive(Debug, Clone, Copy)]
pub struct Readding;

// =============================================================================
// ENGINE
// =============================================================================

/// Result of a completed resync.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Every map change made, across all phases.
    pub diffs: OutputDiffs,
    pub outcome: ResyncOutcome,
}

/// Resync state machine over a borrowed unconfirmed set.
#[derive(Debug)]
pub struct ResyncEngine<'a, S> {
    set: &'a mut UnconfirmedSet,
    reverted_blocks: &'a [Block],
    applied_blocks: &'a [Block],
    pending: Vec<Transaction>,
    report: ResyncReport,
    _phase: PhantomData<S>,
}

impl<'a, S> ResyncEngine<'a, S> {
    fn advance<T>(self) -> ResyncEngine<'a, T> {
        ResyncEngine {
            set: self.set,
            reverted_blocks: self.reverted_blocks,
            applied_blocks: self.applied_blocks,
            pending: self.pending,
            report: self.report,
            _phase: PhantomData,
        }
    }
}

impl<'a> ResyncEngine<'a, Idle> {
    /// Prepares a resync for `reverted_blocks` (most recent first) and
    /// `applied_blocks` (oldest first).
    pub fn new(
        set: &'a mut UnconfirmedSet,
        reverted_blocks: &'a [Block],
        applied_blocks: &'a [Block],
    ) -> Self {
        Self {
            set,
            reverted_blocks,
            applied_blocks,
            pending: Vec::new(),
            report: ResyncReport::default(),
            _phase: PhantomData,
        }
    }

    /// Snapshots and undoes every pending transaction.
    ///
    /// Afterwards the reference set is empty.
    #[must_use = "the resync must be carried through to finish()"]
    pub fn revert(mut self) -> ResyncEngine<'a, Reverting> {
        let (pending, diffs) = self.set.undo_all();
        self.pending = pending;
        self.report.diffs.extend(diffs);
        self.advance()
    }
}

impl<'a> ResyncEngine<'a, Reverting> {
    /// Moves the output maps to the new ledger tip.
    ///
    /// Diffs the maps disagree with are applied anyway and counted.
    #[must_use = "the resync must be carried through to finish()"]
    pub fn rebase(mut self) -> ResyncEngine<'a, Rebasing> {
        let mut inconsistent = 0;
        for block in self.reverted_blocks {
            let inverted = block.diffs.inverted();
            inconsistent += self.set.apply_diffs(&inverted);
            self.set.set_height(block.height.saturating_sub(1));
            self.report.diffs.extend(inverted);
        }
        for block in self.applied_blocks {
            inconsistent += self.set.apply_diffs(&block.diffs);
            self.set.set_height(block.height);
            self.report.diffs.extend(block.diffs.clone());
        }

        let outcome = &mut self.report.outcome;
        outcome.reverted_blocks = self.reverted_blocks.len();
        outcome.applied_blocks = self.applied_blocks.len();
        outcome.inconsistent_diffs = inconsistent;
        outcome.height = self.set.height();
        self.advance()
    }
}

impl<'a> ResyncEngine<'a, Rebasing> {
    /// Re-validates transactions from reverted blocks (oldest block first),
    /// then the snapshot. Anything confirmed by an applied block is skipped.
    #[must_use = "the resync must be carried through to finish()"]
    pub fn readd(mut self) -> ResyncEngine<'a, Readding> {
        let confirmed: HashSet<TransactionId> = self
            .applied_blocks
            .iter()
            .flat_map(|b| b.transactions.iter().map(Transaction::id))
            .collect();

        let reverted: Vec<Transaction> = self
            .reverted_blocks
            .iter()
            .rev()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !confirmed.contains(&tx.id()))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        let mut pending = Vec::with_capacity(self.pending.len());
        for tx in std::mem::take(&mut self.pending) {
            let id = tx.id();
            if confirmed.contains(&id) {
                removed.push(id);
            } else {
                pending.push(tx);
            }
        }

        let reinsertion = self.set.reinsert_after_revert(reverted, pending);
        self.report.diffs.extend(reinsertion.diffs);
        self.report.outcome.readded = reinsertion.readded;
        removed.extend(reinsertion.dropped);
        self.report.outcome.dropped = removed;
        self.advance()
    }
}

impl<'a> ResyncEngine<'a, Readding> {
    /// Ends the resync and hands back its report.
    pub fn finish(self) -> ResyncReport {
        let outcome = &self.report.outcome;
        info!(
            reverted = outcome.reverted_blocks,
            applied = outcome.applied_blocks,
            readded = outcome.readded,
            dropped = outcome.dropped.len(),
            height = outcome.height,
            "Transaction pool resynchronized"
        );
        self.report
    }
}

/// Runs every phase in order.
pub fn run(
    set: &mut UnconfirmedSet,
    reverted_blocks: &[Block],
    applied_blocks: &[Block],
) -> ResyncReport {
    ResyncEngine::new(set, reverted_blocks, applied_blocks)
        .revert()
        .rebase()
        .readd()
        .finish()
}
