//! # Output-Map Diffs
//!
//! A diff records one insertion into or removal from an output map. Blocks
//! carry the diffs the ledger computed for them, and every pool mutation is
//! reported to subscribers as the diffs it produced.

use crate::entities::{AssetOutput, AssetOutputId, Contract, ContractId, ValueOutput, ValueOutputId};
use serde::{Deserialize, Serialize};

/// Whether a diff adds its object to a map or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffDirection {
    /// The object enters the map.
    Apply,
    /// The object leaves the map.
    Revert,
}

impl DiffDirection {
    /// The direction that undoes this one.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Apply => Self::Revert,
            Self::Revert => Self::Apply,
        }
    }
}

/// A change to the value-output map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOutputDiff {
    pub direction: DiffDirection,
    pub id: ValueOutputId,
    pub output: ValueOutput,
}

/// A change to the contract map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDiff {
    pub direction: DiffDirection,
    pub id: ContractId,
    pub contract: Contract,
}

/// A change to the asset-output map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutputDiff {
    pub direction: DiffDirection,
    pub id: AssetOutputId,
    pub output: AssetOutput,
}

/// Ordered diffs for all three output maps.
///
/// The maps are independent, so only the order within each list matters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputDiffs {
    pub value_outputs: Vec<ValueOutputDiff>,
    pub contracts: Vec<ContractDiff>,
    pub asset_outputs: Vec<AssetOutputDiff>,
}

impl OutputDiffs {
    /// Creates an empty set of diffs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of diffs across all maps.
    pub fn len(&self) -> usize {
        self.value_outputs.len() + self.contracts.len() + self.asset_outputs.len()
    }

    /// Returns true if no map is touched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `other` after the diffs already recorded.
    pub fn extend(&mut self, other: OutputDiffs) {
        self.value_outputs.extend(other.value_outputs);
        self.contracts.extend(other.contracts);
        self.asset_outputs.extend(other.asset_outputs);
    }

    /// The diffs that undo these: every list reversed, every direction flipped.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            value_outputs: self
                .value_outputs
                .iter()
                .rev()
                .map(|d| ValueOutputDiff {
                    direction: d.direction.inverse(),
                    ..d.clone()
                })
                .collect(),
            contracts: self
                .contracts
                .iter()
                .rev()
                .map(|d| ContractDiff {
                    direction: d.direction.inverse(),
                    ..d.clone()
                })
                .collect(),
            asset_outputs: self
                .asset_outputs
                .iter()
                .rev()
                .map(|d| AssetOutputDiff {
                    direction: d.direction.inverse(),
                    ..d.clone()
                })
                .collect(),
        }
    }
}
