//! Accuracy accounting
//!
//! Compares every filter decision with the ground-truth label of its cell and
//! keeps the confusion counts of a run.
//!
//! "Positive" means *dropped*:
//!
//! ```text
//!                   label=malicious     label=benign
//! dropped           true positive       false positive
//! forwarded         false negative      true negative
//! ```
//!
//! # Critical Invariants
//!
//! - `total == forwarded + dropped == TP + TN + FP + FN`
//! - `dropped == dropped_header + dropped_policer + dropped_payload`
//! - Every update is a single counter increment, so the final statistics do
//!   not depend on the order in which decisions are accounted

mod stats;

pub use stats::{Classification, RunStatistics};

use crate::models::{Cell, FilterDecision};
use crate::orchestrator::SimulationError;

/// Owns the [`RunStatistics`] of one run
#[derive(Debug, Clone, Default)]
pub struct Accountant {
    stats: RunStatistics,
}

impl Accountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one (cell, decision) pair
    ///
    /// # Errors
    /// `InvariantViolation` if the decision belongs to a different cell.
    pub fn record(&mut self, cell: &Cell, decision: &FilterDecision) -> Result<Classification, SimulationError> {
        if decision.cell_id != cell.id() {
            return Err(SimulationError::InvariantViolation(format!(
                "decision for cell {} accounted against cell {}",
                decision.cell_id,
                cell.id()
            )));
        }
        Ok(self.stats.record(cell.label(), decision.outcome))
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> RunStatistics {
        self.stats
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Verify the counter identities
    pub fn check_invariants(&self) -> Result<(), SimulationError> {
        self.stats.check_invariants()
    }
}
