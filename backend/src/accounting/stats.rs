//! Cumulative run counters

use crate::models::{DropReason, Label, Outcome};
use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};

/// Confusion-matrix cell of one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl Classification {
    pub fn classify(label: Label, outcome: Outcome) -> Self {
        match (outcome, label) {
            (Outcome::Dropped(_), Label::Malicious) => Classification::TruePositive,
            (Outcome::Dropped(_), Label::Benign) => Classification::FalsePositive,
            (Outcome::Forwarded, Label::Malicious) => Classification::FalseNegative,
            (Outcome::Forwarded, Label::Benign) => Classification::TrueNegative,
        }
    }
}

/// Counters of one run
///
/// Plain `Copy` data: a snapshot is just a copy taken between two cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub dropped_header: u64,
    pub dropped_policer: u64,
    pub dropped_payload: u64,
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl RunStatistics {
    /// Account one decision against its label
    pub fn record(&mut self, label: Label, outcome: Outcome) -> Classification {
        self.total += 1;
        match outcome {
            Outcome::Forwarded => self.forwarded += 1,
            Outcome::Dropped(reason) => {
                self.dropped += 1;
                match reason {
                    DropReason::Header => self.dropped_header += 1,
                    DropReason::Policer => self.dropped_policer += 1,
                    DropReason::Payload => self.dropped_payload += 1,
                }
            }
        }

        let class = Classification::classify(label, outcome);
        match class {
            Classification::TruePositive => self.true_positive += 1,
            Classification::TrueNegative => self.true_negative += 1,
            Classification::FalsePositive => self.false_positive += 1,
            Classification::FalseNegative => self.false_negative += 1,
        }
        class
    }

    /// Fold another block of counters into this one
    ///
    /// Addition is commutative and associative, so batches may be merged in
    /// any order.
    pub fn merge(&mut self, other: &RunStatistics) {
        self.total += other.total;
        self.forwarded += other.forwarded;
        self.dropped += other.dropped;
        self.dropped_header += other.dropped_header;
        self.dropped_policer += other.dropped_policer;
        self.dropped_payload += other.dropped_payload;
        self.true_positive += other.true_positive;
        self.true_negative += other.true_negative;
        self.false_positive += other.false_positive;
        self.false_negative += other.false_negative;
    }

    /// Drops attributed to one stage
    pub fn dropped_by(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::Header => self.dropped_header,
            DropReason::Policer => self.dropped_policer,
            DropReason::Payload => self.dropped_payload,
        }
    }

    /// FP / (FP + TN), 0.0 without benign traffic
    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.false_positive, self.false_positive + self.true_negative)
    }

    /// FN / (FN + TP), 0.0 without malicious traffic
    pub fn false_negative_rate(&self) -> f64 {
        ratio(self.false_negative, self.false_negative + self.true_positive)
    }

    pub fn malicious_total(&self) -> u64 {
        self.true_positive + self.false_negative
    }

    pub fn benign_total(&self) -> u64 {
        self.true_negative + self.false_positive
    }

    pub fn malicious_dropped(&self) -> u64 {
        self.true_positive
    }

    pub fn malicious_forwarded(&self) -> u64 {
        self.false_negative
    }

    pub fn benign_dropped(&self) -> u64 {
        self.false_positive
    }

    pub fn benign_forwarded(&self) -> u64 {
        self.true_negative
    }

    /// Verify the counter identities
    ///
    /// # Errors
    /// `InvariantViolation` naming the first identity that does not hold.
    pub fn check_invariants(&self) -> Result<(), SimulationError> {
        if self.total != self.forwarded + self.dropped {
            return Err(SimulationError::InvariantViolation(format!(
                "total {} != forwarded {} + dropped {}",
                self.total, self.forwarded, self.dropped
            )));
        }
        let by_reason = self.dropped_header + self.dropped_policer + self.dropped_payload;
        if self.dropped != by_reason {
            return Err(SimulationError::InvariantViolation(format!(
                "dropped {} != sum of drop reasons {}",
                self.dropped, by_reason
            )));
        }
        let confusion = self.true_positive + self.true_negative + self.false_positive + self.false_negative;
        if self.total != confusion {
            return Err(SimulationError::InvariantViolation(format!(
                "total {} != TP + TN + FP + FN {}",
                self.total, confusion
            )));
        }
        if self.dropped != self.true_positive + self.false_positive {
            return Err(SimulationError::InvariantViolation(format!(
                "dropped {} != TP {} + FP {}",
                self.dropped, self.true_positive, self.false_positive
            )));
        }
        Ok(())
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
