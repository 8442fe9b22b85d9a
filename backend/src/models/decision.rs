//! Filter decisions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage that rejected a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Header,
    Policer,
    Payload,
}

impl DropReason {
    pub const ALL: [DropReason; 3] = [DropReason::Header, DropReason::Policer, DropReason::Payload];

    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Header => "header",
            DropReason::Policer => "policer",
            DropReason::Payload => "payload",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the pipeline did with a cell
///
/// A drop always carries exactly one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Forwarded,
    Dropped(DropReason),
}

/// Result of running one cell through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub cell_id: u64,
    pub outcome: Outcome,
}

impl FilterDecision {
    pub fn forwarded(cell_id: u64) -> Self {
        Self {
            cell_id,
            outcome: Outcome::Forwarded,
        }
    }

    pub fn dropped(cell_id: u64, reason: DropReason) -> Self {
        Self {
            cell_id,
            outcome: Outcome::Dropped(reason),
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self.outcome, Outcome::Dropped(_))
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self.outcome {
            Outcome::Dropped(reason) => Some(reason),
            Outcome::Forwarded => None,
        }
    }
}
