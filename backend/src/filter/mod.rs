//! Filter pipeline
//!
//! Classifies each cell as forwarded or dropped, attributing a drop to exactly
//! one stage.
//!
//! # Stage Order
//!
//! ```text
//! cell → [1] header  → [2] policer → [3] payload → forwarded
//!           │             │             │
//!           ▼             ▼             ▼
//!        dropped       dropped       dropped
//!        (header)      (policer)     (payload)
//! ```
//!
//! Stages run strictly in order and the first failing stage decides the
//! outcome; later stages never see that cell. In particular a cell dropped by
//! the header check does not consume a policer token.
//!
//! The policer is the only stage with memory across cells; its bucket table is
//! owned by the pipeline instance, so each run builds its own pipeline.

pub mod header;
pub mod payload;
pub mod policer;

pub use header::{HeaderConfig, HeaderRule, HeaderViolation};
pub use payload::{PayloadConfig, PayloadRule};
pub use policer::{CircuitContract, Policer, PolicerConfig, TokenBucket, TrafficContract};

use crate::models::{Cell, DropReason, FilterDecision};
use crate::orchestrator::ConfigError;
use serde::{Deserialize, Serialize};

/// Complete pipeline configuration
///
/// Loadable from JSON; omitted sections fall back to their defaults.
///
/// # Example
///
/// ```
/// use atm_filter_sim::filter::PipelineConfig;
///
/// let config: PipelineConfig = serde_json::from_str(
///     r#"{ "payload": { "signatures": ["EVIL"], "suspicion_threshold": 0.9 } }"#,
/// ).unwrap();
/// assert_eq!(config.payload.signatures, vec!["EVIL".to_string()]);
/// assert_eq!(config.header.deny_list.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub header: HeaderConfig,
    pub policer: PolicerConfig,
    pub payload: PayloadConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policer.validate()?;
        self.payload.validate()?;
        Ok(())
    }
}

/// Three-stage filter of one run
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    header: HeaderRule,
    policer: Policer,
    payload: PayloadRule,
    evaluated: u64,
}

impl FilterPipeline {
    /// Build a fresh pipeline (empty policer table)
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            header: HeaderRule::from_config(&config.header),
            policer: Policer::new(&config.policer),
            payload: PayloadRule::from_config(&config.payload),
            evaluated: 0,
        }
    }

    /// Run one cell through the stages
    pub fn evaluate(&mut self, cell: &Cell) -> FilterDecision {
        self.evaluated += 1;

        if let Some(violation) = self.header.violation(cell) {
            tracing::trace!(cell = cell.id(), ?violation, "dropped by header check");
            return FilterDecision::dropped(cell.id(), DropReason::Header);
        }

        if !self.policer.allow(cell.source(), cell.timestamp()) {
            tracing::trace!(cell = cell.id(), circuit = %cell.source(), "dropped by policer");
            return FilterDecision::dropped(cell.id(), DropReason::Policer);
        }

        if self.payload.check(cell) {
            tracing::trace!(cell = cell.id(), suspicion = cell.payload().suspicion, "dropped by payload inspection");
            return FilterDecision::dropped(cell.id(), DropReason::Payload);
        }

        FilterDecision::forwarded(cell.id())
    }

    /// Cells evaluated so far
    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }

    pub fn header_rule(&self) -> &HeaderRule {
        &self.header
    }

    pub fn header_rule_mut(&mut self) -> &mut HeaderRule {
        &mut self.header
    }

    pub fn policer(&self) -> &Policer {
        &self.policer
    }

    pub fn payload_rule(&self) -> &PayloadRule {
        &self.payload
    }

    pub fn payload_rule_mut(&mut self) -> &mut PayloadRule {
        &mut self.payload
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
