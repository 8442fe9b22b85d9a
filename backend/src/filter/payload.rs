//! Stage 3: payload inspection
//!
//! Signature matching over the payload content plus a threshold on the
//! payload's suspicion score. Stateless.

use crate::arrivals::ATTACK_SIGNATURE;
use crate::models::Cell;
use crate::orchestrator::ConfigError;
use serde::{Deserialize, Serialize};

/// Payload rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    /// Substrings that mark a payload as malicious
    pub signatures: Vec<String>,
    /// Suspicion score at or above which a payload is dropped
    pub suspicion_threshold: f64,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            signatures: vec![ATTACK_SIGNATURE.to_string()],
            suspicion_threshold: 0.8,
        }
    }
}

impl PayloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.suspicion_threshold) {
            return Err(ConfigError::InvalidPipeline(format!(
                "suspicion_threshold must be within [0, 1], got {}",
                self.suspicion_threshold
            )));
        }
        if self.signatures.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidPipeline(
                "payload signatures must not be empty strings".to_string(),
            ));
        }
        Ok(())
    }
}

/// Signature and anomaly-score rule
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadRule {
    signatures: Vec<String>,
    suspicion_threshold: f64,
}

impl PayloadRule {
    pub fn new(signatures: Vec<String>, suspicion_threshold: f64) -> Self {
        Self {
            signatures,
            suspicion_threshold,
        }
    }

    pub fn from_config(config: &PayloadConfig) -> Self {
        Self::new(config.signatures.clone(), config.suspicion_threshold)
    }

    /// First signature contained in the cell's payload
    pub fn matched_signature(&self, cell: &Cell) -> Option<&str> {
        self.signatures
            .iter()
            .find(|sig| cell.payload().content.contains(sig.as_str()))
            .map(String::as_str)
    }

    /// True if the cell must be blocked
    pub fn check(&self, cell: &Cell) -> bool {
        self.matched_signature(cell).is_some() || cell.payload().suspicion >= self.suspicion_threshold
    }

    pub fn add_signature(&mut self, signature: impl Into<String>) {
        self.signatures.push(signature.into());
    }

    /// Remove every copy of `signature`
    pub fn remove_signature(&mut self, signature: &str) {
        self.signatures.retain(|s| s != signature);
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn suspicion_threshold(&self) -> f64 {
        self.suspicion_threshold
    }
}

impl Default for PayloadRule {
    fn default() -> Self {
        Self::from_config(&PayloadConfig::default())
    }
}
