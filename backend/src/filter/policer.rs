//! Stage 2: per-circuit rate policing
//!
//! Token bucket per virtual circuit. A bucket starts full, refills
//! continuously at the contract rate up to its burst capacity, and every
//! admitted cell consumes one token. A cell arriving at an empty bucket is
//! dropped.
//!
//! # Critical Invariants
//!
//! - The bucket table belongs to one pipeline instance, i.e. one run
//! - Only cells with a contract (per-circuit or default) touch the table
//! - `0 <= tokens <= capacity` at all times

use crate::models::VcKey;
use crate::orchestrator::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token bucket parameters of a circuit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficContract {
    /// Sustained rate (tokens per simulated second)
    pub rate: f64,
    /// Bucket capacity (cells admitted back-to-back)
    pub burst: f64,
}

impl TrafficContract {
    pub const fn new(rate: f64, burst: f64) -> Self {
        Self { rate, burst }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ConfigError::InvalidPipeline(format!(
                "policer rate must be positive, got {}",
                self.rate
            )));
        }
        if !(self.burst.is_finite() && self.burst >= 1.0) {
            return Err(ConfigError::InvalidPipeline(format!(
                "policer burst must be at least 1, got {}",
                self.burst
            )));
        }
        Ok(())
    }
}

/// Contract bound to one circuit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitContract {
    pub circuit: VcKey,
    pub contract: TrafficContract,
}

/// Policer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicerConfig {
    /// Per-circuit contracts
    pub contracts: Vec<CircuitContract>,
    /// Contract for every other circuit; `None` leaves them unpoliced
    pub default_contract: Option<TrafficContract>,
}

impl Default for PolicerConfig {
    fn default() -> Self {
        Self {
            contracts: vec![
                CircuitContract {
                    circuit: VcKey::new(0, 10),
                    contract: TrafficContract::new(50.0, 20.0),
                },
                CircuitContract {
                    circuit: VcKey::new(2, 40),
                    contract: TrafficContract::new(30.0, 10.0),
                },
            ],
            default_contract: Some(TrafficContract::new(60.0, 30.0)),
        }
    }
}

impl PolicerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for c in &self.contracts {
            c.contract.validate()?;
        }
        if let Some(default) = &self.default_contract {
            default.validate()?;
        }
        Ok(())
    }
}

/// Token bucket for a single circuit
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_time: Option<f64>,
}

impl TokenBucket {
    /// A full bucket
    pub fn new(contract: TrafficContract) -> Self {
        Self {
            rate: contract.rate,
            capacity: contract.burst,
            tokens: contract.burst,
            last_time: None,
        }
    }

    /// Refill for the time elapsed since the last arrival, then try to
    /// consume one token. Returns whether the cell conforms.
    pub fn allow(&mut self, now: f64) -> bool {
        let last = *self.last_time.get_or_insert(now);
        let elapsed = now - last;
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
            self.last_time = Some(now);
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Bucket table of one run
#[derive(Debug, Clone, Default)]
pub struct Policer {
    contracts: HashMap<VcKey, TrafficContract>,
    default_contract: Option<TrafficContract>,
    buckets: HashMap<VcKey, TokenBucket>,
}

impl Policer {
    pub fn new(config: &PolicerConfig) -> Self {
        Self {
            contracts: config
                .contracts
                .iter()
                .map(|c| (c.circuit, c.contract))
                .collect(),
            default_contract: config.default_contract,
            buckets: HashMap::new(),
        }
    }

    /// Contract that applies to a circuit, if any
    pub fn contract_for(&self, circuit: &VcKey) -> Option<TrafficContract> {
        self.contracts.get(circuit).copied().or(self.default_contract)
    }

    /// Police one arrival. Unpoliced circuits always conform.
    pub fn allow(&mut self, circuit: VcKey, now: f64) -> bool {
        let contract = match self.contract_for(&circuit) {
            Some(c) => c,
            None => return true,
        };
        self.buckets
            .entry(circuit)
            .or_insert_with(|| TokenBucket::new(contract))
            .allow(now)
    }

    pub fn bucket(&self, circuit: &VcKey) -> Option<&TokenBucket> {
        self.buckets.get(circuit)
    }

    /// Circuits with a live bucket
    pub fn tracked_circuits(&self) -> usize {
        self.buckets.len()
    }
}
