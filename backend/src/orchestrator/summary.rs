//! Run summary
//!
//! The final snapshot of a run: counters, derived rates, and enough identity
//! (effective seed, configuration fingerprint) to replay it.

use crate::accounting::RunStatistics;
use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Final statistics of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub stats: RunStatistics,

    /// FP / (FP + TN), 0.0 without benign traffic
    pub false_positive_rate: f64,

    /// FN / (FN + TP), 0.0 without malicious traffic
    pub false_negative_rate: f64,

    /// Effective RNG seed
    pub seed: u64,

    /// SHA256 of the resolved configuration
    pub config_hash: String,

    /// Timestamp of the last processed cell (simulated seconds)
    pub sim_time: f64,

    /// Run was stopped before the generator was exhausted
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(stats: RunStatistics, seed: u64, config_hash: String, sim_time: f64, cancelled: bool) -> Self {
        Self {
            false_positive_rate: stats.false_positive_rate(),
            false_negative_rate: stats.false_negative_rate(),
            stats,
            seed,
            config_hash,
            sim_time,
            cancelled,
        }
    }
}

/// Compute a canonical SHA256 hash of any serializable configuration
///
/// Object keys are sorted before hashing so the result is independent of
/// map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
