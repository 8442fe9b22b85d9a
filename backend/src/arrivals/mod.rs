//! Cell generation for a run.
//!
//! Produces the synthetic traffic of one simulation: a lazy, finite,
//! single-pass sequence of [`Cell`]s, each carrying its ground-truth label.
//!
//! # Key Principles
//!
//! 1. **Determinism**: Same seed + same config + same profile → same cells
//! 2. **Fixed spacing**: one cell per `1 / rate` simulated seconds, optionally
//!    shifted forward by a jitter smaller than one slot
//! 3. **Bernoulli labels**: each cell is malicious with probability `mal_frac`
//! 4. **Biased features**: malicious cells are more likely to fail every
//!    filter stage, with the strengths fixed in [`TrafficProfile`]
//!
//! Random draws happen in a fixed order per cell (label, circuit, header,
//! payload, jitter) so that a seed fully determines the sequence.
//!
//! # Example
//!
//! ```
//! use atm_filter_sim::arrivals::{CellGenerator, TrafficProfile};
//! use atm_filter_sim::RunConfig;
//!
//! let config = RunConfig { duration: 1.0, rate: 100.0, mal_frac: 0.1, seed: Some(42) };
//! let cells: Vec<_> = CellGenerator::new(&config, 42, TrafficProfile::default()).collect();
//! assert_eq!(cells.len(), 100);
//! ```

use crate::core::time::SimClock;
use crate::models::{Cell, CellHeader, Label, Payload, VcKey};
use crate::orchestrator::{ConfigError, RunConfig};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Payload carried by clean traffic
pub const NORMAL_PAYLOAD: &str = "NORMALDATA";

/// Prefix of the attack signature embedded in malicious payloads
pub const ATTACK_SIGNATURE: &str = "BADSIG_";

/// Traffic shape and per-label bias strengths.
///
/// The defaults are the documented constants the test-suite relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficProfile {
    /// VPIs terminals transmit on
    pub vpis: Vec<u16>,

    /// VCIs terminals transmit on
    pub vcis: Vec<u16>,

    /// Circuit malicious terminals flood
    pub flood_target: VcKey,

    /// Probability a malicious cell is sent on `flood_target`
    pub malicious_flood_probability: f64,

    /// Probability a benign cell has a corrupted header
    pub benign_header_corruption: f64,

    /// Probability a malicious cell has a corrupted header
    pub malicious_header_corruption: f64,

    /// Probability a malicious payload carries the attack signature
    pub malicious_signature_probability: f64,

    /// Suspicion score range `[low, high)` of benign payloads
    pub benign_suspicion: (f64, f64),

    /// Suspicion score range `[low, high)` of malicious payloads
    pub malicious_suspicion: (f64, f64),

    /// Forward jitter as a fraction of one slot, in `[0, 1)`
    pub jitter: f64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            vpis: vec![0, 1, 2],
            vcis: vec![10, 20, 30, 40],
            flood_target: VcKey::new(2, 40),
            malicious_flood_probability: 0.75,
            benign_header_corruption: 0.002,
            malicious_header_corruption: 0.15,
            malicious_signature_probability: 0.70,
            benign_suspicion: (0.0, 0.82),
            malicious_suspicion: (0.5, 1.0),
            jitter: 0.0,
        }
    }
}

impl TrafficProfile {
    /// Check the profile can drive a generator
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vpis.is_empty() || self.vcis.is_empty() {
            return Err(ConfigError::InvalidProfile(
                "circuit pool must contain at least one VPI and one VCI".to_string(),
            ));
        }

        let probabilities = [
            ("malicious_flood_probability", self.malicious_flood_probability),
            ("benign_header_corruption", self.benign_header_corruption),
            ("malicious_header_corruption", self.malicious_header_corruption),
            ("malicious_signature_probability", self.malicious_signature_probability),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidProfile(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }

        for (name, (low, high)) in [
            ("benign_suspicion", self.benign_suspicion),
            ("malicious_suspicion", self.malicious_suspicion),
        ] {
            if !(0.0 <= low && low < high && high <= 1.0) {
                return Err(ConfigError::InvalidProfile(format!(
                    "{} must satisfy 0 <= low < high <= 1, got ({}, {})",
                    name, low, high
                )));
            }
        }

        if !(0.0..1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidProfile(format!(
                "jitter must be within [0, 1), got {}",
                self.jitter
            )));
        }

        Ok(())
    }
}

/// Lazy cell sequence of one run.
///
/// Not restartable: once exhausted it stays exhausted. Build a new generator
/// for a new run.
#[derive(Debug, Clone)]
pub struct CellGenerator {
    clock: SimClock,
    rng: RngManager,
    mal_frac: f64,
    profile: TrafficProfile,
    seed: u64,
    next_id: u64,
    exhausted: bool,
}

impl CellGenerator {
    /// Create a generator for a validated config.
    ///
    /// # Arguments
    ///
    /// * `config` - Run parameters (duration, rate, malicious fraction)
    /// * `seed` - Effective seed; callers resolve `config.seed` or draw entropy
    /// * `profile` - Traffic shape and bias constants
    pub fn new(config: &RunConfig, seed: u64, profile: TrafficProfile) -> Self {
        Self {
            clock: SimClock::new(config.rate, config.duration),
            rng: RngManager::new(seed),
            mal_frac: config.mal_frac,
            profile,
            seed,
            next_id: 0,
            exhausted: false,
        }
    }

    /// Seed the sequence was generated from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Cells produced so far
    pub fn generated(&self) -> u64 {
        self.next_id
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn sample_label(&mut self) -> Label {
        if self.rng.chance(self.mal_frac) {
            Label::Malicious
        } else {
            Label::Benign
        }
    }

    fn sample_circuit(&mut self, label: Label) -> VcKey {
        if label.is_malicious() && self.rng.chance(self.profile.malicious_flood_probability) {
            return self.profile.flood_target;
        }
        let vpi = *self.rng.choose(&self.profile.vpis);
        let vci = *self.rng.choose(&self.profile.vcis);
        VcKey::new(vpi, vci)
    }

    fn sample_header(&mut self, label: Label, circuit: VcKey) -> CellHeader {
        let corruption = match label {
            Label::Benign => self.profile.benign_header_corruption,
            Label::Malicious => self.profile.malicious_header_corruption,
        };
        CellHeader::new(circuit, !self.rng.chance(corruption))
    }

    fn sample_payload(&mut self, label: Label) -> Payload {
        let content = if label.is_malicious() && self.rng.chance(self.profile.malicious_signature_probability) {
            format!("{}{}", ATTACK_SIGNATURE, self.rng.range(0, 1000))
        } else {
            NORMAL_PAYLOAD.to_string()
        };

        let (low, high) = match label {
            Label::Benign => self.profile.benign_suspicion,
            Label::Malicious => self.profile.malicious_suspicion,
        };
        Payload::new(content, self.rng.uniform(low, high))
    }
}

impl Iterator for CellGenerator {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        if self.exhausted {
            return None;
        }

        let slot = match self.clock.next_slot() {
            Some(t) => t,
            None => {
                self.exhausted = true;
                return None;
            }
        };

        let label = self.sample_label();
        let circuit = self.sample_circuit(label);
        let header = self.sample_header(label, circuit);
        let payload = self.sample_payload(label);

        let timestamp = if self.profile.jitter > 0.0 {
            slot + self.rng.next_f64() * self.profile.jitter * self.clock.interval()
        } else {
            slot
        };
        if timestamp >= self.clock.duration() {
            self.exhausted = true;
            return None;
        }

        let cell = Cell::new(self.next_id, timestamp, header, payload, label);
        self.next_id += 1;
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(duration: f64, rate: f64, mal_frac: f64) -> RunConfig {
        RunConfig {
            duration,
            rate,
            mal_frac,
            seed: Some(42),
        }
    }

    #[test]
    fn test_default_profile_is_valid() {
        assert!(TrafficProfile::default().validate().is_ok());
    }

    #[test]
    fn test_profile_rejects_bad_values() {
        let mut p = TrafficProfile::default();
        p.jitter = 1.0;
        assert!(p.validate().is_err());

        let mut p = TrafficProfile::default();
        p.vcis.clear();
        assert!(p.validate().is_err());

        let mut p = TrafficProfile::default();
        p.malicious_header_corruption = 1.5;
        assert!(p.validate().is_err());

        let mut p = TrafficProfile::default();
        p.benign_suspicion = (0.9, 0.1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_cell_count_matches_rate_times_duration() {
        let cells: Vec<Cell> = CellGenerator::new(&config(5.0, 200.0, 0.12), 42, TrafficProfile::default()).collect();
        assert_eq!(cells.len(), 1000);
        assert_eq!(cells.last().unwrap().id(), 999);
    }

    #[test]
    fn test_ids_and_timestamps_increase() {
        let mut profile = TrafficProfile::default();
        profile.jitter = 0.9;
        let cells: Vec<Cell> = CellGenerator::new(&config(2.0, 300.0, 0.5), 7, profile).collect();

        for pair in cells.windows(2) {
            assert_eq!(pair[1].id(), pair[0].id() + 1);
            assert!(pair[1].timestamp() > pair[0].timestamp());
        }
        assert!(cells.iter().all(|c| c.timestamp() < 2.0));
    }

    #[test]
    fn test_exhausted_generator_stays_exhausted() {
        let mut gen = CellGenerator::new(&config(0.01, 100.0, 0.0), 1, TrafficProfile::default());
        assert!(gen.next().is_some());
        assert!(gen.next().is_none());
        assert!(gen.is_exhausted());
        assert!(gen.next().is_none());
        assert_eq!(gen.generated(), 1);
    }

    #[test]
    fn test_benign_cells_never_carry_signature() {
        let cells = CellGenerator::new(&config(5.0, 200.0, 0.0), 3, TrafficProfile::default());
        for cell in cells {
            assert_eq!(cell.label(), Label::Benign);
            assert_eq!(cell.payload().content, NORMAL_PAYLOAD);
            assert!(cell.payload().suspicion < 0.82);
        }
    }

    #[test]
    fn test_malicious_cells_favor_flood_target() {
        let cells: Vec<Cell> = CellGenerator::new(&config(5.0, 200.0, 1.0), 11, TrafficProfile::default()).collect();
        let on_target = cells
            .iter()
            .filter(|c| c.source() == VcKey::new(2, 40))
            .count();
        // 75% flood probability plus 1/12 of the remainder
        assert!(on_target > cells.len() / 2);
        assert!(cells.iter().all(|c| c.payload().suspicion >= 0.5));
    }
}
