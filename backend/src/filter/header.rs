//! Stage 1: header validation
//!
//! Stateless structural checks, cheapest first: header error check, VPI
//! range, then the circuit deny list.

use crate::models::{Cell, VcKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest VPI addressable in an 8-bit UNI header
pub const UNI_MAX_VPI: u16 = 255;

/// Header rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Circuits that are never admitted
    pub deny_list: Vec<VcKey>,
    /// Highest acceptable VPI
    pub max_vpi: u16,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            deny_list: vec![VcKey::new(1, 30)],
            max_vpi: UNI_MAX_VPI,
        }
    }
}

/// Why a header was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderViolation {
    /// Header error check failed
    Corrupted,
    /// VPI beyond the acceptable range
    VpiOutOfRange,
    /// Circuit is on the deny list
    Denied,
}

/// Deny list plus structural checks
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRule {
    deny_list: BTreeSet<VcKey>,
    max_vpi: u16,
}

impl HeaderRule {
    pub fn new(deny_list: impl IntoIterator<Item = VcKey>, max_vpi: u16) -> Self {
        Self {
            deny_list: deny_list.into_iter().collect(),
            max_vpi,
        }
    }

    pub fn from_config(config: &HeaderConfig) -> Self {
        Self::new(config.deny_list.iter().copied(), config.max_vpi)
    }

    /// First violation found, if any
    pub fn violation(&self, cell: &Cell) -> Option<HeaderViolation> {
        let header = cell.header();
        if !header.hec_valid {
            Some(HeaderViolation::Corrupted)
        } else if header.vpi > self.max_vpi {
            Some(HeaderViolation::VpiOutOfRange)
        } else if self.deny_list.contains(&header.circuit()) {
            Some(HeaderViolation::Denied)
        } else {
            None
        }
    }

    /// True if the cell must be blocked
    pub fn check(&self, cell: &Cell) -> bool {
        self.violation(cell).is_some()
    }

    pub fn add(&mut self, circuit: VcKey) {
        self.deny_list.insert(circuit);
    }

    /// Returns whether the circuit was listed
    pub fn remove(&mut self, circuit: &VcKey) -> bool {
        self.deny_list.remove(circuit)
    }

    pub fn is_denied(&self, circuit: &VcKey) -> bool {
        self.deny_list.contains(circuit)
    }

    pub fn deny_list(&self) -> impl Iterator<Item = &VcKey> {
        self.deny_list.iter()
    }
}

impl Default for HeaderRule {
    fn default() -> Self {
        Self::from_config(&HeaderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellHeader, Label, Payload};

    fn cell(vpi: u16, vci: u16, hec_valid: bool) -> Cell {
        Cell::new(
            0,
            0.0,
            CellHeader::new(VcKey::new(vpi, vci), hec_valid),
            Payload::new("NORMALDATA", 0.0),
            Label::Benign,
        )
    }

    #[test]
    fn test_default_denies_1_30() {
        let rule = HeaderRule::default();
        assert_eq!(rule.violation(&cell(1, 30, true)), Some(HeaderViolation::Denied));
        assert!(!rule.check(&cell(1, 20, true)));
    }

    #[test]
    fn test_corruption_reported_before_deny_list() {
        let rule = HeaderRule::default();
        assert_eq!(rule.violation(&cell(1, 30, false)), Some(HeaderViolation::Corrupted));
    }

    #[test]
    fn test_vpi_range() {
        let rule = HeaderRule::new([], 2);
        assert_eq!(rule.violation(&cell(3, 10, true)), Some(HeaderViolation::VpiOutOfRange));
        assert!(!rule.check(&cell(2, 10, true)));
    }

    #[test]
    fn test_add_and_remove() {
        let mut rule = HeaderRule::new([], UNI_MAX_VPI);
        let vc = VcKey::new(0, 10);
        rule.add(vc);
        assert!(rule.check(&cell(0, 10, true)));
        assert!(rule.remove(&vc));
        assert!(!rule.remove(&vc));
        assert!(!rule.check(&cell(0, 10, true)));
    }
}
