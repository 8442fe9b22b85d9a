//! Cell model
//!
//! A cell is one simulated request travelling from a teller terminal to the
//! banking network: a small header identifying its virtual circuit, an opaque
//! payload, and the ground-truth label the generator assigned to it.
//!
//! # Critical Invariants
//!
//! - Sequence ids strictly increase within a run
//! - The label is fixed at construction; there is no mutator for it

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual circuit key `(vpi, vci)`
///
/// Identifies the source of a cell for policing and deny-listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VcKey {
    /// Virtual path identifier
    pub vpi: u16,
    /// Virtual channel identifier
    pub vci: u16,
}

impl VcKey {
    pub const fn new(vpi: u16, vci: u16) -> Self {
        Self { vpi, vci }
    }
}

impl fmt::Display for VcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vpi, self.vci)
    }
}

/// Cell header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellHeader {
    pub vpi: u16,
    pub vci: u16,
    /// Header error check passed
    pub hec_valid: bool,
}

impl CellHeader {
    pub fn new(circuit: VcKey, hec_valid: bool) -> Self {
        Self {
            vpi: circuit.vpi,
            vci: circuit.vci,
            hec_valid,
        }
    }

    pub fn circuit(&self) -> VcKey {
        VcKey::new(self.vpi, self.vci)
    }
}

/// Cell payload: opaque content plus a derived suspicion score in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub content: String,
    pub suspicion: f64,
}

impl Payload {
    pub fn new(content: impl Into<String>, suspicion: f64) -> Self {
        Self {
            content: content.into(),
            suspicion,
        }
    }
}

/// Ground-truth label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Benign,
    Malicious,
}

impl Label {
    pub fn is_malicious(self) -> bool {
        matches!(self, Label::Malicious)
    }
}

/// One simulated request
///
/// # Example
/// ```
/// use atm_filter_sim::models::{Cell, CellHeader, Label, Payload, VcKey};
///
/// let cell = Cell::new(
///     0,
///     0.0,
///     CellHeader::new(VcKey::new(0, 10), true),
///     Payload::new("NORMALDATA", 0.1),
///     Label::Benign,
/// );
/// assert_eq!(cell.source(), VcKey::new(0, 10));
/// assert!(!cell.is_malicious());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    id: u64,
    timestamp: f64,
    header: CellHeader,
    payload: Payload,
    label: Label,
}

impl Cell {
    pub fn new(id: u64, timestamp: f64, header: CellHeader, payload: Payload, label: Label) -> Self {
        Self {
            id,
            timestamp,
            header,
            payload,
            label,
        }
    }

    /// Sequence id within the run
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Arrival time in simulated seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn header(&self) -> &CellHeader {
        &self.header
    }

    /// Source identity used by the policer
    pub fn source(&self) -> VcKey {
        self.header.circuit()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_malicious(&self) -> bool {
        self.label.is_malicious()
    }
}
