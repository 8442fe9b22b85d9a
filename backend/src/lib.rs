//! ATM Filter Simulator - Rust Engine
//!
//! Simulates request cells flowing from teller terminals to a banking network,
//! filters them through a three-stage pipeline and measures how well the
//! filter separates benign from malicious traffic.
//!
//! # Architecture
//!
//! - **core**: Simulated emission clock
//! - **rng**: Deterministic random number generation
//! - **models**: Domain types (Cell, FilterDecision, Event)
//! - **arrivals**: Cell generator with ground-truth labels
//! - **filter**: Header check, policer, payload inspection
//! - **accounting**: Confusion counts and false positive/negative rates
//! - **orchestrator**: Single-run engine and the driver state machine
//!
//! # Critical Invariants
//!
//! 1. `total == forwarded + dropped == TP + TN + FP + FN` at every snapshot
//! 2. All randomness is deterministic given the effective seed
//! 3. Per-circuit policing state lives exactly as long as one run
//! 4. The engine only talks to the outside world through `EventSink`

// Module declarations
pub mod accounting;
pub mod arrivals;
pub mod core;
pub mod filter;
pub mod models;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use accounting::{Accountant, Classification, RunStatistics};
pub use arrivals::{CellGenerator, TrafficProfile};
pub use core::time::SimClock;
pub use filter::{FilterPipeline, PipelineConfig};
pub use models::{
    cell::{Cell, CellHeader, Label, Payload, VcKey},
    decision::{DropReason, FilterDecision, Outcome},
    event::{Event, EventLog, EventSink},
};
pub use orchestrator::{
    CancelToken, ConfigError, Driver, DriverConfig, DriverState, ReportCadence, RunConfig, RunHandle,
    RunSummary, Simulation, SimulationError,
};
pub use rng::RngManager;

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn atm_filter_sim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::driver::PyDriver>()?;
    Ok(())
}
