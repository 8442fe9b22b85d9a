//! Orchestrator - run lifecycle
//!
//! - `engine.rs`: one run (generator → pipeline → accountant), configuration
//!   and error types
//! - `driver.rs`: state machine, reporting cadence, cancellation
//! - `summary.rs`: final summary and configuration fingerprint

pub mod driver;
pub mod engine;
pub mod summary;

// Re-export main types for convenience
pub use driver::{CancelToken, Driver, DriverConfig, DriverState, ReportCadence, RunHandle};
pub use engine::{ConfigError, RunConfig, Simulation, SimulationError, StepResult};
pub use summary::{compute_config_hash, RunSummary};
