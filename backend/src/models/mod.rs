//! Domain models for the ATM filter simulator

pub mod cell;
pub mod decision;
pub mod event;

// Re-exports
pub use cell::{Cell, CellHeader, Label, Payload, VcKey};
pub use decision::{DropReason, FilterDecision, Outcome};
pub use event::{Event, EventLog, EventSink};
