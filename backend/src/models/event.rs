//! Messages produced by a run, and the sink they are delivered to.
//!
//! The driver never talks to a transport directly. It hands [`Event`]s to an
//! [`EventSink`]; whatever sits behind the sink (a websocket bridge, a Python
//! callback, a terminal printer, a test log) is invisible to the engine.
//!
//! # Event Types
//!
//! Serialized with a `type` tag using the names the live-update transport
//! expects:
//! - **sim_update**: periodic progress with the running counters
//! - **sim_done**: the final summary, emitted exactly once per admitted run
//! - **sim_error**: a rejected start or a run terminated by an error
//!
//! # Example
//!
//! ```rust
//! use atm_filter_sim::models::{Event, EventLog, EventSink};
//!
//! let mut log = EventLog::new();
//! log.emit(Event::Error {
//!     run_id: None,
//!     reason: "Simulation already running".to_string(),
//! });
//!
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.events()[0].event_type(), "sim_error");
//! ```

use crate::accounting::RunStatistics;
use crate::orchestrator::RunSummary;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use uuid::Uuid;

/// Message emitted by the driver towards the reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Running totals at a reporting boundary
    #[serde(rename = "sim_update")]
    Progress {
        run_id: Uuid,
        /// Simulated time of the last accounted cell
        sim_time: f64,
        #[serde(flatten)]
        stats: RunStatistics,
    },

    /// Final statistics, including derived rates
    #[serde(rename = "sim_done")]
    Completed {
        run_id: Uuid,
        #[serde(flatten)]
        summary: RunSummary,
    },

    /// Start rejected or run failed
    #[serde(rename = "sim_error")]
    Error {
        /// `None` when the run was never admitted
        run_id: Option<Uuid>,
        reason: String,
    },
}

impl Event {
    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Progress { .. } => "sim_update",
            Event::Completed { .. } => "sim_done",
            Event::Error { .. } => "sim_error",
        }
    }

    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Event::Progress { run_id, .. } | Event::Completed { run_id, .. } => Some(*run_id),
            Event::Error { run_id, .. } => *run_id,
        }
    }
}

/// Receiver side of the driver's reporting boundary.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Sender<Event> {
    fn emit(&mut self, event: Event) {
        if let Err(e) = self.send(event) {
            tracing::warn!(event = e.0.event_type(), "event receiver disconnected; message discarded");
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: Event) {
        (**self).emit(event)
    }
}

/// In-memory sink keeping every event in emission order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific wire type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Statistics carried by every progress event, in order
    pub fn progress(&self) -> Vec<&RunStatistics> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Progress { stats, .. } => Some(stats),
                _ => None,
            })
            .collect()
    }

    /// The completion summary, if one was emitted
    pub fn completion(&self) -> Option<&RunSummary> {
        self.events.iter().find_map(|e| match e {
            Event::Completed { summary, .. } => Some(summary),
            _ => None,
        })
    }

    /// Reasons of all error events
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Error { reason, .. } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
