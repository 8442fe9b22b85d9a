//! Simulated time for a run
//!
//! Cells are emitted on a fixed grid of slots, one every `1 / rate` simulated
//! seconds. Slot times are computed from the slot index rather than by
//! repeated addition, so long runs do not accumulate floating-point drift.

use serde::{Deserialize, Serialize};

/// Emission schedule over simulated seconds
///
/// # Example
/// ```
/// use atm_filter_sim::SimClock;
///
/// let mut clock = SimClock::new(200.0, 5.0); // 200 cells/s for 5 s
/// assert_eq!(clock.next_slot(), Some(0.0));
/// assert_eq!(clock.next_slot(), Some(0.005));
/// assert_eq!(clock.emitted(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Emission rate (slots per simulated second)
    rate: f64,
    /// Run length in simulated seconds
    duration: f64,
    /// Slots handed out so far
    emitted: u64,
}

impl SimClock {
    /// Create a new clock
    ///
    /// # Panics
    /// Panics unless both `rate` and `duration` are positive.
    pub fn new(rate: f64, duration: f64) -> Self {
        assert!(rate > 0.0, "rate must be positive");
        assert!(duration > 0.0, "duration must be positive");
        Self {
            rate,
            duration,
            emitted: 0,
        }
    }

    /// Start time of the next slot (not yet handed out)
    pub fn peek(&self) -> f64 {
        self.emitted as f64 / self.rate
    }

    /// Hand out the next slot start time, or `None` once the duration has elapsed
    pub fn next_slot(&mut self) -> Option<f64> {
        let t = self.peek();
        if t >= self.duration {
            return None;
        }
        self.emitted += 1;
        Some(t)
    }

    /// True once no further slot fits inside the duration
    pub fn is_finished(&self) -> bool {
        self.peek() >= self.duration
    }

    /// Number of slots handed out
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Slot spacing in simulated seconds
    pub fn interval(&self) -> f64 {
        1.0 / self.rate
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}
