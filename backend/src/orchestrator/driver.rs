//! Simulation driver
//!
//! Owns the run lifecycle and the reporting boundary:
//!
//! ```text
//!            start (valid)                 generator exhausted
//!   Idle ───────────────────► Running ───────────────────────► Finished
//!    ▲  start (invalid /          │ cancel / invariant violation
//!    │  already running):         ▼
//!    │  sim_error, no state      Stopped
//!    │  change
//!    └── Finished and Stopped accept the next start like Idle
//! ```
//!
//! At most one run is active per driver. Admission (validation plus the
//! concurrency check) is synchronous for both [`Driver::run`] and
//! [`Driver::spawn`]; a rejected start emits `sim_error` and never produces
//! progress or completion messages.

use crate::accounting::RunStatistics;
use crate::arrivals::TrafficProfile;
use crate::filter::PipelineConfig;
use crate::models::{Event, EventSink};
use crate::orchestrator::engine::{ConfigError, RunConfig, Simulation, SimulationError};
use crate::orchestrator::summary::RunSummary;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

/// When progress messages are emitted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCadence {
    /// Each time simulated time crosses a multiple of this many seconds
    SimulatedSeconds(f64),
    /// After every `n` accounted cells
    EveryCells(u64),
}

impl Default for ReportCadence {
    fn default() -> Self {
        ReportCadence::SimulatedSeconds(0.5)
    }
}

impl ReportCadence {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ReportCadence::SimulatedSeconds(s) if !(s.is_finite() && s > 0.0) => Err(
                ConfigError::InvalidCadence(format!("interval must be positive, got {}", s)),
            ),
            ReportCadence::EveryCells(0) => Err(ConfigError::InvalidCadence(
                "cell count must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Fixed configuration of a driver, shared by all its runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub cadence: ReportCadence,
    pub profile: TrafficProfile,
    pub pipeline: PipelineConfig,
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cadence.validate()?;
        self.profile.validate()?;
        self.pipeline.validate()
    }
}

/// Lifecycle state of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running { run_id: Uuid },
    Finished { run_id: Uuid },
    Stopped { run_id: Uuid, cancelled: bool },
}

impl DriverState {
    pub fn is_running(&self) -> bool {
        matches!(self, DriverState::Running { .. })
    }
}

/// Cooperative cancellation flag, checked between cells
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handle to a run executing on a background thread
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancelToken,
    join: JoinHandle<Result<RunSummary, SimulationError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation; takes effect at the next cell boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run and return its outcome
    pub fn join(self) -> Result<RunSummary, SimulationError> {
        self.join
            .join()
            .map_err(|_| SimulationError::Worker("simulation thread panicked".to_string()))?
    }
}

/// Drives simulations one at a time
///
/// # Example
///
/// ```rust
/// use atm_filter_sim::orchestrator::{Driver, RunConfig};
/// use atm_filter_sim::models::EventLog;
///
/// let driver = Driver::default();
/// let mut log = EventLog::new();
/// let config = RunConfig { duration: 1.0, rate: 50.0, mal_frac: 0.1, seed: Some(1) };
///
/// let summary = driver.start(config, &mut log).unwrap();
/// assert_eq!(summary.stats.total, 50);
/// assert_eq!(log.completion(), Some(&summary));
/// ```
pub struct Driver {
    config: DriverConfig,
    state: Arc<Mutex<DriverState>>,
}

impl Driver {
    /// Create a driver
    ///
    /// # Errors
    ///
    /// * `InvalidConfig` - cadence, traffic profile or pipeline rejected
    pub fn new(config: DriverConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(DriverState::Idle)),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    /// Run to completion on the calling thread with a fresh cancel token
    pub fn start(&self, config: RunConfig, sink: &mut dyn EventSink) -> Result<RunSummary, SimulationError> {
        self.run(config, sink, &CancelToken::new())
    }

    /// Run to completion (or cancellation) on the calling thread
    ///
    /// # Errors
    ///
    /// * `InvalidConfig` - rejected before running; only `sim_error` emitted
    /// * `ConcurrentRun` - another run is active; it is not affected
    /// * `InvariantViolation` - run terminated; `sim_error` emitted
    pub fn run(
        &self,
        config: RunConfig,
        sink: &mut dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<RunSummary, SimulationError> {
        let (sim, guard) = match self.admit(config) {
            Ok(admitted) => admitted,
            Err(e) => return Err(reject(sink, e)),
        };
        execute(sim, guard, self.config.cadence, sink, cancel)
    }

    /// Admit a run synchronously and execute it on a background thread
    pub fn spawn<S>(&self, config: RunConfig, sink: S) -> Result<RunHandle, SimulationError>
    where
        S: EventSink + Send + 'static,
    {
        let mut sink = sink;
        let (sim, guard) = match self.admit(config) {
            Ok(admitted) => admitted,
            Err(e) => return Err(reject(&mut sink, e)),
        };

        let run_id = sim.run_id();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let cadence = self.config.cadence;

        let join = thread::Builder::new()
            .name(format!("atm-sim-{}", run_id))
            .spawn(move || execute(sim, guard, cadence, &mut sink, &token))
            .map_err(|e| SimulationError::Worker(format!("failed to spawn simulation thread: {}", e)))?;

        Ok(RunHandle { run_id, cancel, join })
    }

    fn admit(&self, config: RunConfig) -> Result<(Simulation, RunGuard), SimulationError> {
        let mut state = self.state.lock();
        if state.is_running() {
            return Err(SimulationError::ConcurrentRun);
        }

        let sim = Simulation::new(config, self.config.profile.clone(), &self.config.pipeline)?;
        *state = DriverState::Running { run_id: sim.run_id() };

        let guard = RunGuard {
            state: Arc::clone(&self.state),
            run_id: sim.run_id(),
            settled: false,
        };
        Ok((sim, guard))
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            config: DriverConfig::default(),
            state: Arc::new(Mutex::new(DriverState::Idle)),
        }
    }
}

/// Leaves the driver admissible again however the run ends
struct RunGuard {
    state: Arc<Mutex<DriverState>>,
    run_id: Uuid,
    settled: bool,
}

impl RunGuard {
    fn settle(mut self, next: DriverState) {
        *self.state.lock() = next;
        self.settled = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.settled {
            *self.state.lock() = DriverState::Stopped {
                run_id: self.run_id,
                cancelled: false,
            };
        }
    }
}

/// Decides when the next progress message is due
struct ProgressSchedule {
    cadence: ReportCadence,
    reported: u64,
}

impl ProgressSchedule {
    fn new(cadence: ReportCadence) -> Self {
        Self { cadence, reported: 0 }
    }

    fn due(&mut self, stats: &RunStatistics, sim_time: f64) -> bool {
        match self.cadence {
            ReportCadence::SimulatedSeconds(interval) => {
                let crossed = (sim_time / interval).floor() as u64;
                if crossed > self.reported {
                    self.reported = crossed;
                    true
                } else {
                    false
                }
            }
            ReportCadence::EveryCells(n) => stats.total % n == 0,
        }
    }
}

fn reject<S: EventSink + ?Sized>(sink: &mut S, error: SimulationError) -> SimulationError {
    tracing::warn!(%error, "simulation start rejected");
    sink.emit(Event::Error {
        run_id: None,
        reason: error.to_string(),
    });
    error
}

fn fail<S: EventSink + ?Sized>(
    guard: RunGuard,
    sink: &mut S,
    error: SimulationError,
) -> SimulationError {
    let run_id = guard.run_id;
    tracing::error!(%run_id, %error, "simulation terminated");
    guard.settle(DriverState::Stopped {
        run_id,
        cancelled: false,
    });
    sink.emit(Event::Error {
        run_id: Some(run_id),
        reason: error.to_string(),
    });
    error
}

fn execute<S: EventSink + ?Sized>(
    mut sim: Simulation,
    guard: RunGuard,
    cadence: ReportCadence,
    sink: &mut S,
    cancel: &CancelToken,
) -> Result<RunSummary, SimulationError> {
    let run_id = sim.run_id();
    let config = *sim.config();
    tracing::info!(
        %run_id,
        duration = config.duration,
        rate = config.rate,
        mal_frac = config.mal_frac,
        seed = sim.seed(),
        "simulation started"
    );

    let mut schedule = ProgressSchedule::new(cadence);
    let mut cancelled = false;

    loop {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        match sim.step() {
            Ok(Some(step)) => {
                let stats = sim.statistics();
                if schedule.due(&stats, step.timestamp) {
                    if let Err(e) = stats.check_invariants() {
                        return Err(fail(guard, sink, e));
                    }
                    tracing::debug!(%run_id, sim_time = step.timestamp, total = stats.total, dropped = stats.dropped, "progress");
                    sink.emit(Event::Progress {
                        run_id,
                        sim_time: step.timestamp,
                        stats,
                    });
                }
            }
            Ok(None) => break,
            Err(e) => return Err(fail(guard, sink, e)),
        }
    }

    if let Err(e) = sim.check_invariants() {
        return Err(fail(guard, sink, e));
    }

    let summary = sim.summary(cancelled);
    if cancelled {
        tracing::warn!(%run_id, total = summary.stats.total, "simulation cancelled");
        guard.settle(DriverState::Stopped { run_id, cancelled: true });
    } else {
        tracing::info!(
            %run_id,
            total = summary.stats.total,
            dropped = summary.stats.dropped,
            fpr = summary.false_positive_rate,
            fnr = summary.false_negative_rate,
            "simulation finished"
        );
        guard.settle(DriverState::Finished { run_id });
    }

    sink.emit(Event::Completed {
        run_id,
        summary: summary.clone(),
    });
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventLog;

    #[test]
    fn test_cadence_validation() {
        assert!(ReportCadence::SimulatedSeconds(0.0).validate().is_err());
        assert!(ReportCadence::SimulatedSeconds(f64::NAN).validate().is_err());
        assert!(ReportCadence::EveryCells(0).validate().is_err());
        assert!(ReportCadence::EveryCells(10).validate().is_ok());
        assert!(ReportCadence::default().validate().is_ok());
    }

    #[test]
    fn test_driver_rejects_invalid_driver_config() {
        let config = DriverConfig {
            cadence: ReportCadence::EveryCells(0),
            ..DriverConfig::default()
        };
        assert!(Driver::new(config).is_err());
    }

    #[test]
    fn test_schedule_simulated_seconds() {
        let mut schedule = ProgressSchedule::new(ReportCadence::SimulatedSeconds(1.0));
        let stats = RunStatistics::default();
        assert!(!schedule.due(&stats, 0.2));
        assert!(schedule.due(&stats, 1.0));
        assert!(!schedule.due(&stats, 1.5));
        // Skipping several boundaries reports once
        assert!(schedule.due(&stats, 3.7));
        assert!(!schedule.due(&stats, 3.9));
    }

    #[test]
    fn test_schedule_every_cells() {
        let mut schedule = ProgressSchedule::new(ReportCadence::EveryCells(3));
        let due: Vec<bool> = (1..=6)
            .map(|total| {
                let stats = RunStatistics {
                    total,
                    ..RunStatistics::default()
                };
                schedule.due(&stats, 0.0)
            })
            .collect();
        assert_eq!(due, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_state_transitions() {
        let driver = Driver::default();
        assert_eq!(driver.state(), DriverState::Idle);

        let mut log = EventLog::new();
        let config = RunConfig {
            duration: 0.2,
            rate: 50.0,
            mal_frac: 0.5,
            seed: Some(3),
        };
        driver.start(config, &mut log).unwrap();
        assert!(matches!(driver.state(), DriverState::Finished { .. }));

        // Pre-cancelled run stops immediately with zero cells
        let token = CancelToken::new();
        token.cancel();
        let summary = driver.run(config, &mut log, &token).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.stats.total, 0);
        assert!(matches!(driver.state(), DriverState::Stopped { cancelled: true, .. }));
    }

    #[test]
    fn test_dropped_guard_stops_driver() {
        let driver = Driver::default();
        let (_sim, guard) = driver.admit(RunConfig::default()).unwrap();
        assert!(driver.is_running());
        drop(guard);
        assert!(matches!(driver.state(), DriverState::Stopped { cancelled: false, .. }));
    }
}
