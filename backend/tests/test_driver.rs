//! Driver lifecycle: progress cadence, admission, cancellation

use atm_filter_sim::{
    CancelToken, ConfigError, Driver, DriverConfig, DriverState, Event, EventLog, EventSink, ReportCadence, RunConfig,
    SimulationError,
};
use std::sync::mpsc;

fn config(seed: u64) -> RunConfig {
    RunConfig {
        duration: 5.0,
        rate: 200.0,
        mal_frac: 0.12,
        seed: Some(seed),
    }
}

fn long_config() -> RunConfig {
    RunConfig {
        duration: 1.0e6,
        rate: 1000.0,
        mal_frac: 0.12,
        seed: Some(3),
    }
}

/// Cancels the run as soon as the first progress message arrives
struct CancelOnProgress {
    token: CancelToken,
    log: EventLog,
}

impl EventSink for CancelOnProgress {
    fn emit(&mut self, event: Event) {
        if matches!(event, Event::Progress { .. }) {
            self.token.cancel();
        }
        self.log.emit(event);
    }
}

#[test]
fn test_progress_every_half_simulated_second() {
    let driver = Driver::default();
    let mut log = EventLog::new();
    let summary = driver.start(config(42), &mut log).unwrap();

    let progress = log.progress();
    assert_eq!(progress.len(), 9);
    for stats in &progress {
        assert!(stats.check_invariants().is_ok());
    }
    for pair in progress.windows(2) {
        assert!(pair[0].total < pair[1].total);
    }

    assert_eq!(log.events_of_type("sim_done").len(), 1);
    assert_eq!(log.events().last().map(|e| e.event_type()), Some("sim_done"));
    assert_eq!(summary.stats.total, 1000);
    assert!(!summary.cancelled);
    assert_eq!(log.completion(), Some(&summary));
}

#[test]
fn test_progress_every_n_cells() {
    let driver = Driver::new(DriverConfig {
        cadence: ReportCadence::EveryCells(100),
        ..DriverConfig::default()
    })
    .unwrap();
    let mut log = EventLog::new();
    driver.start(config(42), &mut log).unwrap();

    let totals: Vec<u64> = log.progress().iter().map(|s| s.total).collect();
    assert_eq!(totals, (1..=10).map(|i| i * 100).collect::<Vec<_>>());
}

#[test]
fn test_all_events_carry_run_id() {
    let driver = Driver::default();
    let mut log = EventLog::new();
    driver.start(config(8), &mut log).unwrap();

    let run_id = match driver.state() {
        DriverState::Finished { run_id } => run_id,
        other => panic!("unexpected state {:?}", other),
    };
    assert!(log.events().iter().all(|e| e.run_id() == Some(run_id)));
}

#[test]
fn test_invalid_start_leaves_driver_idle() {
    let driver = Driver::default();
    let mut log = EventLog::new();
    let result = driver.start(
        RunConfig {
            duration: -1.0,
            ..config(1)
        },
        &mut log,
    );

    assert_eq!(
        result,
        Err(SimulationError::InvalidConfig(ConfigError::NonPositiveDuration(-1.0)))
    );
    assert_eq!(log.len(), 1);
    assert_eq!(log.errors().len(), 1);
    assert!(log.progress().is_empty());
    assert!(log.completion().is_none());
    assert_eq!(driver.state(), DriverState::Idle);
}

#[test]
fn test_second_start_rejected_while_running() {
    let driver = Driver::default();
    let (tx, rx) = mpsc::channel();
    let handle = driver.spawn(long_config(), tx).unwrap();
    assert!(driver.is_running());

    let mut log = EventLog::new();
    let err = driver.start(config(1), &mut log).unwrap_err();
    assert_eq!(err, SimulationError::ConcurrentRun);
    assert_eq!(log.errors(), vec!["Simulation already running"]);
    assert!(log.completion().is_none());

    // The first run is unaffected
    assert_eq!(driver.state(), DriverState::Running { run_id: handle.run_id() });

    let run_id = handle.run_id();
    handle.cancel();
    let summary = handle.join().unwrap();
    assert!(summary.cancelled);
    assert!(summary.stats.total < 1_000_000_000);
    assert_eq!(
        driver.state(),
        DriverState::Stopped {
            run_id,
            cancelled: true
        }
    );

    let events: Vec<Event> = rx.iter().collect();
    assert_eq!(events.last().map(|e| e.event_type()), Some("sim_done"));
    assert!(events.iter().all(|e| e.event_type() != "sim_error"));

    // A stopped driver accepts the next run
    let mut log = EventLog::new();
    let summary = driver.start(config(1), &mut log).unwrap();
    assert_eq!(summary.stats.total, 1000);
}

#[test]
fn test_cancel_takes_effect_at_next_cell_boundary() {
    let driver = Driver::default();
    let token = CancelToken::new();
    let mut sink = CancelOnProgress {
        token: token.clone(),
        log: EventLog::new(),
    };

    let summary = driver.run(config(42), &mut sink, &token).unwrap();

    // First progress fires on the cell stamped 0.5 s (id 100)
    assert_eq!(summary.stats.total, 101);
    assert!(summary.cancelled);
    assert_eq!(sink.log.progress().len(), 1);
    assert_eq!(sink.log.completion(), Some(&summary));
    assert!(summary.stats.check_invariants().is_ok());
}

#[test]
fn test_pre_cancelled_run_processes_nothing() {
    let driver = Driver::default();
    let token = CancelToken::new();
    token.cancel();
    let mut log = EventLog::new();

    let summary = driver.run(config(1), &mut log, &token).unwrap();
    assert_eq!(summary.stats.total, 0);
    assert!(summary.cancelled);
    assert_eq!(log.len(), 1);
}

#[test]
fn test_finished_driver_accepts_next_run() {
    let driver = Driver::default();
    let mut log = EventLog::new();
    let first = driver.start(config(5), &mut log).unwrap();
    assert!(matches!(driver.state(), DriverState::Finished { .. }));

    let second = driver.start(config(5), &mut log).unwrap();
    assert_eq!(first.stats, second.stats);
    assert_eq!(log.events_of_type("sim_done").len(), 2);
}

#[test]
fn test_spawned_run_reports_through_channel() {
    let driver = Driver::default();
    let (tx, rx) = mpsc::channel();
    let handle = driver.spawn(config(9), tx).unwrap();
    let summary = handle.join().unwrap();

    let events: Vec<Event> = rx.iter().collect();
    assert_eq!(events.len(), 10);
    match events.last() {
        Some(Event::Completed { summary: done, .. }) => assert_eq!(done, &summary),
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(matches!(driver.state(), DriverState::Finished { .. }));
}

#[test]
fn test_event_wire_format() {
    let driver = Driver::default();
    let mut log = EventLog::new();
    driver.start(config(2), &mut log).unwrap();

    let update = serde_json::to_value(&log.events()[0]).unwrap();
    assert_eq!(update["type"], "sim_update");
    assert!(update["total"].is_u64());
    assert!(update["dropped_policer"].is_u64());

    let done = serde_json::to_value(log.events().last().unwrap()).unwrap();
    assert_eq!(done["type"], "sim_done");
    assert_eq!(done["total"], 1000);
    assert_eq!(done["seed"], 2);
    assert!(done["false_positive_rate"].is_f64());

    let mut errors = EventLog::new();
    let _ = driver.start(
        RunConfig {
            rate: 0.0,
            ..config(2)
        },
        &mut errors,
    );
    let error = serde_json::to_value(&errors.events()[0]).unwrap();
    assert_eq!(error["type"], "sim_error");
    assert!(error["reason"].as_str().unwrap().contains("rate"));
}
