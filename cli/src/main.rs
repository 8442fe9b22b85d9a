//! ATM Filter Simulator CLI
//!
//! Runs one simulation and prints the final statistics.
//!
//! Usage:
//!   atm-filter-sim --duration 5 --rate 200 --malfrac 0.12 --seed 1
//!   atm-filter-sim --unseeded --progress
//!   atm-filter-sim --pipeline rules.json --json
//!
//! Logs go to stderr; set `RUST_LOG` (default `atm_filter_sim=info`).

use anyhow::{Context, Result};
use atm_filter_sim::{
    Driver, DriverConfig, DropReason, Event, EventLog, EventSink, PipelineConfig, ReportCadence, RunConfig,
    RunSummary,
};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "atm-filter-sim")]
#[command(about = "ATM Filter Simulator")]
struct Args {
    /// Duration in simulated seconds
    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    duration: f64,

    /// Cells per second
    #[arg(long, default_value_t = 200.0, allow_negative_numbers = true)]
    rate: f64,

    /// Malicious fraction (0..1)
    #[arg(long, default_value_t = 0.12, allow_negative_numbers = true)]
    malfrac: f64,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Ignore --seed and draw a fresh one
    #[arg(long)]
    unseeded: bool,

    /// JSON file with header/policer/payload rules
    #[arg(long)]
    pipeline: Option<PathBuf>,

    /// Simulated seconds between progress reports
    #[arg(long, default_value_t = 0.5)]
    report_interval: f64,

    /// Print progress reports as they arrive
    #[arg(long)]
    progress: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

/// Keeps every event and optionally echoes progress to stdout
struct ConsoleSink {
    log: EventLog,
    show_progress: bool,
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: Event) {
        if self.show_progress {
            if let Event::Progress { sim_time, stats, .. } = &event {
                println!(
                    "[t={:>7.3}s] total={:<6} forwarded={:<6} dropped={:<6} (header={} policer={} payload={})",
                    sim_time,
                    stats.total,
                    stats.forwarded,
                    stats.dropped,
                    stats.dropped_header,
                    stats.dropped_policer,
                    stats.dropped_payload
                );
            }
        }
        self.log.emit(event);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atm_filter_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let pipeline = match &args.pipeline {
        Some(path) => load_pipeline(path)?,
        None => PipelineConfig::default(),
    };

    let driver = Driver::new(DriverConfig {
        cadence: ReportCadence::SimulatedSeconds(args.report_interval),
        pipeline,
        ..DriverConfig::default()
    })
    .context("Invalid driver configuration")?;

    let config = RunConfig {
        duration: args.duration,
        rate: args.rate,
        mal_frac: args.malfrac,
        seed: if args.unseeded { None } else { Some(args.seed) },
    };

    tracing::debug!(?config, pipeline = ?args.pipeline, "starting simulation");

    let mut sink = ConsoleSink {
        log: EventLog::new(),
        show_progress: args.progress,
    };
    let summary = driver.start(config, &mut sink).context("Simulation failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let title = format!("ATM Filter Simulator (rate={}, mal={})", args.rate, args.malfrac);
        pretty_print_stats(&summary, &title)?;
        print_drops_by_reason(&summary);
    }

    Ok(())
}

fn load_pipeline(path: &Path) -> Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse pipeline config {}", path.display()))
}

/// Sorted `key : value` table of every summary field
fn pretty_print_stats(summary: &RunSummary, title: &str) -> Result<()> {
    let value = serde_json::to_value(summary)?;
    let mut rows: BTreeMap<String, String> = BTreeMap::new();
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map {
            rows.insert(k, v.to_string());
        }
    }
    let s = &summary.stats;
    rows.insert("malicious_total".to_string(), s.malicious_total().to_string());
    rows.insert("malicious_dropped".to_string(), s.malicious_dropped().to_string());
    rows.insert("malicious_forwarded".to_string(), s.malicious_forwarded().to_string());
    rows.insert("benign_total".to_string(), s.benign_total().to_string());
    rows.insert("benign_dropped".to_string(), s.benign_dropped().to_string());
    rows.insert("benign_forwarded".to_string(), s.benign_forwarded().to_string());

    println!();
    println!("{}", "=".repeat(40));
    println!("{}", title);
    println!("{}", "=".repeat(40));
    for (k, v) in &rows {
        println!("{:25} : {}", k, v);
    }
    println!("{}", "=".repeat(40));
    println!();
    Ok(())
}

/// Horizontal bar chart of drops per stage
fn print_drops_by_reason(summary: &RunSummary) {
    const WIDTH: u64 = 40;
    let counts: Vec<(DropReason, u64)> = DropReason::ALL
        .iter()
        .map(|&r| (r, summary.stats.dropped_by(r)))
        .collect();
    let max = counts.iter().map(|&(_, c)| c).max().unwrap_or(0);

    println!("Dropped cells by reason");
    for (reason, count) in counts {
        let len = if max == 0 { 0 } else { count * WIDTH / max };
        println!(
            "{:>16} | {:<width$} {}",
            format!("dropped_{}", reason),
            "#".repeat(len as usize),
            count,
            width = WIDTH as usize
        );
    }
}
