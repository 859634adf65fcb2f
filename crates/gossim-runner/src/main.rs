//! Gossim CLI runner.
//!
//! Runs a scenario headless (as fast as possible) or paced against the
//! wall clock, prints the final statistics, and can write a JSON run
//! report with the closing snapshot for downstream tooling.

mod pacing;
mod scenario;

use chrono::Utc;
use clap::{Parser, Subcommand};
use gossim_sim::{SimState, Simulator};
use pacing::TickPacer;
use scenario::Scenario;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gossim", about = "Deterministic LoRa/BLE mesh testbed simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario to completion.
    Run {
        /// Scenario YAML file.
        #[arg(long, conflicts_with = "random")]
        scenario: Option<PathBuf>,

        /// Generate a random topology of this many nodes instead.
        #[arg(long)]
        random: Option<u32>,

        /// Override the scenario's tick count.
        #[arg(long)]
        ticks: Option<u64>,

        /// Seed for the simulator and topology generation.
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Pace ticks against the wall clock instead of free-running.
        #[arg(long)]
        realtime: bool,

        /// Speed multiplier for real-time pacing.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Write a JSON run report with the final snapshot.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Generate a random scenario file.
    Generate {
        /// Number of nodes.
        #[arg(long, default_value_t = 10)]
        nodes: u32,

        /// Topology seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Output path.
        #[arg(long)]
        out: PathBuf,
    },
}

/// JSON run report written by `--report`.
#[derive(Serialize)]
struct RunReport {
    generated_at: chrono::DateTime<Utc>,
    scenario: String,
    seed: u64,
    ticks_run: u64,
    final_state: SimState,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    gossim_metrics::describe_metrics();

    match Cli::parse().command {
        Command::Run {
            scenario,
            random,
            ticks,
            seed,
            realtime,
            speed,
            report,
        } => {
            let loaded = match (&scenario, random) {
                (Some(path), _) => Scenario::load(path)?,
                (None, Some(nodes)) => Scenario::generate(nodes, seed),
                (None, None) => Scenario::generate(10, seed),
            };
            run_scenario(loaded, ticks, seed, realtime, speed, report)
        }
        Command::Generate { nodes, seed, out } => {
            let scenario = Scenario::generate(nodes, seed);
            std::fs::write(&out, serde_yaml::to_string(&scenario)?)?;
            info!(path = %out.display(), nodes, seed, "scenario written");
            Ok(())
        }
    }
}

fn run_scenario(
    scenario: Scenario,
    ticks_override: Option<u64>,
    seed: u64,
    realtime: bool,
    speed: f64,
    report_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = scenario.name.clone().unwrap_or_else(|| "unnamed".to_string());
    let ticks = ticks_override.unwrap_or(scenario.ticks);
    let mut sim = scenario.build(seed as u32);
    sim.set_running(true);
    sim.set_speed(speed);

    info!(%name, nodes = sim.node_count(), ticks, realtime, "starting run");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    let mut pacer = realtime.then(|| TickPacer::new(speed));
    let mut state = sim.get_state();
    let mut ticks_run = 0;
    for tick in 1..=ticks {
        if interrupted.load(Ordering::SeqCst) {
            warn!(tick, "interrupted, stopping early");
            break;
        }
        for send in scenario.sends_at(tick) {
            sim.send_message(
                send.from.into(),
                send.to.into(),
                &send.payload,
                send.tracking_id.as_deref(),
            );
        }
        state = sim.step();
        ticks_run = tick;
        if let Some(pacer) = pacer.as_mut() {
            pacer.wait();
        }
    }
    sim.set_running(false);

    print_summary(&state);

    if let Some(path) = report_path {
        let report = RunReport {
            generated_at: Utc::now(),
            scenario: name,
            seed,
            ticks_run,
            final_state: sim.get_state(),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        info!(path = %path.display(), "run report written");
    }
    Ok(())
}

fn print_summary(state: &SimState) {
    let s = &state.stats;
    println!("tick {:>6}", s.tick);
    println!("  sent        {:>8}", s.total_sent);
    println!("  delivered   {:>8}", s.total_delivered);
    println!("  dropped     {:>8}", s.total_dropped);
    println!("  collisions  {:>8}", s.total_collisions);
    println!("  avg hops    {:>8.2}", s.avg_hops);
    println!("  coverage    {:>8.1}%", s.membership_coverage * 100.0);
    if !state.delivered_tracking_ids.is_empty() {
        println!("  tracked deliveries: {}", state.delivered_tracking_ids.join(", "));
    }
    for node in &state.node_states {
        println!(
            "  node {:>4} [{}] known={} neighbors={} conf={:.2}",
            node.id, node.label, node.known_nodes, node.neighbor_count, node.pos_confidence
        );
    }
}
