//! Scenario loading and generation.
//!
//! A scenario is a YAML file describing the sensor population plus the
//! optional environment (jammers), trust graph and scripted user traffic:
//!
//! ```yaml
//! name: blackhole-line
//! ticks: 200
//! sensors:
//!   - { id: 1, lat: 0.0, lng: 0.0, label: source }
//!   - { id: 2, lat: 0.003, lng: 0.0, label: relay, attack: blackhole }
//!   - { id: 3, lat: 0.006, lng: 0.0, label: dest, anchor: true }
//! trust:
//!   - { a: 1, b: 2 }
//! sends:
//!   - { tick: 80, from: 1, to: 3, payload: hello, tracking_id: t1 }
//! ```

use gossim_node::AttackStrategy;
use gossim_sim::{NodeConfig, Simulator};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default run length when the scenario does not specify one.
const DEFAULT_TICKS: u64 = 600;

/// Errors from scenario loading.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("scenario has no sensors")]
    NoSensors,
}

/// One sensor in the scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSpec {
    pub id: u32,
    pub lat: f64,
    pub lng: f64,
    pub label: String,
    #[serde(default)]
    pub anchor: bool,
    /// Explicit attack strategy; a `[MAL]` label prefix works as well.
    #[serde(default)]
    pub attack: Option<AttackStrategy>,
}

impl SensorSpec {
    fn to_config(&self) -> NodeConfig {
        let mut config = NodeConfig::new(self.id, self.lat, self.lng, self.label.clone());
        if self.anchor {
            config = config.anchor();
        }
        if let Some(strategy) = self.attack {
            config = config.with_attack(strategy);
        }
        config
    }
}

/// A stationary jammer installed before the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JammerSpec {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    pub power_dbm: f64,
    #[serde(default)]
    pub channels: Vec<u8>,
}

/// A bidirectional trust edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrustEdge {
    pub a: u32,
    pub b: u32,
}

/// A scripted user message, fired just before the given tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedSend {
    pub tick: u64,
    pub from: u32,
    pub to: u32,
    pub payload: String,
    #[serde(default)]
    pub tracking_id: Option<String>,
}

/// A full scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    pub sensors: Vec<SensorSpec>,
    #[serde(default)]
    pub jammers: Vec<JammerSpec>,
    #[serde(default)]
    pub trust: Vec<TrustEdge>,
    #[serde(default)]
    pub trusted_only_routing: bool,
    #[serde(default)]
    pub sends: Vec<ScriptedSend>,
}

fn default_ticks() -> u64 {
    DEFAULT_TICKS
}

impl Scenario {
    /// Load a scenario from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_yaml::from_str(&text)?;
        if scenario.sensors.is_empty() {
            return Err(ScenarioError::NoSensors);
        }
        Ok(scenario)
    }

    /// Build the simulator and apply the pre-run configuration.
    pub fn build(&self, seed: u32) -> Simulator {
        let sensors = self.sensors.iter().map(|s| s.to_config()).collect();
        let mut sim = Simulator::with_seed(sensors, seed);
        for j in &self.jammers {
            sim.add_jammer(j.lat, j.lng, j.radius_m, j.power_dbm, j.channels.clone());
        }
        for edge in &self.trust {
            sim.establish_trust(edge.a.into(), edge.b.into());
        }
        if self.trusted_only_routing {
            sim.set_trusted_only_routing(true);
        }
        sim
    }

    /// Scripted sends due at `tick`.
    pub fn sends_at(&self, tick: u64) -> impl Iterator<Item = &ScriptedSend> {
        self.sends.iter().filter(move |s| s.tick == tick)
    }

    /// Synthesise a random connected-ish scenario: `nodes` sensors placed
    /// uniformly in a bounding box a few radio ranges across, with the
    /// first fifth promoted to anchors.
    pub fn generate(nodes: u32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let anchors = (nodes as usize).div_ceil(5);
        let span = 0.004; // ~450 m of latitude, one radio range
        let sensors = (0..nodes)
            .map(|i| SensorSpec {
                id: i,
                lat: rng.gen_range(0.0..span),
                lng: rng.gen_range(0.0..span),
                label: format!("node-{i}"),
                anchor: (i as usize) < anchors,
                attack: None,
            })
            .collect();
        Scenario {
            name: Some(format!("random-{nodes}-seed-{seed}")),
            ticks: DEFAULT_TICKS,
            sensors,
            jammers: Vec::new(),
            trust: Vec::new(),
            trusted_only_routing: false,
            sends: Vec::new(),
        }
    }
}
