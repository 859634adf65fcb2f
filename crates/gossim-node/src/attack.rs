//! Adversarial node variants.
//!
//! A malicious node runs the honest protocol step first, then its attack.
//! The attack is a tagged variant with per-strategy state rather than a
//! subtype, so the simulator stores one node type and dispatches on the
//! tag after the shared step.

use gossim_common::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Label prefix marking a sensor definition as malicious.
pub const MAL_LABEL_PREFIX: &str = "[MAL]";

/// Default probability with which a selective dropper discards a targeted
/// packet.
pub const DEFAULT_DROP_PROBABILITY: f64 = 0.8;

/// Default attack intensity.
pub const DEFAULT_INTENSITY: f64 = 0.5;

/// Base of the id range sybil identities are minted from.
pub const SYBIL_ID_BASE: u32 = 10_000;

/// Attack strategy of a malicious node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackStrategy {
    /// Floods the channel with junk broadcasts every tick.
    Jammer,
    /// Occasionally fabricates a heartbeat with a false, fully confident
    /// position.
    Liar,
    /// Mints fake identities that gossip from jittered positions.
    Sybil,
    /// Forwards nothing: silently discards every relayed packet.
    Blackhole,
    /// Probabilistically drops packets from targeted sources.
    Selective,
}

impl AttackStrategy {
    /// Parse a strategy name (as it appears after the `[MAL]` label
    /// prefix or in a scenario file).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jammer" => Some(AttackStrategy::Jammer),
            "liar" => Some(AttackStrategy::Liar),
            "sybil" => Some(AttackStrategy::Sybil),
            "blackhole" => Some(AttackStrategy::Blackhole),
            "selective" => Some(AttackStrategy::Selective),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            AttackStrategy::Jammer => "jammer",
            AttackStrategy::Liar => "liar",
            AttackStrategy::Sybil => "sybil",
            AttackStrategy::Blackhole => "blackhole",
            AttackStrategy::Selective => "selective",
        }
    }

    /// Extract a strategy from a `[MAL]`-prefixed label, e.g.
    /// `"[MAL] sybil East Gate"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let rest = label.strip_prefix(MAL_LABEL_PREFIX)?.trim_start();
        let name = rest.split_whitespace().next()?;
        Self::parse(name)
    }
}

/// Per-strategy attack state carried by a malicious node.
#[derive(Debug, Clone)]
pub struct AttackState {
    pub strategy: AttackStrategy,
    /// Scales attack aggressiveness in `[0, 1]`.
    pub intensity: f64,
    /// Sources a selective dropper discards.
    pub target_node_ids: BTreeSet<NodeId>,
    /// Drop probability of the selective strategy.
    pub drop_probability: f64,
    /// Fake identities minted by a sybil node (empty until first step).
    pub sybil_ids: Vec<NodeId>,
}

impl AttackState {
    pub fn new(strategy: AttackStrategy) -> Self {
        AttackState {
            strategy,
            intensity: DEFAULT_INTENSITY,
            target_node_ids: BTreeSet::new(),
            drop_probability: DEFAULT_DROP_PROBABILITY,
            sybil_ids: Vec::new(),
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Mint this node's sybil identities (idempotent).
    ///
    /// `floor(intensity * 5) + 1` ids from `SYBIL_ID_BASE + owner * 100`
    /// upward, so ranges of different owners never collide.
    pub fn mint_sybil_ids(&mut self, owner: NodeId) -> &[NodeId] {
        if self.sybil_ids.is_empty() {
            let count = (self.intensity * 5.0).floor() as u32 + 1;
            let base = SYBIL_ID_BASE + owner.0 * 100;
            self.sybil_ids = (0..count).map(|i| NodeId::new(base + i)).collect();
        }
        &self.sybil_ids
    }
}
