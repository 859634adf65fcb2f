//! Immutable value snapshots handed to consumers.
//!
//! Everything here is a deep copy: a consumer may keep, mutate or discard
//! a snapshot freely without touching simulator state. The shapes mirror
//! what map renderers and dashboards need per frame.

use gossim_bandit::ArmSnapshot;
use gossim_common::{DeliveryStatus, LogEvent, NodeId, RadioActivity, RadioKind, Tick};
use gossim_node::ReceivedMessage;
use gossim_packet::PacketKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-node view in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStateView {
    pub id: NodeId,
    pub true_lat: f64,
    pub true_lng: f64,
    pub est_lat: f64,
    pub est_lng: f64,
    pub pos_confidence: f64,
    /// Radio activity during the last tick.
    pub state: RadioActivity,
    /// Direct (one-hop) neighbors.
    pub neighbor_count: usize,
    /// All peers in the membership table, any hop distance.
    pub known_nodes: usize,
    pub label: String,
    pub trusted_peers: Vec<NodeId>,
    /// Labels learned through gossip, keyed by peer id.
    pub discovered_labels: BTreeMap<NodeId, String>,
    pub received_messages: Vec<ReceivedMessage>,
    /// Bandit arm statistics keyed `"frequency:recipient"`.
    pub bandit_stats: BTreeMap<String, ArmSnapshot>,
}

/// One transmission attempt, kept for a few ticks for visualisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transmission {
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_lat: f64,
    pub to_lng: f64,
    pub packet_type: PacketKind,
    pub status: DeliveryStatus,
    pub created_tick: Tick,
    pub channel: u8,
    pub is_malicious: bool,
    pub radio: RadioKind,
}

/// Aggregate counters since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimStats {
    pub tick: Tick,
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_dropped: u64,
    pub total_collisions: u64,
    /// Mean hop count over acknowledged deliveries.
    pub avg_hops: f64,
    /// `sum(known_nodes) / (N * (N - 1))`, clamped to `[0, 1]`.
    pub membership_coverage: f64,
}

/// The full immutable snapshot returned by `step()` / `get_state()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimState {
    pub tick: Tick,
    pub running: bool,
    pub speed: f64,
    pub node_states: Vec<NodeStateView>,
    pub transmissions: Vec<Transmission>,
    pub events: Vec<LogEvent>,
    pub stats: SimStats,
    /// Every tracking id acknowledged since the last reset.
    pub delivered_tracking_ids: Vec<String>,
}
