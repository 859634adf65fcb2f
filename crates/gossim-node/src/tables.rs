//! Table entry types kept by a node.

use gossim_common::{DeliveryStatus, NodeId, PacketId, Tick};
use serde::Serialize;

/// What a node believes about one peer, refreshed by gossip.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEntry {
    pub node_id: NodeId,
    /// Highest heartbeat sequence number seen for this peer.
    pub sequence_num: u32,
    /// Hop distance, at least 1 (1 = heard directly).
    pub hops_away: u32,
    pub last_seen_tick: Tick,
    /// RSSI of the packet that carried this entry.
    pub rssi: f64,
    pub lat: f64,
    pub lng: f64,
    pub pos_confidence: f64,
    /// The direct neighbor this entry was learned through (gradient
    /// fallback for routing).
    pub via_node: NodeId,
    pub label: String,
}

impl NeighborEntry {
    /// Freshness-based update rule: a new sighting wins on a higher
    /// sequence number, or on fewer hops at the same sequence number.
    pub fn supersedes(&self, newer_seq: u32, newer_hops: u32) -> bool {
        newer_seq > self.sequence_num
            || (newer_seq == self.sequence_num && newer_hops < self.hops_away)
    }
}

/// One FTM distance measurement to a peer whose surveyed position came
/// with the exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FtmReading {
    pub distance_m: f64,
    pub lat: f64,
    pub lng: f64,
    pub tick: Tick,
}

/// A sent packet awaiting its acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMessage {
    pub dest_id: NodeId,
    /// Bandit arm recipient. For broadcasts this is the broadcast
    /// sentinel and is resolved to the acking peer on receipt.
    pub recipient_id: NodeId,
    pub sent_tick: Tick,
    pub frequency: u8,
}

/// Delivered user message, kept for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedMessage {
    pub from_node_id: NodeId,
    pub text: String,
    pub hop_count: u32,
    pub tick: Tick,
}

/// Display status of a message this node originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentStatus {
    Sent,
    Delivered,
    Failed,
}

impl SentStatus {
    fn rank(self) -> u8 {
        match self {
            SentStatus::Sent => 0,
            SentStatus::Failed => 1,
            SentStatus::Delivered => 2,
        }
    }
}

/// A user message this node originated, kept for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentMessage {
    pub packet_id: PacketId,
    pub to_node_id: NodeId,
    pub text: String,
    pub tick: Tick,
    pub status: SentStatus,
}

impl SentMessage {
    /// Status only ever upgrades (sent -> failed -> delivered), so a
    /// collision report at one receiver cannot demote a confirmed
    /// delivery.
    pub fn upgrade(&mut self, status: SentStatus) {
        if status.rank() > self.status.rank() {
            self.status = status;
        }
    }

    /// Map a physical per-receiver outcome onto a display status.
    pub fn status_for(delivery: DeliveryStatus) -> Option<SentStatus> {
        match delivery {
            DeliveryStatus::Ok | DeliveryStatus::Captured => None,
            DeliveryStatus::Collision | DeliveryStatus::Jammed => Some(SentStatus::Failed),
        }
    }
}
