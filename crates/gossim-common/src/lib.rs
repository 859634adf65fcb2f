//! Common types and traits for the Gossim mesh simulator.
//!
//! This crate holds the identifiers, shared enums, event-log types and
//! compile-time tunables used by every other crate in the workspace. It has
//! no simulation logic of its own.

pub mod events;
pub mod tunables;

pub use events::{LogEvent, LogLevel};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a node in the mesh.
///
/// Plain non-negative integer. [`NodeId::BROADCAST`] is a reserved sentinel
/// used as the destination / next hop of broadcast packets; it never
/// identifies a real node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Reserved broadcast sentinel.
    pub const BROADCAST: NodeId = NodeId(u32::MAX);

    /// Create a new node id.
    pub const fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// True if this is the broadcast sentinel.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "broadcast")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identifier of a packet.
///
/// Packet ids are unique per source node: the high 32 bits carry the source
/// node id, the low 32 bits a per-source counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u64);

impl PacketId {
    /// Compose a packet id from the originating node and its send counter.
    pub const fn compose(source: NodeId, counter: u32) -> Self {
        PacketId(((source.0 as u64) << 32) | counter as u64)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0 >> 32, self.0 & 0xffff_ffff)
    }
}

/// Simulation tick counter. One tick is one atomic `step()` of the simulator.
pub type Tick = u64;

// ============================================================================
// Shared enums
// ============================================================================

/// Physical radio a packet is sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioKind {
    /// Long-range, low-rate radio (450 m modelled range).
    LoRa,
    /// Short-range radio used for direct neighbors (100 m modelled range).
    #[serde(rename = "BLE")]
    Ble,
}

impl RadioKind {
    /// Modelled maximum propagation range in meters.
    pub fn range_m(&self) -> f64 {
        match self {
            RadioKind::LoRa => tunables::RADIO_RANGE_M,
            RadioKind::Ble => tunables::BLE_RANGE_M,
        }
    }

    /// Label used in snapshots and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RadioKind::LoRa => "LoRa",
            RadioKind::Ble => "BLE",
        }
    }
}

/// Radio activity of a node within the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioActivity {
    /// Neither transmitting nor receiving.
    Idle,
    /// Transmitting this tick (half-duplex: cannot receive).
    Tx,
    /// Received a packet this tick.
    Rx,
}

/// Outcome of a packet arriving at one receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Sole candidate at the receiver, decoded cleanly.
    Ok,
    /// Won contention by at least the capture threshold.
    Captured,
    /// Lost contention (or tied below the capture threshold).
    Collision,
    /// Drowned by noise or jamming (SNR below zero).
    Jammed,
}

impl DeliveryStatus {
    /// True if the packet was actually handed to the receiver.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Ok | DeliveryStatus::Captured)
    }

    /// Label used in snapshots and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryStatus::Ok => "ok",
            DeliveryStatus::Captured => "captured",
            DeliveryStatus::Collision => "collision",
            DeliveryStatus::Jammed => "jammed",
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the simulator's fallible control operations.
///
/// Nothing here is fatal: the lenient control surface swallows these and
/// reports them through the event log, but the `try_` variants hand them
/// to embedding code that wants to know.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_sentinel() {
        assert!(NodeId::BROADCAST.is_broadcast());
        assert!(!NodeId::new(0).is_broadcast());
        assert_eq!(format!("{}", NodeId::BROADCAST), "broadcast");
    }

    #[test]
    fn test_packet_id_compose() {
        let id = PacketId::compose(NodeId::new(7), 42);
        assert_eq!(format!("{}", id), "7-42");
        // Unique per source: same counter, different node
        assert_ne!(id, PacketId::compose(NodeId::new(8), 42));
    }

    #[test]
    fn test_delivery_status_delivered() {
        assert!(DeliveryStatus::Ok.is_delivered());
        assert!(DeliveryStatus::Captured.is_delivered());
        assert!(!DeliveryStatus::Collision.is_delivered());
        assert!(!DeliveryStatus::Jammed.is_delivered());
    }
}
