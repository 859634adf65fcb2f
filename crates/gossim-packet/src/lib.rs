//! Packet model and payload codec for the Gossim mesh.
//!
//! Packets carry their payload as text with sentinel prefixes, so any
//! consumer can eyeball the traffic:
//!
//! | Sentinel | Meaning |
//! |----------|---------|
//! | `[GOSSIP]` + JSON array | membership heartbeat, list of [`GossipEntry`] |
//! | `ACK:<packet id>` | acknowledgement of an earlier packet |
//! | `[trk:<id>]` prefix | tracking tag echoed through the ACK path |
//!
//! The codec lives in [`codec`]; this module holds the value types and the
//! duplicate-suppression window.

pub mod codec;

use gossim_common::{NodeId, PacketId, RadioKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of a packet on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PacketKind {
    Data,
    Ack,
}

impl PacketKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            PacketKind::Data => "DATA",
            PacketKind::Ack => "ACK",
        }
    }
}

/// A packet in flight.
///
/// `ttl` and `hop_count` are unsigned by construction; `next_hop` is either
/// [`NodeId::BROADCAST`] or a node the sender knows about. `origin_lat` /
/// `origin_lng` carry the sender's *estimated* position so receivers can
/// run geographic routing against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub kind: PacketKind,
    pub source_id: NodeId,
    pub dest_id: NodeId,
    pub next_hop: NodeId,
    pub ttl: u8,
    pub hop_count: u32,
    pub payload: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub radio: RadioKind,
}

impl Packet {
    /// True if the payload is a gossip heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.kind == PacketKind::Data && codec::is_gossip(&self.payload)
    }
}

/// One gossip entry: what a node claims to know about a peer (or itself).
///
/// `pos_confidence` is 1.0 exactly when the entry's node is an anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipEntry {
    pub node_id: NodeId,
    pub sequence_num: u32,
    pub hops_away: u32,
    pub lat: f64,
    pub lng: f64,
    pub pos_confidence: f64,
    pub label: String,
}

/// Bounded FIFO of recently seen packet ids.
///
/// Replaying an id inside the window is detected as a duplicate; the window
/// holds the last [`gossim_common::tunables::DEDUP_BUFFER_SIZE`] ids.
#[derive(Debug, Clone, Default)]
pub struct DedupWindow {
    seen: VecDeque<PacketId>,
}

impl DedupWindow {
    pub fn new() -> Self {
        DedupWindow {
            seen: VecDeque::with_capacity(gossim_common::tunables::DEDUP_BUFFER_SIZE),
        }
    }

    /// Record `id`; returns `false` if it was already in the window.
    pub fn insert(&mut self, id: PacketId) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        if self.seen.len() == gossim_common::tunables::DEDUP_BUFFER_SIZE {
            self.seen.pop_front();
        }
        self.seen.push_back(id);
        true
    }

    pub fn contains(&self, id: PacketId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
