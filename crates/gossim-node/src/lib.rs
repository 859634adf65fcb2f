//! Per-node mesh protocol state machine.
//!
//! A [`Node`] implements the full protocol stack of one radio in the mesh:
//! epidemic-gossip membership with sequence-numbered heartbeats, FTM-fed
//! trilateration, geographic greedy + gradient routing, a trust store with
//! decaying reputation, and bandit feedback from delivery outcomes. The
//! [`attack`] module adds the adversarial variants (jammer, liar, sybil,
//! blackhole, selective dropper) that run after the honest protocol step.
//!
//! Nodes never hold references to each other; they speak only through
//! packets handed to them by the simulator and identify peers by
//! [`gossim_common::NodeId`].

pub mod attack;
mod node;
mod tables;

pub use attack::{AttackState, AttackStrategy};
pub use node::{Node, NodeConfig};
pub use tables::{
    FtmReading, NeighborEntry, PendingMessage, ReceivedMessage, SentMessage, SentStatus,
};
