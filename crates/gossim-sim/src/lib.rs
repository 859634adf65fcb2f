//! Deterministic tick orchestrator for the Gossim mesh testbed.
//!
//! The [`Simulator`] owns every [`gossim_node::Node`] (arena storage,
//! addressed by id) and the shared [`gossim_radio::Environment`]. One call
//! to [`Simulator::step`] advances the world one tick:
//!
//! 1. clear the air and every node's radio state
//! 2. FTM ranging between every in-range pair
//! 3. per-node protocol step (timers, gossip, trilateration, attacks)
//! 4. half-duplex transmit pull (one packet per node)
//! 5. propagation to candidate receivers
//! 6. per-receiver contention with the capture rule
//! 7. delivery bookkeeping (ACK credit, tracking ids, bandit feedback)
//! 8. drop accounting and bounded-history pruning
//!
//! and returns an immutable [`SimState`] value snapshot. Consumers never
//! hold references into node internals; control actions (messages, trust
//! reconfiguration, jammers) are applied between ticks only.

mod simulator;
mod snapshot;

pub use gossim_common::{LogEvent, LogLevel, NodeId, SimError};
pub use gossim_node::{AttackState, AttackStrategy, Node, NodeConfig};
pub use simulator::Simulator;
pub use snapshot::{NodeStateView, SimState, SimStats, Transmission};
