//! Metrics infrastructure for the Gossim simulator.
//!
//! Re-exports the `metrics` facade and declares every metric the
//! simulator emits as a structured [`Metric`] constant, so call sites
//! cannot typo a name and recorders get descriptions up front. No
//! recorder is installed here; embedding binaries choose their own.
//!
//! ```rust
//! use gossim_metrics::{metric_defs, metrics};
//!
//! gossim_metrics::describe_metrics();
//! metrics::counter!(metric_defs::PACKETS_SENT.name).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric (counter or gauge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "gossim.packets.sent").
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Unit,
}

impl Metric {
    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            kind: MetricKind::Counter,
            description,
            unit: Unit::Count,
        }
    }

    pub const fn gauge(name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            kind: MetricKind::Gauge,
            description,
            unit: Unit::Count,
        }
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.description),
        }
    }
}

/// All metrics emitted by the simulator.
pub mod metric_defs {
    use super::Metric;

    pub const PACKETS_SENT: Metric =
        Metric::counter("gossim.packets.sent", "Packets pulled from transmit queues");
    pub const PACKETS_DELIVERED: Metric = Metric::counter(
        "gossim.packets.delivered",
        "Packets acknowledged end to end",
    );
    pub const PACKETS_DROPPED: Metric = Metric::counter(
        "gossim.packets.dropped",
        "Packets aired with no receiver in range",
    );
    pub const COLLISIONS: Metric = Metric::counter(
        "gossim.radio.collisions",
        "Per-receiver contention events",
    );
    pub const MEMBERSHIP_COVERAGE: Metric = Metric::gauge(
        "gossim.gossip.membership_coverage",
        "Fraction of the full membership view reached by gossip",
    );

    /// Every declared metric, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &PACKETS_SENT,
        &PACKETS_DELIVERED,
        &PACKETS_DROPPED,
        &COLLISIONS,
        &MEMBERSHIP_COVERAGE,
    ];
}

/// Register descriptions of every metric. Call once at startup.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
