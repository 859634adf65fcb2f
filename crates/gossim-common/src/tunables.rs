//! Compile-time tunables of the simulation.
//!
//! Fixed constants of the modelled radios and protocol timers. Everything
//! here is in SI units (meters, dB/dBm) or ticks.

/// Maximum LoRa propagation range in meters.
pub const RADIO_RANGE_M: f64 = 450.0;

/// Maximum BLE propagation range in meters.
pub const BLE_RANGE_M: f64 = 100.0;

/// Maximum distance at which FTM ranging succeeds, in meters.
pub const FTM_RANGE_M: f64 = 200.0;

/// RSSI margin by which the strongest of several concurrent signals must
/// beat the runner-up to be captured, in dB.
pub const CAPTURE_THRESHOLD_DB: f64 = 6.0;

/// Base interval between gossip heartbeats, in ticks.
pub const BEACON_INTERVAL: u64 = 40;

/// Upper bound of the uniform random jitter added to the beacon interval.
pub const BEACON_JITTER: u64 = 15;

/// Maximum entries in a gossip heartbeat (self entry included).
pub const MAX_GOSSIP_ENTRIES: usize = 6;

/// Initial TTL of routed packets.
pub const MAX_TTL: u8 = 12;

/// Ticks after which an unrefreshed neighbor entry (or FTM reading) expires.
pub const NEIGHBOR_EXPIRY: u64 = 200;

/// Ticks after which a pending message is written off as a delivery failure.
pub const PENDING_TIMEOUT: u64 = 100;

/// Number of recently seen packet ids kept for duplicate suppression.
pub const DEDUP_BUFFER_SIZE: usize = 64;

/// Ticks a transmission record stays in the snapshot for visualisation.
pub const TX_VISUAL_DURATION: u64 = 4;

/// Maximum entries retained in the consumer-facing event log.
pub const MAX_LOG_EVENTS: usize = 30;

/// Number of LoRa channels in the modelled band.
pub const CHANNEL_COUNT: usize = 8;

/// Thermal noise floor at every receiver, in dBm.
pub const NOISE_FLOOR_DBM: f64 = -110.0;

/// Default transmit power, in dBm.
pub const TX_POWER_DBM: f64 = 20.0;

/// Bounded per-arm attempt history kept by the bandit.
pub const BANDIT_HISTORY: usize = 100;
