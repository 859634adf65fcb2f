//! RF medium model: channels, in-air signals, path loss, jamming, capture.
//!
//! The [`Environment`] is the shared air every node transmits into. Its
//! contract is per-tick: [`Environment::start_tick`] clears the in-air
//! signal list and decays channel interference, after which senders append
//! signals via [`Environment::transmit`] and receivers resolve what they
//! hear via [`Environment::receive`].
//!
//! ## Propagation model
//!
//! Log-distance path loss with a 40 dB loss at the 1 m reference and a
//! 20 dB/decade slope:
//!
//! ```text
//! rssi = tx_power_dbm - 40 - 20 * log10(max(d, 1))
//! ```
//!
//! Noise at a receiver is the thermal floor plus jammer power plus a
//! congestion term proportional to the channel's interference level. The
//! strongest of several concurrent signals is decoded only if it beats the
//! runner-up by the capture threshold.

use gossim_common::{
    tunables::{CAPTURE_THRESHOLD_DB, CHANNEL_COUNT, NOISE_FLOOR_DBM, TX_POWER_DBM},
    DeliveryStatus, NodeId,
};
use gossim_geo::haversine_m;
use gossim_packet::Packet;
use serde::Serialize;
use tracing::debug;

/// Per-tick decay factor applied to channel interference.
const INTERFERENCE_DECAY: f64 = 0.95;

/// Interference added per concurrent candidate in a contention event.
const INTERFERENCE_PER_CANDIDATE: f64 = 0.1;

/// Margin by which jamming must exceed transmit power to block a sender.
const JAM_BLOCK_MARGIN_DB: f64 = 10.0;

/// EU868 channel plan used by the modelled LoRa radios.
const CHANNEL_FREQS_MHZ: [f64; CHANNEL_COUNT] = [
    868.1, 868.3, 868.5, 867.1, 867.3, 867.5, 867.7, 867.9,
];

/// One logical LoRa channel.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Channel {
    pub frequency_mhz: f64,
    /// Congestion level in `[0, 1]`, decayed every tick and bumped by
    /// contention events.
    pub interference: f64,
}

/// A signal currently in the air (cleared every tick).
#[derive(Debug, Clone)]
pub struct AirSignal {
    pub packet: Packet,
    pub sender_id: NodeId,
    pub lat: f64,
    pub lng: f64,
    pub channel: u8,
    pub tx_power_dbm: f64,
}

/// A stationary wideband jammer.
#[derive(Debug, Clone, Serialize)]
pub struct Jammer {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    pub power_dbm: f64,
    /// Channels the jammer covers.
    pub channels: Vec<u8>,
}

impl Jammer {
    /// Received jammer power at a location on one of its channels, in dBm.
    /// Zero outside the jammer's radius or off its channels.
    fn power_dbm_at(&self, lat: f64, lng: f64, channel: u8) -> f64 {
        if !self.channels.contains(&channel) {
            return 0.0;
        }
        let d = haversine_m(self.lat, self.lng, lat, lng);
        if d > self.radius_m {
            return 0.0;
        }
        // The noise model adds this term to the floor, so a contribution
        // weaker than "no jammer" is clamped out.
        (self.power_dbm - 20.0 * d.max(1.0).log10()).max(0.0)
    }
}

/// What one receiver hears of one signal.
#[derive(Debug, Clone)]
pub struct Reception {
    pub packet: Packet,
    pub sender_id: NodeId,
    pub rssi: f64,
    pub snr: f64,
    pub status: DeliveryStatus,
}

/// Per-channel view for spectrum dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSnapshot {
    pub channel: u8,
    pub frequency_mhz: f64,
    pub interference: f64,
    pub active_signals: usize,
}

/// The shared RF medium.
#[derive(Debug, Clone)]
pub struct Environment {
    channels: [Channel; CHANNEL_COUNT],
    air_signals: Vec<AirSignal>,
    jammers: Vec<Jammer>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            channels: CHANNEL_FREQS_MHZ.map(|frequency_mhz| Channel {
                frequency_mhz,
                interference: 0.0,
            }),
            air_signals: Vec::new(),
            jammers: Vec::new(),
        }
    }

    /// Begin a tick: drop last tick's signals and decay interference.
    pub fn start_tick(&mut self) {
        self.air_signals.clear();
        for channel in &mut self.channels {
            channel.interference *= INTERFERENCE_DECAY;
        }
    }

    /// Put a packet on the air.
    ///
    /// Returns `false` (and drops the packet) when jamming at the sender's
    /// own location on that channel exceeds `tx_power_dbm` by more than
    /// the blocking margin; the front end cannot even key up.
    pub fn transmit(
        &mut self,
        packet: Packet,
        sender_id: NodeId,
        lat: f64,
        lng: f64,
        channel: u8,
        tx_power_dbm: f64,
    ) -> bool {
        if self.jammer_power_dbm_at(lat, lng, channel) > tx_power_dbm + JAM_BLOCK_MARGIN_DB {
            debug!(%sender_id, channel, "transmit blocked by local jamming");
            return false;
        }
        self.air_signals.push(AirSignal {
            packet,
            sender_id,
            lat,
            lng,
            channel,
            tx_power_dbm,
        });
        true
    }

    /// Put a packet on the air at the default transmit power.
    pub fn transmit_default(
        &mut self,
        packet: Packet,
        sender_id: NodeId,
        lat: f64,
        lng: f64,
        channel: u8,
    ) -> bool {
        self.transmit(packet, sender_id, lat, lng, channel, TX_POWER_DBM)
    }

    /// Resolve everything a receiver hears on `channel` this tick.
    ///
    /// Candidates are the in-air signals on that channel from other
    /// senders within the radio's range. With several candidates the
    /// capture rule arbitrates and the channel's interference level rises
    /// with the amount of contention.
    pub fn receive(&mut self, receiver_id: NodeId, lat: f64, lng: f64, channel: u8) -> Vec<Reception> {
        let noise = self.noise_dbm_at(lat, lng, channel);
        let mut candidates: Vec<Reception> = Vec::new();
        for signal in &self.air_signals {
            if signal.channel != channel || signal.sender_id == receiver_id {
                continue;
            }
            let d = haversine_m(signal.lat, signal.lng, lat, lng);
            if d > signal.packet.radio.range_m() {
                continue;
            }
            let rssi = rssi_dbm(signal.tx_power_dbm, d);
            candidates.push(Reception {
                packet: signal.packet.clone(),
                sender_id: signal.sender_id,
                rssi,
                snr: rssi - noise,
                status: DeliveryStatus::Ok,
            });
        }

        match candidates.len() {
            0 => {}
            1 => {
                candidates[0].status = if candidates[0].snr < 0.0 {
                    DeliveryStatus::Jammed
                } else {
                    DeliveryStatus::Ok
                };
            }
            n => {
                let statuses =
                    arbitrate(&candidates.iter().map(|c| (c.rssi, c.snr)).collect::<Vec<_>>());
                for (candidate, status) in candidates.iter_mut().zip(statuses) {
                    candidate.status = status;
                }
                let bump = INTERFERENCE_PER_CANDIDATE * n as f64;
                let level = &mut self.channels[channel as usize % CHANNEL_COUNT].interference;
                *level = (*level + bump).min(1.0);
            }
        }
        candidates
    }

    /// Noise power at a location on a channel, in dBm.
    pub fn noise_dbm_at(&self, lat: f64, lng: f64, channel: u8) -> f64 {
        let interference = self.channels[channel as usize % CHANNEL_COUNT].interference;
        NOISE_FLOOR_DBM + self.jammer_power_dbm_at(lat, lng, channel) + 20.0 * interference
    }

    /// Strongest jammer contribution at a location on a channel, in dBm
    /// (zero if no jammer reaches it).
    pub fn jammer_power_dbm_at(&self, lat: f64, lng: f64, channel: u8) -> f64 {
        self.jammers
            .iter()
            .map(|j| j.power_dbm_at(lat, lng, channel))
            .fold(0.0, f64::max)
    }

    /// Install a jammer.
    pub fn add_jammer(&mut self, lat: f64, lng: f64, radius_m: f64, power_dbm: f64, channels: Vec<u8>) {
        debug!(lat, lng, radius_m, power_dbm, ?channels, "jammer installed");
        self.jammers.push(Jammer {
            lat,
            lng,
            radius_m,
            power_dbm,
            channels,
        });
    }

    /// Remove every jammer.
    pub fn clear_jammers(&mut self) {
        self.jammers.clear();
    }

    pub fn jammers(&self) -> &[Jammer] {
        &self.jammers
    }

    /// Bump a channel's interference after an externally arbitrated
    /// contention event of `candidates` concurrent signals.
    pub fn note_contention(&mut self, channel: u8, candidates: usize) {
        let level = &mut self.channels[channel as usize % CHANNEL_COUNT].interference;
        *level = (*level + INTERFERENCE_PER_CANDIDATE * candidates as f64).min(1.0);
    }

    /// Per-channel snapshot for spectrum dashboards.
    pub fn spectrum(&self) -> Vec<ChannelSnapshot> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, ch)| ChannelSnapshot {
                channel: i as u8,
                frequency_mhz: ch.frequency_mhz,
                interference: ch.interference,
                active_signals: self.air_signals.iter().filter(|s| s.channel == i as u8).count(),
            })
            .collect()
    }

    pub fn air_signal_count(&self) -> usize {
        self.air_signals.len()
    }
}

/// Received signal strength after log-distance path loss.
pub fn rssi_dbm(tx_power_dbm: f64, distance_m: f64) -> f64 {
    tx_power_dbm - 40.0 - 20.0 * distance_m.max(1.0).log10()
}

/// Capture arbitration over `(rssi, snr)` candidates at one receiver.
///
/// Returns one status per candidate, aligned with the input. The strongest
/// signal is captured when it beats the runner-up by at least the capture
/// threshold (jammed instead if its own SNR is negative); otherwise every
/// candidate is lost to the collision. Ties in RSSI keep input order, so
/// with a stable input order arbitration is deterministic.
pub fn arbitrate(candidates: &[(f64, f64)]) -> Vec<DeliveryStatus> {
    debug_assert!(candidates.len() >= 2);
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .0
            .partial_cmp(&candidates[a].0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut statuses = vec![DeliveryStatus::Collision; candidates.len()];
    let strongest = order[0];
    let runner_up = order[1];
    if candidates[strongest].0 - candidates[runner_up].0 >= CAPTURE_THRESHOLD_DB {
        statuses[strongest] = if candidates[strongest].1 < 0.0 {
            DeliveryStatus::Jammed
        } else {
            DeliveryStatus::Captured
        };
    }
    statuses
}
