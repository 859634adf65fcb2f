//! Per-(frequency, recipient) delivery bandit.
//!
//! Every node keeps one of these. An *arm* is a `(frequency, recipient)`
//! pair, where frequency 1 means a direct send and 2 a routed send. Each
//! delivery outcome updates Beta-Binomial counts for its arm; scoring is
//! the posterior mean with add-one smoothing (Thompson-style without the
//! sampling step, so scores are deterministic), discounted for routed
//! frequencies and, in the weighted variant, for small sample sizes.

use gossim_common::{tunables::BANDIT_HISTORY, NodeId, Tick};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Direct send.
pub const FREQ_DIRECT: u8 = 1;
/// Routed (multi-hop) send.
pub const FREQ_ROUTED: u8 = 2;

/// Score of an arm with no observations.
const NEUTRAL_SCORE: f64 = 0.5;

/// Attempts needed before the weighted score stops discounting an arm.
const CONFIDENCE_ATTEMPTS: f64 = 5.0;

/// One recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    pub success: bool,
    pub tick: Tick,
}

/// Success/failure bookkeeping of one arm.
#[derive(Debug, Clone, Default)]
pub struct ArmStats {
    pub success_count: u32,
    pub failure_count: u32,
    /// `success_count / total_attempts`, recomputed on every record.
    pub success_rate: f64,
    /// Bounded record of the most recent attempts.
    history: VecDeque<AttemptRecord>,
}

impl ArmStats {
    pub fn total_attempts(&self) -> u32 {
        self.success_count + self.failure_count
    }

    pub fn history(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.history.iter()
    }

    fn record(&mut self, success: bool, tick: Tick) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        if self.history.len() == BANDIT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(AttemptRecord { success, tick });
        self.success_rate = self.success_count as f64 / self.total_attempts() as f64;
    }
}

/// Arm statistics exported into the node snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmSnapshot {
    pub success_count: u32,
    pub failure_count: u32,
    pub total_attempts: u32,
    pub success_rate: f64,
}

/// The tracker itself.
///
/// Arms live in a `BTreeMap` so iteration (and therefore arm selection
/// among equal scores) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct BanditTracker {
    arms: BTreeMap<(u8, NodeId), ArmStats>,
}

impl BanditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivery outcome for `(frequency, recipient)`.
    pub fn record_attempt(&mut self, frequency: u8, recipient: NodeId, success: bool, tick: Tick) {
        self.arms
            .entry((frequency, recipient))
            .or_default()
            .record(success, tick);
    }

    /// Posterior-mean score of an arm, discounted by frequency.
    ///
    /// `alpha / (alpha + beta)` with `alpha = successes + 1`,
    /// `beta = failures + 1`. An arm with no data scores the neutral 0.5,
    /// still multiplied by the frequency discount.
    pub fn thompson_score(&self, frequency: u8, recipient: NodeId) -> f64 {
        let base = match self.arms.get(&(frequency, recipient)) {
            Some(stats) => {
                let alpha = stats.success_count as f64 + 1.0;
                let beta = stats.failure_count as f64 + 1.0;
                alpha / (alpha + beta)
            }
            None => NEUTRAL_SCORE,
        };
        base * frequency_multiplier(frequency)
    }

    /// [`thompson_score`] additionally discounted for sample size:
    /// `min(1, attempts / 5)`.
    ///
    /// [`thompson_score`]: BanditTracker::thompson_score
    pub fn frequency_weighted_score(&self, frequency: u8, recipient: NodeId) -> f64 {
        let attempts = self
            .arms
            .get(&(frequency, recipient))
            .map(|s| s.total_attempts())
            .unwrap_or(0) as f64;
        let confidence = (attempts / CONFIDENCE_ATTEMPTS).min(1.0);
        self.thompson_score(frequency, recipient) * confidence
    }

    /// The arm with the highest frequency-weighted score, if any attempts
    /// were recorded. With `single_hop_only` only direct arms compete.
    pub fn best_arm(&self, single_hop_only: bool) -> Option<(u8, NodeId)> {
        let mut best: Option<((u8, NodeId), f64)> = None;
        for &(frequency, recipient) in self.arms.keys() {
            if single_hop_only && frequency != FREQ_DIRECT {
                continue;
            }
            let score = self.frequency_weighted_score(frequency, recipient);
            // Strict comparison keeps the first (lowest) key on ties.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some(((frequency, recipient), score));
            }
        }
        best.map(|(arm, _)| arm)
    }

    /// Stats of one arm, if it exists.
    pub fn arm(&self, frequency: u8, recipient: NodeId) -> Option<&ArmStats> {
        self.arms.get(&(frequency, recipient))
    }

    /// Snapshot of every arm, keyed `"frequency:recipient"`.
    pub fn snapshot(&self) -> BTreeMap<String, ArmSnapshot> {
        self.arms
            .iter()
            .map(|(&(frequency, recipient), stats)| {
                (
                    format!("{frequency}:{}", recipient.0),
                    ArmSnapshot {
                        success_count: stats.success_count,
                        failure_count: stats.failure_count,
                        total_attempts: stats.total_attempts(),
                        success_rate: stats.success_rate,
                    },
                )
            })
            .collect()
    }

    /// Forget every arm.
    pub fn reset(&mut self) {
        self.arms.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

/// Discount applied to non-direct frequencies:
/// 1.0 for frequency 1, otherwise `max(0.5, 1 - 0.2 * (frequency - 1))`.
fn frequency_multiplier(frequency: u8) -> f64 {
    if frequency == FREQ_DIRECT {
        1.0
    } else {
        (1.0 - 0.2 * (frequency as f64 - 1.0)).max(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: NodeId = NodeId(9);

    #[test]
    fn test_counts_and_rate() {
        let mut bandit = BanditTracker::new();
        bandit.record_attempt(FREQ_DIRECT, PEER, true, 1);
        bandit.record_attempt(FREQ_DIRECT, PEER, true, 2);
        bandit.record_attempt(FREQ_DIRECT, PEER, false, 3);

        let stats = bandit.arm(FREQ_DIRECT, PEER).unwrap();
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.total_attempts(), 3);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_data_scores_neutral() {
        let bandit = BanditTracker::new();
        assert_eq!(bandit.thompson_score(FREQ_DIRECT, PEER), 0.5);
        // Routed frequency still applies its multiplier to the neutral score.
        assert!((bandit.thompson_score(FREQ_ROUTED, PEER) - 0.5 * 0.8).abs() < 1e-12);
        // And the weighted score of an untried arm is zero confidence.
        assert_eq!(bandit.frequency_weighted_score(FREQ_DIRECT, PEER), 0.0);
    }

    #[test]
    fn test_thompson_score_posterior_mean() {
        let mut bandit = BanditTracker::new();
        for tick in 0..4 {
            bandit.record_attempt(FREQ_DIRECT, PEER, true, tick);
        }
        bandit.record_attempt(FREQ_DIRECT, PEER, false, 4);
        // alpha = 5, beta = 2
        assert!((bandit.thompson_score(FREQ_DIRECT, PEER) - 5.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_frequency_multiplier_floor() {
        assert_eq!(frequency_multiplier(1), 1.0);
        assert!((frequency_multiplier(2) - 0.8).abs() < 1e-12);
        // Far-out frequencies bottom out at 0.5.
        assert_eq!(frequency_multiplier(7), 0.5);
    }

    #[test]
    fn test_best_arm_prefers_reliable_peer() {
        let mut bandit = BanditTracker::new();
        let good = NodeId(1);
        let bad = NodeId(2);
        for tick in 0..10 {
            bandit.record_attempt(FREQ_DIRECT, good, true, tick);
            bandit.record_attempt(FREQ_DIRECT, bad, tick % 4 == 0, tick);
        }
        assert_eq!(bandit.best_arm(false), Some((FREQ_DIRECT, good)));
    }

    #[test]
    fn test_best_arm_single_hop_filter() {
        let mut bandit = BanditTracker::new();
        for tick in 0..10 {
            bandit.record_attempt(FREQ_ROUTED, NodeId(3), true, tick);
        }
        assert_eq!(bandit.best_arm(true), None);
        assert_eq!(bandit.best_arm(false), Some((FREQ_ROUTED, NodeId(3))));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut bandit = BanditTracker::new();
        for tick in 0..(BANDIT_HISTORY as u64 + 50) {
            bandit.record_attempt(FREQ_DIRECT, PEER, true, tick);
        }
        let stats = bandit.arm(FREQ_DIRECT, PEER).unwrap();
        assert_eq!(stats.history().count(), BANDIT_HISTORY);
        // Counts keep the full tally even after history eviction.
        assert_eq!(stats.total_attempts() as usize, BANDIT_HISTORY + 50);
    }

    #[test]
    fn test_reset_clears_arms() {
        let mut bandit = BanditTracker::new();
        bandit.record_attempt(FREQ_DIRECT, PEER, true, 1);
        bandit.reset();
        assert!(bandit.is_empty());
        assert_eq!(bandit.thompson_score(FREQ_DIRECT, PEER), 0.5);
    }
}
