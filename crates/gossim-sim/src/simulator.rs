//! The tick orchestrator.

use crate::snapshot::{NodeStateView, SimState, SimStats, Transmission};
use gossim_common::{
    tunables::{FTM_RANGE_M, MAX_LOG_EVENTS, TX_POWER_DBM, TX_VISUAL_DURATION},
    DeliveryStatus, LogEvent, NodeId, PacketId, RadioActivity, SimError, Tick,
};
use gossim_geo::{haversine_m, Xorshift32};
use gossim_metrics::{metric_defs, metrics};
use gossim_node::{Node, NodeConfig};
use gossim_packet::{codec, Packet, PacketKind};
use gossim_radio::{ChannelSnapshot, Environment, Jammer};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// One packet pulled from a transmit queue this tick, in flight.
struct Outbound {
    sender_idx: usize,
    packet: Packet,
    channel: u8,
    lat: f64,
    lng: f64,
    is_malicious: bool,
    /// Receivers that heard the packet at all (any status).
    heard_by: usize,
}

/// A resolved (receiver, signal) pairing awaiting its side effects.
struct Resolved {
    receiver_idx: usize,
    outbound_idx: usize,
    rssi: f64,
    status: DeliveryStatus,
}

/// The deterministic discrete-event mesh simulator.
///
/// Owns the node arena and the RF environment. Not reentrant: control
/// operations are only valid between [`Simulator::step`] calls.
pub struct Simulator {
    tick: Tick,
    running: bool,
    speed: f64,
    seed: u32,

    nodes: Vec<Node>,
    index: BTreeMap<NodeId, usize>,
    environment: Environment,

    transmissions: Vec<Transmission>,
    events: VecDeque<LogEvent>,

    total_sent: u64,
    total_delivered: u64,
    total_dropped: u64,
    total_collisions: u64,
    hop_accumulator: u64,
    delivery_count: u64,
    delivered_tracking_ids: Vec<String>,

    /// Feeds trust-graph density draws; seeded at construction so a run
    /// is reproducible from `(sensors, seed, action sequence)`.
    rng: Xorshift32,
}

impl Simulator {
    /// Build a simulator from sensor definitions with the default seed.
    pub fn new(sensors: Vec<NodeConfig>) -> Self {
        Self::with_seed(sensors, 1)
    }

    /// Build a simulator from sensor definitions and an explicit seed for
    /// the simulator-level randomness (trust-graph density draws).
    pub fn with_seed(sensors: Vec<NodeConfig>, seed: u32) -> Self {
        let mut sim = Simulator {
            tick: 0,
            running: false,
            speed: 1.0,
            seed,
            nodes: Vec::new(),
            index: BTreeMap::new(),
            environment: Environment::new(),
            transmissions: Vec::new(),
            events: VecDeque::new(),
            total_sent: 0,
            total_delivered: 0,
            total_dropped: 0,
            total_collisions: 0,
            hop_accumulator: 0,
            delivery_count: 0,
            delivered_tracking_ids: Vec::new(),
            rng: Xorshift32::new(seed),
        };
        for sensor in sensors {
            sim.add_node(sensor);
        }
        sim
    }

    /// Tear down and rebuild from a fresh sensor list. Nothing carries
    /// over: packets, air signals, counters and bandit state all go.
    pub fn reset(&mut self, sensors: Vec<NodeConfig>) {
        *self = Simulator::with_seed(sensors, self.seed);
        self.push_event(LogEvent::info(0, "simulation reset"));
    }

    /// Add a node. It joins the tick iteration at the end of the
    /// insertion order; a duplicate id is refused.
    pub fn try_add_node(&mut self, config: NodeConfig) -> Result<(), SimError> {
        if self.index.contains_key(&config.id) {
            return Err(SimError::DuplicateNode(config.id));
        }
        let node = Node::new(config);
        self.index.insert(node.id(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Lenient [`Simulator::try_add_node`]: a duplicate id is ignored
    /// with a warning in the event log.
    pub fn add_node(&mut self, config: NodeConfig) {
        let id = config.id;
        match self.try_add_node(config) {
            Ok(()) => {
                if self.tick > 0 {
                    self.push_event(LogEvent::info(self.tick, format!("node {id} joined")));
                }
            }
            Err(err) => {
                self.push_event(LogEvent::warn(self.tick, format!("{err}, ignored")));
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Mutable node handle for attack-config and radio setters. Only
    /// valid between ticks.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let i = *self.index.get(&id)?;
        Some(&mut self.nodes[i])
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    pub fn spectrum(&self) -> Vec<ChannelSnapshot> {
        self.environment.spectrum()
    }

    pub fn jammers(&self) -> &[Jammer] {
        self.environment.jammers()
    }

    // ========================================================================
    // The tick
    // ========================================================================

    /// Advance the world one tick and return its snapshot.
    pub fn step(&mut self) -> SimState {
        self.tick += 1;
        let tick = self.tick;
        self.environment.start_tick();
        for node in &mut self.nodes {
            node.set_radio_activity(RadioActivity::Idle);
        }

        self.ftm_phase(tick);

        for node in &mut self.nodes {
            node.step(tick);
        }

        let mut outbound = self.pull_transmissions();
        let resolved = self.resolve_contention(&mut outbound);
        self.apply_deliveries(&outbound, &resolved, tick);

        // A packet that reached nobody is a drop.
        for out in &outbound {
            if out.heard_by == 0 {
                self.total_dropped += 1;
                metrics::counter!(metric_defs::PACKETS_DROPPED.name).increment(1);
            }
        }

        // Bounded histories.
        self.transmissions
            .retain(|t| tick - t.created_tick < TX_VISUAL_DURATION);
        while self.events.len() > MAX_LOG_EVENTS {
            self.events.pop_front();
        }

        self.get_state()
    }

    /// FTM phase: every non-anchor node ranges every peer within FTM
    /// range, by true distance. Each side's measurement draws from its
    /// own noise stream; symmetry is not required.
    fn ftm_phase(&mut self, tick: Tick) {
        let positions: Vec<(NodeId, f64, f64)> = self
            .nodes
            .iter()
            .map(|n| {
                let (lat, lng) = n.true_position();
                (n.id(), lat, lng)
            })
            .collect();

        for i in 0..self.nodes.len() {
            if self.nodes[i].is_anchor() {
                continue;
            }
            let (lat, lng) = self.nodes[i].true_position();
            for &(peer, peer_lat, peer_lng) in &positions {
                if peer == self.nodes[i].id() {
                    continue;
                }
                let distance = haversine_m(lat, lng, peer_lat, peer_lng);
                if distance <= FTM_RANGE_M {
                    self.nodes[i].perform_ftm_ranging(peer, distance, peer_lat, peer_lng, tick);
                }
            }
        }
    }

    /// Half-duplex transmit pull: at most one packet per node, placed on
    /// the air unless local jamming blocks the sender outright.
    fn pull_transmissions(&mut self) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for i in 0..self.nodes.len() {
            let Some(packet) = self.nodes[i].pop_tx() else {
                continue;
            };
            self.nodes[i].set_radio_activity(RadioActivity::Tx);
            self.total_sent += 1;
            metrics::counter!(metric_defs::PACKETS_SENT.name).increment(1);

            let (lat, lng) = self.nodes[i].true_position();
            let channel = self.nodes[i].lora_channel();
            let sender_id = self.nodes[i].id();
            let aired = self.environment.transmit(
                packet.clone(),
                sender_id,
                lat,
                lng,
                channel,
                TX_POWER_DBM,
            );
            if !aired {
                self.push_event(LogEvent::warn(
                    self.tick,
                    format!("node {sender_id} transmit blocked by jamming"),
                ));
                continue;
            }
            outbound.push(Outbound {
                sender_idx: i,
                is_malicious: self.nodes[i].is_malicious(),
                packet,
                channel,
                lat,
                lng,
                heard_by: 0,
            });
        }
        outbound
    }

    /// Per-receiver contention: every non-transmitting node asks the
    /// environment what it heard on its channel; the environment's
    /// capture rule arbitrates. Reception order follows sender pull
    /// order, which is node insertion order, so ties are stable.
    fn resolve_contention(&mut self, outbound: &mut [Outbound]) -> Vec<Resolved> {
        let by_packet: BTreeMap<PacketId, usize> = outbound
            .iter()
            .enumerate()
            .map(|(i, out)| (out.packet.id, i))
            .collect();

        let mut resolved = Vec::new();
        for r in 0..self.nodes.len() {
            if self.nodes[r].radio_activity() == RadioActivity::Tx {
                continue;
            }
            let (rlat, rlng) = self.nodes[r].true_position();
            let rchannel = self.nodes[r].lora_channel();
            let receiver_id = self.nodes[r].id();

            let receptions = self.environment.receive(receiver_id, rlat, rlng, rchannel);
            if receptions.len() >= 2 {
                self.total_collisions += 1;
                metrics::counter!(metric_defs::COLLISIONS.name).increment(1);
            }
            for reception in receptions {
                let Some(&oi) = by_packet.get(&reception.packet.id) else {
                    continue;
                };
                outbound[oi].heard_by += 1;
                resolved.push(Resolved {
                    receiver_idx: r,
                    outbound_idx: oi,
                    rssi: reception.rssi,
                    status: reception.status,
                });
            }
        }
        resolved
    }

    /// Side effects of the resolved receptions, in receiver order:
    /// transmission records, sender feedback, actual delivery, ACK
    /// bookkeeping and tracking-id capture.
    fn apply_deliveries(&mut self, outbound: &[Outbound], resolved: &[Resolved], tick: Tick) {
        for r in resolved {
            let out = &outbound[r.outbound_idx];
            let (to_lat, to_lng) = self.nodes[r.receiver_idx].true_position();
            self.transmissions.push(Transmission {
                from_lat: out.lat,
                from_lng: out.lng,
                to_lat,
                to_lng,
                packet_type: out.packet.kind,
                status: r.status,
                created_tick: tick,
                channel: out.channel,
                is_malicious: out.is_malicious,
                radio: out.packet.radio,
            });

            self.nodes[out.sender_idx].record_transmission_result(out.packet.id, r.status);

            if !r.status.is_delivered() {
                continue;
            }
            self.nodes[r.receiver_idx].set_radio_activity(RadioActivity::Rx);
            let response = self.nodes[r.receiver_idx].receive(&out.packet, r.rssi, tick);
            let Some(response) = response else {
                continue;
            };
            if response.kind == PacketKind::Ack {
                self.total_delivered += 1;
                self.hop_accumulator += out.packet.hop_count as u64;
                self.delivery_count += 1;
                metrics::counter!(metric_defs::PACKETS_DELIVERED.name).increment(1);

                let (tag, _) = codec::split_tracking_tag(&out.packet.payload);
                if let Some(tag) = tag {
                    if !self.delivered_tracking_ids.iter().any(|t| t == tag) {
                        self.delivered_tracking_ids.push(tag.to_string());
                    }
                    self.push_event(LogEvent::success(
                        tick,
                        format!(
                            "tracked message {tag} delivered to node {}",
                            self.nodes[r.receiver_idx].id()
                        ),
                    ));
                }
            }
            // ACKs and forwards go out on a later tick.
            self.nodes[r.receiver_idx].push_tx(response);
        }
    }

    // ========================================================================
    // User actions (between ticks only)
    // ========================================================================

    /// Enqueue a user DATA message; the optional tracking id is echoed
    /// into `delivered_tracking_ids` once the destination ACKs. Returns
    /// the packet id for correlation.
    pub fn try_send_message(
        &mut self,
        from: NodeId,
        to: NodeId,
        payload: &str,
        tracking_id: Option<&str>,
    ) -> Result<PacketId, SimError> {
        let tick = self.tick;
        let Some(node) = self.node_mut(from) else {
            return Err(SimError::UnknownNode(from));
        };
        let body = match tracking_id {
            Some(tag) => codec::with_tracking_tag(tag, payload),
            None => payload.to_string(),
        };
        let packet_id = node.send_data(to, body, tick);
        self.push_event(LogEvent::info(
            tick,
            format!("node {from} queued message for node {to}"),
        ));
        Ok(packet_id)
    }

    /// Lenient [`Simulator::try_send_message`]: an unknown source node is
    /// ignored with no side effect.
    pub fn send_message(&mut self, from: NodeId, to: NodeId, payload: &str, tracking_id: Option<&str>) {
        if let Err(err) = self.try_send_message(from, to, payload, tracking_id) {
            debug!(%err, "send_message ignored");
        }
    }

    /// Install a jammer (pass-through to the environment).
    pub fn add_jammer(&mut self, lat: f64, lng: f64, radius_m: f64, power_dbm: f64, channels: Vec<u8>) {
        self.environment
            .add_jammer(lat, lng, radius_m, power_dbm, channels);
        self.push_event(LogEvent::warn(self.tick, "jammer activated".to_string()));
    }

    pub fn clear_jammers(&mut self) {
        self.environment.clear_jammers();
        self.push_event(LogEvent::info(self.tick, "jammers cleared".to_string()));
    }

    // ========================================================================
    // Trust graph
    // ========================================================================

    /// Install the two nodes' public keys into each other's trust stores.
    /// Unknown ids are ignored with no side effect.
    pub fn establish_trust(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        let (Some(&ia), Some(&ib)) = (self.index.get(&a), self.index.get(&b)) else {
            return;
        };
        let key_a = self.nodes[ia].public_key();
        let key_b = self.nodes[ib].public_key();
        self.nodes[ia].trust_peer(b, key_b);
        self.nodes[ib].trust_peer(a, key_a);
    }

    /// Clear trust for `node_ids`, then trust each unordered pair with
    /// independent probability `density`.
    pub fn configure_trust_graph(&mut self, node_ids: &[NodeId], density: f64) {
        for &id in node_ids {
            if let Some(node) = self.node_mut(id) {
                node.clear_trusted_peers();
            }
        }
        for (i, &a) in node_ids.iter().enumerate() {
            for &b in &node_ids[i + 1..] {
                if self.rng.chance(density) {
                    self.establish_trust(a, b);
                }
            }
        }
        self.push_event(LogEvent::info(
            self.tick,
            format!("trust graph rebuilt over {} nodes", node_ids.len()),
        ));
    }

    /// Clear every trust store, then establish exactly the edges in the
    /// map (deduplicated on the unordered pair).
    pub fn set_trust_graph_from_map(&mut self, map: &BTreeMap<NodeId, Vec<NodeId>>) {
        for node in &mut self.nodes {
            node.clear_trusted_peers();
        }
        for (&a, peers) in map {
            for &b in peers {
                self.establish_trust(a, b);
            }
        }
        self.push_event(LogEvent::info(self.tick, "trust graph installed".to_string()));
    }

    /// Toggle trusted-only routing on every node.
    pub fn set_trusted_only_routing(&mut self, enabled: bool) {
        for node in &mut self.nodes {
            node.set_trusted_only_routing(enabled);
        }
        info!(enabled, "trusted-only routing toggled");
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Deep-copy snapshot of the current state.
    pub fn get_state(&self) -> SimState {
        let n = self.nodes.len() as f64;
        let known_sum: usize = self.nodes.iter().map(|x| x.neighbor_table().len()).sum();
        let membership_coverage = if self.nodes.len() > 1 {
            (known_sum as f64 / (n * (n - 1.0))).clamp(0.0, 1.0)
        } else {
            0.0
        };
        metrics::gauge!(metric_defs::MEMBERSHIP_COVERAGE.name).set(membership_coverage);

        let node_states = self
            .nodes
            .iter()
            .map(|node| {
                let (true_lat, true_lng) = node.true_position();
                let (est_lat, est_lng) = node.estimated_position();
                NodeStateView {
                    id: node.id(),
                    true_lat,
                    true_lng,
                    est_lat,
                    est_lng,
                    pos_confidence: node.pos_confidence(),
                    state: node.radio_activity(),
                    neighbor_count: node
                        .neighbor_table()
                        .values()
                        .filter(|e| e.hops_away == 1)
                        .count(),
                    known_nodes: node.neighbor_table().len(),
                    label: node.label().to_string(),
                    trusted_peers: node.trusted_peer_ids().collect(),
                    discovered_labels: node
                        .neighbor_table()
                        .iter()
                        .filter(|(_, e)| !e.label.is_empty())
                        .map(|(&id, e)| (id, e.label.clone()))
                        .collect(),
                    received_messages: node.received_messages().to_vec(),
                    bandit_stats: node.bandit().snapshot(),
                }
            })
            .collect();

        SimState {
            tick: self.tick,
            running: self.running,
            speed: self.speed,
            node_states,
            transmissions: self.transmissions.clone(),
            events: self.events.iter().cloned().collect(),
            stats: SimStats {
                tick: self.tick,
                total_sent: self.total_sent,
                total_delivered: self.total_delivered,
                total_dropped: self.total_dropped,
                total_collisions: self.total_collisions,
                avg_hops: self.hop_accumulator as f64 / self.delivery_count.max(1) as f64,
                membership_coverage,
            },
            delivered_tracking_ids: self.delivered_tracking_ids.clone(),
        }
    }

    fn push_event(&mut self, event: LogEvent) {
        self.events.push_back(event);
        while self.events.len() > MAX_LOG_EVENTS {
            self.events.pop_front();
        }
    }
}
