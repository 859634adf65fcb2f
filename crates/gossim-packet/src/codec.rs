//! Sentinel payload encoding and decoding.
//!
//! Gossip bodies are JSON so external consumers can decode them with any
//! stock tooling; the sentinels stay plain-text detectable as required by
//! the wire contract.

use crate::GossipEntry;
use gossim_common::PacketId;

/// Prefix of a gossip heartbeat payload.
pub const GOSSIP_PREFIX: &str = "[GOSSIP]";

/// Prefix of an acknowledgement payload.
pub const ACK_PREFIX: &str = "ACK:";

/// Opening sentinel of a tracking tag.
pub const TRACK_OPEN: &str = "[trk:";

/// True if `payload` is a gossip heartbeat body.
pub fn is_gossip(payload: &str) -> bool {
    payload.starts_with(GOSSIP_PREFIX)
}

/// Encode a gossip heartbeat payload.
pub fn encode_gossip(entries: &[GossipEntry]) -> String {
    let body = serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string());
    format!("{GOSSIP_PREFIX}{body}")
}

/// Decode a gossip heartbeat payload.
///
/// A malformed body decodes to an empty entry list: the packet is still a
/// heartbeat and is still acknowledged, it just carries no usable entries.
pub fn decode_gossip(payload: &str) -> Vec<GossipEntry> {
    let Some(body) = payload.strip_prefix(GOSSIP_PREFIX) else {
        return Vec::new();
    };
    serde_json::from_str(body).unwrap_or_default()
}

/// Encode an acknowledgement payload for `acked`.
pub fn encode_ack(acked: PacketId) -> String {
    format!("{ACK_PREFIX}{}", acked.0)
}

/// Decode an acknowledgement payload to the acknowledged packet id.
pub fn decode_ack(payload: &str) -> Option<PacketId> {
    payload
        .strip_prefix(ACK_PREFIX)
        .and_then(|body| body.parse::<u64>().ok())
        .map(PacketId)
}

/// Prefix `payload` with a tracking tag.
pub fn with_tracking_tag(tracking_id: &str, payload: &str) -> String {
    format!("{TRACK_OPEN}{tracking_id}]{payload}")
}

/// Split an optional tracking tag off the front of `payload`.
///
/// Returns `(tag, rest)`; `rest` is the payload with the tag stripped.
pub fn split_tracking_tag(payload: &str) -> (Option<&str>, &str) {
    let Some(after) = payload.strip_prefix(TRACK_OPEN) else {
        return (None, payload);
    };
    match after.split_once(']') {
        Some((tag, rest)) => (Some(tag), rest),
        None => (None, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossim_common::NodeId;

    fn entry(id: u32) -> GossipEntry {
        GossipEntry {
            node_id: NodeId::new(id),
            sequence_num: 3,
            hops_away: 1,
            lat: 47.5,
            lng: 8.25,
            pos_confidence: 0.8,
            label: format!("node-{id}"),
        }
    }

    #[test]
    fn test_gossip_round_trip() {
        let entries = vec![entry(1), entry(2)];
        let payload = encode_gossip(&entries);
        assert!(is_gossip(&payload));
        assert_eq!(decode_gossip(&payload), entries);
    }

    #[test]
    fn test_malformed_gossip_decodes_empty() {
        assert!(decode_gossip("[GOSSIP]{not json").is_empty());
        assert!(decode_gossip("no sentinel").is_empty());
    }

    #[test]
    fn test_ack_round_trip() {
        let id = PacketId(0xdead_beef);
        assert_eq!(decode_ack(&encode_ack(id)), Some(id));
        assert_eq!(decode_ack("ACK:garbage"), None);
        assert_eq!(decode_ack("hello"), None);
    }

    #[test]
    fn test_tracking_tag_split() {
        let tagged = with_tracking_tag("xyz", "hi there");
        assert_eq!(split_tracking_tag(&tagged), (Some("xyz"), "hi there"));
        assert_eq!(split_tracking_tag("plain"), (None, "plain"));
        // Unterminated tag is left untouched.
        assert_eq!(split_tracking_tag("[trk:oops"), (None, "[trk:oops"));
    }
}
