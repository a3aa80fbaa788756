use crate::gossipsub::topic::GossipsubTopic;
use libp2p::gossipsub::{Config, ConfigBuilder, Message, MessageId, ValidationMode};
use sha2::Digest;
use sha2::Sha256;
use std::time::Duration;

/// Domain byte prepended to the message-id preimage.
pub const MESSAGE_DOMAIN: &[u8; 1] = &[0x01];

/// How long seen message ids are remembered.
///
/// Several announce intervals, so re-forwarded copies of an id are dropped
/// by gossipsub before they reach the listener.
pub const SEEN_TTL: Duration = Duration::from_secs(120);

/// Largest gossip payload accepted. Announcements only carry an id.
pub const MAX_TRANSMIT_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct GossipsubConfig {
    pub config: Config,
    pub topics: Vec<GossipsubTopic>,
}

impl GossipsubConfig {
    pub fn new() -> Self {
        let config = ConfigBuilder::default()
            .heartbeat_interval(Duration::from_millis(700))
            .fanout_ttl(Duration::from_secs(60))
            .history_length(6)
            .history_gossip(3)
            .duplicate_cache_time(SEEN_TTL)
            .mesh_n(8)
            .mesh_n_low(6)
            .mesh_n_high(12)
            .gossip_lazy(6)
            .max_transmit_size(MAX_TRANSMIT_SIZE)
            // Signed messages carry the publisher, which the listener needs
            // for its self-check.
            .validation_mode(ValidationMode::Strict)
            // Forwarded only after the service has decoded the payload.
            .validate_messages()
            .message_id_fn(compute_message_id)
            .build()
            .expect("Failed to build gossipsub config");

        GossipsubConfig {
            config,
            topics: Vec::new(),
        }
    }

    pub fn set_topics(&mut self, topics: Vec<GossipsubTopic>) {
        self.topics = topics;
    }
}

impl Default for GossipsubConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Content-addressed message id:
/// SHA256(domain + uint64_le(len(topic)) + topic + message_data)[:20]
///
/// Two copies of the same announcement share an id no matter which peer
/// forwarded them.
pub fn compute_message_id(message: &Message) -> MessageId {
    let topic_bytes = message.topic.as_str().as_bytes();
    let topic_len = topic_bytes.len() as u64;

    let mut digest_input = Vec::new();
    digest_input.extend_from_slice(MESSAGE_DOMAIN);
    digest_input.extend_from_slice(&topic_len.to_le_bytes());
    digest_input.extend_from_slice(topic_bytes);
    digest_input.extend_from_slice(&message.data);

    let hash = Sha256::digest(&digest_input);

    MessageId::from(&hash[..20])
}
