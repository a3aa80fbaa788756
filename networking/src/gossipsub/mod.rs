pub mod config;
pub mod message;
pub mod topic;

#[cfg(test)]
mod tests;

use crate::compressor::Compressor;
use libp2p::gossipsub::{AllowAllSubscriptionFilter, Behaviour};

pub type GossipsubBehaviour = Behaviour<Compressor, AllowAllSubscriptionFilter>;

// Re-export commonly used types
pub use config::{GossipsubConfig, compute_message_id};
pub use message::GossipsubMessage;
pub use topic::{
    BLOCK_TOPIC, ENCODING_POSTFIX, GossipsubKind, GossipsubTopic, TOPIC_PREFIX, TX_TOPIC,
    get_topics, parse_topic_string,
};
