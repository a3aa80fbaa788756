use std::time::Duration;

use containers::DEFAULT_BODY_SIZE;

use crate::gossipsub::topic::TX_TOPIC;
use crate::tx_gossip::fetcher::FetchPolicy;

pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);

/// Tunables for the announcer and listener tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxGossipConfig {
    /// Topic the ids are announced on.
    pub topic: String,
    pub announce_interval: Duration,
    /// Size of the random body minted per announcement.
    pub body_size: usize,
    pub fetch: FetchPolicy,
}

impl Default for TxGossipConfig {
    fn default() -> Self {
        Self {
            topic: TX_TOPIC.to_string(),
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            body_size: DEFAULT_BODY_SIZE,
            fetch: FetchPolicy::default(),
        }
    }
}

impl TxGossipConfig {
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = interval;
        self
    }

    pub fn with_fetch_policy(mut self, fetch: FetchPolicy) -> Self {
        self.fetch = fetch;
        self
    }
}
