/// Gossipsub Topics
///
/// Topic definitions for the node's gossipsub network.
///
/// ## Topic Format
///
/// ```text
/// /{prefix}/{network}/{topic_name}/{encoding}
///
/// Example: /gossipnode/devnet0/txs/snappy
/// ```
///
/// | Component      | Description                                    |
/// |----------------|------------------------------------------------|
/// | prefix         | Protocol identifier (`gossipnode`)             |
/// | network        | Network name, keeps separate networks apart    |
/// | topic_name     | Message type (`txs`, `blks`)                   |
/// | encoding       | Payload encoding (always `snappy`)             |
///
/// ## Topic Types
///
/// | Topic | Content                                  |
/// |-------|------------------------------------------|
/// | txs   | 32-byte transaction ids                  |
/// | blks  | Block announcements                      |
use libp2p::gossipsub::{IdentTopic, TopicHash};

pub const TOPIC_PREFIX: &str = "gossipnode";

/// Payloads are snappy-compressed by the gossipsub data transform.
pub const ENCODING_POSTFIX: &str = "snappy";

/// Topic name for transaction id announcements.
pub const TX_TOPIC: &str = "txs";

/// Topic name for block announcements.
pub const BLOCK_TOPIC: &str = "blks";

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum GossipsubKind {
    Transactions,
    Blocks,
}

impl std::fmt::Display for GossipsubKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GossipsubKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GossipsubKind::Transactions => TX_TOPIC,
            GossipsubKind::Blocks => BLOCK_TOPIC,
        }
    }

    /// Looks up a kind by its bare topic name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            TX_TOPIC => Some(GossipsubKind::Transactions),
            BLOCK_TOPIC => Some(GossipsubKind::Blocks),
            _ => None,
        }
    }
}

/// A fully-qualified gossipsub topic.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct GossipsubTopic {
    /// Network name. Peers must agree on it to exchange messages.
    pub network: String,

    pub kind: GossipsubKind,
}

impl GossipsubTopic {
    pub fn new(network: String, kind: GossipsubKind) -> Self {
        Self { network, kind }
    }

    pub fn transactions(network: String) -> Self {
        Self::new(network, GossipsubKind::Transactions)
    }

    pub fn blocks(network: String) -> Self {
        Self::new(network, GossipsubKind::Blocks)
    }

    /// Parses a full topic string.
    ///
    /// # Example
    ///
    /// ```
    /// use networking::gossipsub::topic::{GossipsubKind, GossipsubTopic};
    ///
    /// let topic = GossipsubTopic::from_string("/gossipnode/devnet0/txs/snappy")?;
    /// assert_eq!(topic.kind, GossipsubKind::Transactions);
    /// # Ok::<(), String>(())
    /// ```
    pub fn from_string(topic_str: &str) -> Result<Self, String> {
        let (prefix, network, topic_name, encoding) = parse_topic_string(topic_str)?;

        if prefix != TOPIC_PREFIX {
            return Err(format!(
                "Invalid prefix: expected '{TOPIC_PREFIX}', got '{prefix}'"
            ));
        }

        if encoding != ENCODING_POSTFIX {
            return Err(format!(
                "Invalid encoding: expected '{ENCODING_POSTFIX}', got '{encoding}'"
            ));
        }

        let kind = GossipsubKind::from_name(topic_name)
            .ok_or_else(|| format!("Unknown topic: '{topic_name}'"))?;

        Ok(Self::new(network.to_string(), kind))
    }

    pub fn decode(topic: &TopicHash) -> Result<Self, String> {
        Self::from_string(topic.as_str())
    }

    pub fn hash(&self) -> TopicHash {
        TopicHash::from_raw(self.to_string())
    }
}

impl std::fmt::Display for GossipsubTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            TOPIC_PREFIX, self.network, self.kind, ENCODING_POSTFIX
        )
    }
}

impl From<GossipsubTopic> for IdentTopic {
    fn from(topic: GossipsubTopic) -> IdentTopic {
        IdentTopic::new(topic)
    }
}

impl From<GossipsubTopic> for String {
    fn from(topic: GossipsubTopic) -> Self {
        topic.to_string()
    }
}

impl From<GossipsubTopic> for TopicHash {
    fn from(val: GossipsubTopic) -> Self {
        val.hash()
    }
}

/// All topics of a network.
pub fn get_topics(network: String) -> Vec<GossipsubTopic> {
    vec![
        GossipsubTopic::transactions(network.clone()),
        GossipsubTopic::blocks(network),
    ]
}

/// Splits a topic string into (prefix, network, topic_name, encoding).
pub fn parse_topic_string(topic_str: &str) -> Result<(&str, &str, &str, &str), String> {
    let parts: Vec<&str> = topic_str.trim_start_matches('/').split('/').collect();

    if parts.len() != 4 {
        return Err(format!(
            "Invalid topic format: expected 4 parts, got {}",
            parts.len()
        ));
    }

    Ok((parts[0], parts[1], parts[2], parts[3]))
}
