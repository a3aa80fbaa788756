use crate::gossipsub::topic::GossipsubKind;
use crate::gossipsub::topic::GossipsubTopic;
use containers::TransactionId;
use libp2p::gossipsub::TopicHash;

/// Decoded gossipsub message by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipsubMessage {
    Transaction(TransactionId),
    /// Block payloads are passed through untouched.
    Block(Vec<u8>),
}

impl GossipsubMessage {
    pub fn decode(topic: &TopicHash, data: &[u8]) -> Result<Self, String> {
        match GossipsubTopic::decode(topic)?.kind {
            GossipsubKind::Transactions => TransactionId::from_slice(data)
                .map(Self::Transaction)
                .ok_or_else(|| format!("expected 32-byte transaction id, got {} bytes", data.len())),
            GossipsubKind::Blocks => Ok(Self::Block(data.to_vec())),
        }
    }
}
