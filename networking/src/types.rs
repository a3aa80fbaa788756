use std::collections::HashMap;

use containers::{TransactionBody, TransactionId};
use libp2p::gossipsub::TopicHash;
use libp2p_identity::PeerId;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::{FetchError, GossipError};
use crate::gossipsub::topic::GossipsubTopic;

/// Peer connection state machine.
///
/// Tracks the lifecycle of a connection to a peer:
/// DISCONNECTED -> CONNECTING -> CONNECTED -> DISCONNECTED
///
/// These states map directly to libp2p connection events.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No active connection to this peer.
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Transport established, can exchange protocol messages.
    Connected,
}

pub type PeerTable = HashMap<PeerId, ConnectionState>;

/// One delivery from a topic subscription.
///
/// Built per delivery and dropped once processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    /// Raw payload as published.
    pub data: Vec<u8>,
    /// Peer that published the message, when the transport signs messages.
    pub origin: Option<PeerId>,
    /// Peer that handed the message to us. Differs from `origin` when the
    /// message was relayed.
    pub received_from: PeerId,
}

impl GossipMessage {
    pub fn new(data: Vec<u8>, origin: Option<PeerId>, received_from: PeerId) -> Self {
        Self {
            data,
            origin,
            received_from,
        }
    }

    /// Transaction id carried by the payload, if it has the right length.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        TransactionId::from_slice(&self.data)
    }

    pub fn is_from(&self, peer: &PeerId) -> bool {
        self.origin.as_ref() == Some(peer)
    }

    /// Peer to pull the body from.
    ///
    /// The forwarding peer is the one we are actually linked to, so it wins
    /// over the origin.
    pub fn fetch_peer(&self) -> PeerId {
        self.received_from
    }
}

pub type SubscriptionId = u64;

pub type Reply<T, E> = oneshot::Sender<Result<T, E>>;

/// Requests from [`crate::network::NetworkHandle`] to the swarm task.
#[derive(Debug)]
pub enum NetworkCommand {
    Join {
        topic: GossipsubTopic,
        reply: Reply<(), GossipError>,
    },
    Leave {
        topic: GossipsubTopic,
        reply: Reply<(), GossipError>,
    },
    Publish {
        topic: GossipsubTopic,
        data: Vec<u8>,
        reply: Reply<(), GossipError>,
    },
    Subscribe {
        topic: GossipsubTopic,
        reply: Reply<(SubscriptionId, mpsc::UnboundedReceiver<GossipMessage>), GossipError>,
    },
    Unsubscribe {
        topic: TopicHash,
        subscription: SubscriptionId,
        reply: oneshot::Sender<()>,
    },
    FetchTransaction {
        peer: PeerId,
        id: TransactionId,
        reply: Reply<TransactionBody, FetchError>,
    },
}
