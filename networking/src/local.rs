//! In-process transport.
//!
//! [`LocalHub`] is a set of named broadcast channels shared by every node in
//! the process and [`LocalPeerLink`] routes fetch requests straight into the
//! target node's index. Used to run several nodes in one test or simulation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use containers::{TransactionBody, TransactionId};
use libp2p_identity::PeerId;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{trace, warn};
use tx_index::SharedIndex;

use crate::channel::{PeerLink, Subscription, TopicChannel, TopicHandle};
use crate::error::{FetchError, GossipError};
use crate::types::GossipMessage;

pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct LocalHub {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<GossipMessage>>>>,
    capacity: usize,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::default(),
            capacity,
        }
    }

    /// Topic channel for the node identified by `peer`.
    pub fn endpoint(&self, peer: PeerId) -> LocalChannel {
        LocalChannel {
            hub: self.clone(),
            peer,
        }
    }

    fn sender(&self, name: &str) -> broadcast::Sender<GossipMessage> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscriptions on `name`.
    pub fn subscribers(&self, name: &str) -> usize {
        self.topics
            .lock()
            .get(name)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

pub struct LocalChannel {
    hub: LocalHub,
    peer: PeerId,
}

#[async_trait]
impl TopicChannel for LocalChannel {
    type Topic = LocalTopic;

    async fn join(&self, name: &str) -> Result<LocalTopic, GossipError> {
        Ok(LocalTopic {
            name: name.to_string(),
            sender: self.hub.sender(name),
            peer: self.peer,
        })
    }
}

pub struct LocalTopic {
    name: String,
    sender: broadcast::Sender<GossipMessage>,
    peer: PeerId,
}

#[async_trait]
impl TopicHandle for LocalTopic {
    type Subscription = LocalSubscription;

    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), GossipError> {
        let message = GossipMessage::new(data, Some(self.peer), self.peer);

        // Publishing with nobody listening is not an error.
        if self.sender.send(message).is_err() {
            trace!(topic = %self.name, "No subscribers for local publish");
        }

        Ok(())
    }

    async fn subscribe(&self) -> Result<LocalSubscription, GossipError> {
        Ok(LocalSubscription {
            topic: self.name.clone(),
            receiver: self.sender.subscribe(),
        })
    }

    async fn close(self) -> Result<(), GossipError> {
        trace!(topic = %self.name, "Closed local topic");
        Ok(())
    }
}

pub struct LocalSubscription {
    topic: String,
    receiver: broadcast::Receiver<GossipMessage>,
}

#[async_trait]
impl Subscription for LocalSubscription {
    async fn next(&mut self) -> Result<GossipMessage, GossipError> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Local subscription lagged");
                }
                Err(RecvError::Closed) => return Err(GossipError::ChannelClosed),
            }
        }
    }

    async fn cancel(self) {
        drop(self.receiver);
    }
}

struct LocalPeer {
    index: SharedIndex,
    connected: bool,
}

/// Routes fetches to the index of a registered peer.
#[derive(Clone, Default)]
pub struct LocalPeerLink {
    peers: Arc<RwLock<HashMap<PeerId, LocalPeer>>>,
}

impl LocalPeerLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `peer` as connected and serving from `index`.
    pub fn register(&self, peer: PeerId, index: SharedIndex) {
        self.peers.write().insert(
            peer,
            LocalPeer {
                index,
                connected: true,
            },
        );
    }

    /// Marks `peer` as not connected. It stays reachable, as a dial would
    /// still succeed.
    pub fn set_connected(&self, peer: &PeerId, connected: bool) {
        if let Some(entry) = self.peers.write().get_mut(peer) {
            entry.connected = connected;
        }
    }

    /// Makes `peer` unreachable.
    pub fn remove(&self, peer: &PeerId) {
        self.peers.write().remove(peer);
    }
}

#[async_trait]
impl PeerLink for LocalPeerLink {
    fn is_connected(&self, peer: &PeerId) -> bool {
        self.peers.read().get(peer).is_some_and(|entry| entry.connected)
    }

    async fn request_transaction(
        &self,
        peer: PeerId,
        id: TransactionId,
    ) -> Result<TransactionBody, FetchError> {
        let index = self
            .peers
            .read()
            .get(&peer)
            .map(|entry| entry.index.clone())
            .ok_or(FetchError::Disconnected)?;

        index.get(&id).ok_or(FetchError::NotFound)
    }
}
