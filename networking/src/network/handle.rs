use std::sync::Arc;

use async_trait::async_trait;
use containers::{TransactionBody, TransactionId};
use libp2p::gossipsub::TopicHash;
use libp2p_identity::PeerId;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::channel::{PeerLink, Subscription, TopicChannel, TopicHandle};
use crate::error::{FetchError, GossipError};
use crate::gossipsub::topic::{GossipsubKind, GossipsubTopic};
use crate::types::{ConnectionState, GossipMessage, NetworkCommand, PeerTable, SubscriptionId};

/// Cloneable front end of [`super::NetworkService`].
#[derive(Clone)]
pub struct NetworkHandle {
    commands: mpsc::UnboundedSender<NetworkCommand>,
    peer_table: Arc<Mutex<PeerTable>>,
    local_peer_id: PeerId,
    topics: Arc<[GossipsubTopic]>,
}

impl NetworkHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<NetworkCommand>,
        peer_table: Arc<Mutex<PeerTable>>,
        local_peer_id: PeerId,
        topics: Vec<GossipsubTopic>,
    ) -> Self {
        Self {
            commands,
            peer_table,
            local_peer_id,
            topics: topics.into(),
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    fn topic(&self, name: &str) -> Option<GossipsubTopic> {
        let kind = GossipsubKind::from_name(name)?;
        self.topics.iter().find(|topic| topic.kind == kind).cloned()
    }
}

/// Sends `command` to the service and waits for its reply.
async fn request<T>(
    commands: &mpsc::UnboundedSender<NetworkCommand>,
    command: impl FnOnce(oneshot::Sender<Result<T, GossipError>>) -> NetworkCommand,
) -> Result<T, GossipError> {
    let (reply, response) = oneshot::channel();
    commands
        .send(command(reply))
        .map_err(|_| GossipError::ChannelClosed)?;
    response.await.map_err(|_| GossipError::ChannelClosed)?
}

#[async_trait]
impl TopicChannel for NetworkHandle {
    type Topic = NetworkTopic;

    async fn join(&self, name: &str) -> Result<NetworkTopic, GossipError> {
        let topic = self.topic(name).ok_or_else(|| GossipError::Join {
            topic: name.to_string(),
            reason: "unknown topic".to_string(),
        })?;

        request(&self.commands, |reply| NetworkCommand::Join {
            topic: topic.clone(),
            reply,
        })
        .await?;

        Ok(NetworkTopic {
            name: name.to_string(),
            topic,
            commands: self.commands.clone(),
        })
    }
}

#[async_trait]
impl PeerLink for NetworkHandle {
    fn is_connected(&self, peer: &PeerId) -> bool {
        self.peer_table.lock().get(peer) == Some(&ConnectionState::Connected)
    }

    async fn request_transaction(
        &self,
        peer: PeerId,
        id: TransactionId,
    ) -> Result<TransactionBody, FetchError> {
        let stopped = || FetchError::Request("network service stopped".to_string());

        let (reply, response) = oneshot::channel();
        self.commands
            .send(NetworkCommand::FetchTransaction { peer, id, reply })
            .map_err(|_| stopped())?;

        response.await.map_err(|_| stopped())?
    }
}

pub struct NetworkTopic {
    name: String,
    topic: GossipsubTopic,
    commands: mpsc::UnboundedSender<NetworkCommand>,
}

#[async_trait]
impl TopicHandle for NetworkTopic {
    type Subscription = NetworkSubscription;

    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), GossipError> {
        request(&self.commands, |reply| NetworkCommand::Publish {
            topic: self.topic.clone(),
            data,
            reply,
        })
        .await
    }

    async fn subscribe(&self) -> Result<NetworkSubscription, GossipError> {
        let (id, receiver) = request(&self.commands, |reply| NetworkCommand::Subscribe {
            topic: self.topic.clone(),
            reply,
        })
        .await
        .map_err(|err| GossipError::Subscribe {
            topic: self.name.clone(),
            reason: err.to_string(),
        })?;

        Ok(NetworkSubscription {
            topic: self.topic.hash(),
            id,
            receiver,
            commands: self.commands.clone(),
        })
    }

    async fn close(self) -> Result<(), GossipError> {
        request(&self.commands, |reply| NetworkCommand::Leave {
            topic: self.topic,
            reply,
        })
        .await
    }
}

pub struct NetworkSubscription {
    topic: TopicHash,
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<GossipMessage>,
    commands: mpsc::UnboundedSender<NetworkCommand>,
}

#[async_trait]
impl Subscription for NetworkSubscription {
    async fn next(&mut self) -> Result<GossipMessage, GossipError> {
        self.receiver.recv().await.ok_or(GossipError::ChannelClosed)
    }

    async fn cancel(self) {
        let (reply, done) = oneshot::channel();
        let sent = self.commands.send(NetworkCommand::Unsubscribe {
            topic: self.topic,
            subscription: self.id,
            reply,
        });

        if sent.is_ok() {
            let _ = done.await;
        }
    }
}
