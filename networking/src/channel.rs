//! Transport seams of the gossip core.
//!
//! [`TopicChannel`], [`TopicHandle`] and [`Subscription`] model a named
//! broadcast channel; [`PeerLink`] models connectivity plus the
//! point-to-point fetch stream to a single peer.

use async_trait::async_trait;
use containers::{TransactionBody, TransactionId};
use libp2p_identity::PeerId;

use crate::error::{FetchError, GossipError};
use crate::types::GossipMessage;

#[async_trait]
pub trait TopicChannel: Send + Sync {
    type Topic: TopicHandle;

    /// Joins (or attaches to) the topic called `name`.
    async fn join(&self, name: &str) -> Result<Self::Topic, GossipError>;
}

#[async_trait]
pub trait TopicHandle: Send + Sync + Sized + 'static {
    type Subscription: Subscription;

    fn name(&self) -> &str;

    async fn publish(&self, data: Vec<u8>) -> Result<(), GossipError>;

    /// Opens a cursor that receives every message published after this call.
    async fn subscribe(&self) -> Result<Self::Subscription, GossipError>;

    /// Releases the topic. Consumes the handle so it happens at most once.
    async fn close(self) -> Result<(), GossipError>;
}

#[async_trait]
pub trait Subscription: Send + Sized + 'static {
    /// Waits for the next delivered message.
    async fn next(&mut self) -> Result<GossipMessage, GossipError>;

    /// Stops delivery. Returns once the transport has dropped the cursor.
    async fn cancel(self);
}

#[async_trait]
pub trait PeerLink: Send + Sync + 'static {
    /// Advisory connectivity check. A peer can still drop mid-request.
    fn is_connected(&self, peer: &PeerId) -> bool;

    /// One request for the body of `id`, addressed to `peer` only.
    async fn request_transaction(
        &self,
        peer: PeerId,
        id: TransactionId,
    ) -> Result<TransactionBody, FetchError>;
}
