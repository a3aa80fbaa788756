//! Transaction gossip tasks.
//!
//! [`TxGossip::start`] joins the transaction topic and spawns two tasks that
//! share one cancellation token: the [`Announcer`], which owns the topic
//! handle, and the [`Listener`], which owns the subscription. On shutdown the
//! listener cancels its subscription first and signals the announcer, which
//! then closes the topic.

pub mod announcer;
pub mod config;
pub mod fetcher;
pub mod listener;
pub mod topic;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use libp2p_identity::PeerId;
use metrics::SharedMetrics;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tx_index::SharedIndex;

use crate::channel::{PeerLink, TopicChannel};
use crate::error::GossipError;

pub use announcer::Announcer;
pub use config::TxGossipConfig;
pub use fetcher::{FetchPolicy, Fetcher, fetch_with_retry};
pub use listener::Listener;
pub use topic::{subscribe_blocks, subscribe_topic, subscribe_transactions};

pub struct TxGossip {
    config: TxGossipConfig,
    index: SharedIndex,
    local_peer_id: PeerId,
    metrics: Option<SharedMetrics>,
}

impl TxGossip {
    pub fn new(config: TxGossipConfig, index: SharedIndex, local_peer_id: PeerId) -> Self {
        Self {
            config,
            index,
            local_peer_id,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<SharedMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Joins the topic, subscribes and spawns both tasks.
    ///
    /// Tasks stop when `cancel` (or [`TxGossipHandle::cancel`]) fires, or
    /// when a publish fails.
    pub async fn start<C, L>(
        self,
        channel: &C,
        link: Arc<L>,
        cancel: CancellationToken,
    ) -> Result<TxGossipHandle, GossipError>
    where
        C: TopicChannel,
        L: PeerLink,
    {
        let (topic, subscription) = subscribe_topic(channel, &self.config.topic).await?;

        // A fatal publish stops both tasks without touching the caller's token.
        let cancel = cancel.child_token();

        info!(
            topic = %self.config.topic,
            interval = ?self.config.announce_interval,
            "Starting transaction gossip"
        );

        let (done_tx, done_rx) = oneshot::channel();

        let announcer = Announcer::new(
            self.index.clone(),
            self.config.body_size,
            self.config.announce_interval,
        )
        .with_metrics(self.metrics.clone());

        let fetcher = Fetcher::new(link, self.config.fetch).with_metrics(self.metrics.clone());
        let listener = Listener::new(self.index, fetcher, self.local_peer_id).with_metrics(self.metrics);

        let listener = tokio::spawn(listener.run(subscription, cancel.clone(), done_tx));
        let announcer = tokio::spawn(announcer.run(topic, cancel.clone(), done_rx));

        Ok(TxGossipHandle {
            announcer,
            listener,
            cancel,
        })
    }
}

/// How each task ended.
#[derive(Debug)]
pub struct TxGossipExit {
    pub announcer: Result<(), GossipError>,
    pub listener: Result<(), GossipError>,
}

impl TxGossipExit {
    pub fn is_clean(&self) -> bool {
        self.announcer.is_ok() && self.listener.is_ok()
    }
}

pub struct TxGossipHandle {
    announcer: JoinHandle<Result<(), GossipError>>,
    listener: JoinHandle<Result<(), GossipError>>,
    cancel: CancellationToken,
}

impl TxGossipHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for both tasks to finish.
    pub async fn join(self) -> TxGossipExit {
        let (announcer, listener) = tokio::join!(self.announcer, self.listener);

        TxGossipExit {
            announcer: flatten(announcer),
            listener: flatten(listener),
        }
    }

    pub async fn shutdown(self) -> TxGossipExit {
        self.cancel();
        self.join().await
    }
}

fn flatten(result: Result<Result<(), GossipError>, JoinError>) -> Result<(), GossipError> {
    result.map_err(|err| GossipError::Task(err.to_string()))?
}
