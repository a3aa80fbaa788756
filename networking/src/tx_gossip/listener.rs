use libp2p_identity::PeerId;
use metrics::{ReceiveOutcome, SharedMetrics};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tx_index::SharedIndex;

use crate::channel::{PeerLink, Subscription};
use crate::error::GossipError;
use crate::tx_gossip::fetcher::Fetcher;
use crate::types::GossipMessage;

/// Consumes announcements and pulls the bodies this node is missing.
pub struct Listener<L: PeerLink> {
    index: SharedIndex,
    fetcher: Fetcher<L>,
    local_peer_id: PeerId,
    metrics: Option<SharedMetrics>,
}

impl<L: PeerLink> Listener<L> {
    pub fn new(index: SharedIndex, fetcher: Fetcher<L>, local_peer_id: PeerId) -> Self {
        Self {
            index,
            fetcher,
            local_peer_id,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<SharedMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Processes one delivery. Never fails: every error is local to the id.
    pub async fn handle_message(
        &self,
        message: GossipMessage,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        let outcome = self.process(message, cancel).await;

        if let Some(metrics) = &self.metrics {
            metrics.inc_txs_received(outcome);
        }

        outcome
    }

    async fn process(&self, message: GossipMessage, cancel: &CancellationToken) -> ReceiveOutcome {
        if message.is_from(&self.local_peer_id) {
            trace!("Ignoring own announcement");
            return ReceiveOutcome::OwnMessage;
        }

        let Some(id) = message.transaction_id() else {
            warn!(
                peer = %message.received_from,
                len = message.data.len(),
                "Announcement is not a transaction id"
            );
            return ReceiveOutcome::Malformed;
        };

        if self.index.have(&id) {
            debug!(tx_id = %id, "Transaction already known");
            return ReceiveOutcome::Duplicate;
        }

        let peer = message.fetch_peer();
        info!(tx_id = %id, %peer, "Received new transaction id");

        match self.fetcher.fetch(id, peer, cancel).await {
            Ok(body) => {
                if self.index.store(&id, body).is_conflict() {
                    warn!(tx_id = %id, %peer, "Fetched body conflicts with stored body, kept the stored one");
                }
                if let Some(metrics) = &self.metrics {
                    metrics.set_tx_index_size(self.index.len() as i64);
                }
                ReceiveOutcome::Fetched
            }
            Err(err) if err.is_cancelled() => {
                debug!(tx_id = %id, "Fetch abandoned on shutdown");
                ReceiveOutcome::FetchFailed
            }
            Err(err) => {
                warn!(tx_id = %id, %peer, error = %err, "Failed to fetch transaction");
                ReceiveOutcome::FetchFailed
            }
        }
    }

    /// Processes deliveries in order until cancelled or the subscription fails.
    ///
    /// On exit the subscription is cancelled and then `done` is signalled.
    pub async fn run<S: Subscription>(
        self,
        mut subscription: S,
        cancel: CancellationToken,
        done: oneshot::Sender<()>,
    ) -> Result<(), GossipError> {
        let result = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GossipError::Cancelled),
                next = subscription.next() => next,
            };

            match next {
                Ok(message) => {
                    self.handle_message(message, &cancel).await;
                }
                Err(err) if err.is_cancelled() => {
                    debug!("Listener cancelled");
                    break Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "Subscription failed, stopping listener");
                    break Err(err);
                }
            }
        };

        subscription.cancel().await;
        let _ = done.send(());

        result
    }
}
