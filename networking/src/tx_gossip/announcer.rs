use std::time::Duration;

use containers::Transaction;
use metrics::SharedMetrics;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tx_index::SharedIndex;

use crate::channel::TopicHandle;
use crate::error::GossipError;

/// Mints a transaction every `interval`, stores it, and announces its id.
pub struct Announcer {
    index: SharedIndex,
    body_size: usize,
    interval: Duration,
    metrics: Option<SharedMetrics>,
}

impl Announcer {
    pub fn new(index: SharedIndex, body_size: usize, interval: Duration) -> Self {
        Self {
            index,
            body_size,
            interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<SharedMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// One tick: exactly one store followed by exactly one publish.
    pub async fn announce_once<T: TopicHandle>(&self, topic: &T) -> Result<Transaction, GossipError> {
        let tx = Transaction::random(self.body_size);

        if self.index.store(&tx.id, tx.body.clone()).is_conflict() {
            warn!(tx_id = %tx.id, "Freshly minted transaction id already bound to another body");
        }

        topic.publish(tx.id.as_bytes().to_vec()).await?;

        info!(tx_id = %tx.id, topic = topic.name(), "Announced transaction");

        if let Some(metrics) = &self.metrics {
            metrics.inc_txs_announced();
            metrics.set_tx_index_size(self.index.len() as i64);
        }

        Ok(tx)
    }

    /// Announces until cancelled or until a publish fails. A failed publish
    /// cancels `cancel`, which ends the listener as well.
    ///
    /// The topic is closed only after `listener_done` fires, so the listener's
    /// subscription is always gone before the handle is released.
    pub async fn run<T: TopicHandle>(
        self,
        topic: T,
        cancel: CancellationToken,
        listener_done: oneshot::Receiver<()>,
    ) -> Result<(), GossipError> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Announcer cancelled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        break Ok(());
                    }
                    if let Err(err) = self.announce_once(&topic).await {
                        warn!(error = %err, "Publish failed, stopping transaction gossip");
                        // Stops the listener so the handshake below completes.
                        cancel.cancel();
                        break Err(err);
                    }
                }
            }
        };

        // A sender dropped without sending still means the listener is gone.
        let _ = listener_done.await;

        if let Err(err) = topic.close().await {
            warn!(error = %err, "Failed to close topic");
        }

        result
    }
}
