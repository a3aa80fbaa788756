use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use containers::{TransactionBody, TransactionId};
use libp2p_identity::PeerId;
use metrics::SharedMetrics;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::channel::PeerLink;
use crate::error::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(value) => value,
    None => panic!("max attempts must be non-zero"),
};

/// Retry policy for pulling one transaction body from one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Upper bound on a single request.
    pub per_attempt_timeout: Duration,
    pub max_attempts: NonZeroU32,
    /// Pause between a failed attempt and the next one.
    pub retry_backoff: Duration,
    /// Grace period given to a peer that is not connected yet.
    pub disconnected_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_millis(500),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(100),
            disconnected_delay: Duration::from_millis(200),
        }
    }
}

/// Pulls the body of `id` from `peer`, retrying per `policy`.
///
/// Attempts are strictly sequential. Every wait races `cancel`, so a
/// cancelled fetch returns [`FetchError::Cancelled`] promptly. The recorded
/// fetch time spans the pre-delay and every retry.
pub async fn fetch_with_retry<L: PeerLink + ?Sized>(
    link: &L,
    id: TransactionId,
    peer: PeerId,
    policy: &FetchPolicy,
    cancel: &CancellationToken,
    metrics: Option<&SharedMetrics>,
) -> Result<TransactionBody, FetchError> {
    let started = Instant::now();

    if !link.is_connected(&peer) {
        debug!(%peer, tx_id = %id, "Peer not connected, delaying fetch");
        wait(policy.disconnected_delay, cancel).await?;
    }

    let max_attempts = policy.max_attempts.get();
    let mut last = FetchError::Disconnected;

    for attempt in 1..=max_attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = timeout(policy.per_attempt_timeout, link.request_transaction(peer, id)) => {
                result.unwrap_or(Err(FetchError::Timeout(policy.per_attempt_timeout)))
            }
        };

        match result {
            Ok(body) => {
                if let Some(metrics) = metrics {
                    metrics.inc_tx_fetch_attempt("success");
                    metrics.observe_tx_fetch_time(started.elapsed().as_secs_f64());
                }
                trace!(%peer, tx_id = %id, attempt, "Fetched transaction body");
                return Ok(body);
            }
            Err(err) => {
                if let Some(metrics) = metrics {
                    metrics.inc_tx_fetch_attempt(err.label());
                }
                debug!(%peer, tx_id = %id, attempt, error = %err, "Fetch attempt failed");
                last = err;
            }
        }

        if attempt < max_attempts {
            wait(policy.retry_backoff, cancel).await?;
        }
    }

    Err(FetchError::Exhausted {
        attempts: max_attempts,
        last: Box::new(last),
    })
}

async fn wait(duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}

/// A [`PeerLink`] bound to a [`FetchPolicy`].
pub struct Fetcher<L: PeerLink> {
    link: Arc<L>,
    policy: FetchPolicy,
    metrics: Option<SharedMetrics>,
}

impl<L: PeerLink> Fetcher<L> {
    pub fn new(link: Arc<L>, policy: FetchPolicy) -> Self {
        Self {
            link,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<SharedMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub async fn fetch(
        &self,
        id: TransactionId,
        peer: PeerId,
        cancel: &CancellationToken,
    ) -> Result<TransactionBody, FetchError> {
        fetch_with_retry(
            self.link.as_ref(),
            id,
            peer,
            &self.policy,
            cancel,
            self.metrics.as_ref(),
        )
        .await
    }
}
