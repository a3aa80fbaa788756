use std::sync::Arc;
use std::time::Duration;

use containers::{DEFAULT_BODY_SIZE, TransactionId};
use metrics::Metrics;
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tx_index::{MemoryIndex, SharedIndex, TransactionIndex};

use super::fakes::{Event, FakeChannel};
use crate::error::GossipError;
use crate::tx_gossip::announcer::Announcer;

fn announcer(index: &Arc<MemoryIndex>, interval: Duration) -> Announcer {
    let shared: SharedIndex = index.clone();
    Announcer::new(shared, DEFAULT_BODY_SIZE, interval)
}

#[tokio::test]
async fn test_one_tick_stores_then_publishes() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::new();
    let topic = channel.topic("txs");

    let tx = announcer(&index, Duration::from_secs(10))
        .announce_once(&topic)
        .await
        .unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.get(&tx.id), Some(tx.body.clone()));
    assert_eq!(tx.body.len(), DEFAULT_BODY_SIZE);
    assert_eq!(channel.published(), vec![tx.id.as_bytes().to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_first_announcement_after_one_interval() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::new();
    let cancel = CancellationToken::new();
    let (done_tx, done_rx) = oneshot::channel();

    let task = tokio::spawn(
        announcer(&index, Duration::from_secs(10)).run(channel.topic("txs"), cancel.clone(), done_rx),
    );

    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert!(channel.published().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let published = channel.published();
    assert_eq!(published.len(), 1);

    let id = TransactionId::from_slice(&published[0]).unwrap();
    assert!(index.have(&id));

    cancel.cancel();
    done_tx.send(()).unwrap();
    assert_eq!(task.await.unwrap(), Ok(()));
    assert_eq!(channel.count(&Event::Close), 1);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_ends_loop() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::failing_publish();
    let (done_tx, done_rx) = oneshot::channel();
    done_tx.send(()).unwrap();

    let result = announcer(&index, Duration::from_secs(1))
        .run(channel.topic("txs"), CancellationToken::new(), done_rx)
        .await;

    assert!(matches!(result, Err(GossipError::Publish { .. })));
    // The store happens before the failed publish.
    assert_eq!(index.len(), 1);
    assert_eq!(channel.count(&Event::Close), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_waits_for_listener() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::new();
    let cancel = CancellationToken::new();
    let (done_tx, done_rx) = oneshot::channel();
    cancel.cancel();

    let task = tokio::spawn(
        announcer(&index, Duration::from_secs(10)).run(channel.topic("txs"), cancel, done_rx),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(channel.count(&Event::Close), 0);

    done_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(channel.count(&Event::Close), 1);
    assert!(channel.published().is_empty());
}

#[tokio::test]
async fn test_announce_updates_metrics() {
    let index = Arc::new(MemoryIndex::new());
    let metrics = Arc::new(Metrics::new());
    let (channel, _deliveries) = FakeChannel::new();
    let topic = channel.topic("txs");
    let announcer = announcer(&index, Duration::from_secs(10)).with_metrics(Some(metrics.clone()));

    announcer.announce_once(&topic).await.unwrap();
    announcer.announce_once(&topic).await.unwrap();

    assert_eq!(metrics.txs_announced(), 2);
}
