use std::sync::Arc;
use std::time::Duration;

use containers::{TransactionBody, TransactionId};
use libp2p_identity::PeerId;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use tx_index::{MemoryIndex, SharedIndex, TransactionIndex};

use super::fakes::{Event, FakeChannel, FakeLink, announcement};
use crate::error::GossipError;
use crate::tx_gossip::topic::subscribe_topic;
use crate::tx_gossip::{TxGossip, TxGossipConfig};

fn gossip(index: &Arc<MemoryIndex>, interval: Duration) -> TxGossip {
    let shared: SharedIndex = index.clone();
    TxGossip::new(
        TxGossipConfig::default().with_announce_interval(interval),
        shared,
        PeerId::random(),
    )
}

#[tokio::test]
async fn test_subscribe_failure_releases_join() {
    let channel = FakeChannel::failing_subscribe();

    let result = subscribe_topic(&channel, "txs").await;

    assert!(matches!(result, Err(GossipError::Subscribe { .. })));
    assert_eq!(channel.events(), vec![Event::Join("txs".to_string()), Event::Close]);
}

#[tokio::test]
async fn test_start_propagates_subscribe_failure() {
    let index = Arc::new(MemoryIndex::new());
    let channel = FakeChannel::failing_subscribe();

    let result = gossip(&index, Duration::from_secs(10))
        .start(&channel, Arc::new(FakeLink::connected()), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GossipError::Subscribe { .. })));
    assert_eq!(channel.count(&Event::Close), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unsubscribes_before_close() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::new();

    let handle = gossip(&index, Duration::from_secs(10))
        .start(&channel, Arc::new(FakeLink::connected()), CancellationToken::new())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(25)).await;
    let exit = handle.shutdown().await;

    assert!(exit.is_clean());
    assert_eq!(channel.published().len(), 2);
    assert_eq!(channel.count(&Event::Unsubscribe), 1);
    assert_eq!(channel.count(&Event::Close), 1);

    let unsubscribed = channel.position(&Event::Unsubscribe).unwrap();
    let closed = channel.position(&Event::Close).unwrap();
    assert!(unsubscribed < closed);
    assert_eq!(closed, channel.events().len() - 1);
}

#[tokio::test(start_paused = true)]
async fn test_external_token_stops_both_tasks() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::new();
    let cancel = CancellationToken::new();

    let handle = gossip(&index, Duration::from_secs(1))
        .start(&channel, Arc::new(FakeLink::connected()), cancel.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    cancel.cancel();
    let exit = handle.join().await;

    assert!(exit.is_clean());
    assert_eq!(index.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_error_ends_listener_only() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, deliveries) = FakeChannel::new();

    let handle = gossip(&index, Duration::from_secs(1))
        .start(&channel, Arc::new(FakeLink::connected()), CancellationToken::new())
        .await
        .unwrap();

    deliveries
        .send(Err(GossipError::Delivery("stream reset".to_string())))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    // Announcer keeps going after the listener is gone.
    assert_eq!(channel.published().len(), 2);
    assert_eq!(channel.count(&Event::Close), 0);

    let exit = handle.shutdown().await;

    assert_eq!(exit.announcer, Ok(()));
    assert_eq!(exit.listener, Err(GossipError::Delivery("stream reset".to_string())));
    assert!(channel.position(&Event::Unsubscribe) < channel.position(&Event::Close));
}

#[tokio::test(start_paused = true)]
async fn test_remote_announcement_is_fetched() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, deliveries) = FakeChannel::new();
    let id = TransactionId::random();
    let body = TransactionBody::new(vec![0xab; 10]);
    let link = Arc::new(FakeLink::disconnected().with_body(id, body.clone()));

    let handle = gossip(&index, Duration::from_secs(60))
        .start(&channel, link.clone(), CancellationToken::new())
        .await
        .unwrap();

    let peer = PeerId::random();
    deliveries.send(Ok(announcement(id, peer, peer))).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(index.get(&id), Some(body));
    assert_eq!(link.requests().len(), 1);

    assert!(handle.shutdown().await.is_clean());
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_stops_both_tasks() {
    let index = Arc::new(MemoryIndex::new());
    let (channel, _deliveries) = FakeChannel::failing_publish();
    let cancel = CancellationToken::new();

    let handle = gossip(&index, Duration::from_secs(1))
        .start(&channel, Arc::new(FakeLink::connected()), cancel.clone())
        .await
        .unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("gossip tasks should end after a failed publish");

    assert!(matches!(exit.announcer, Err(GossipError::Publish { .. })));
    assert_eq!(exit.listener, Ok(()));
    assert!(channel.position(&Event::Unsubscribe) < channel.position(&Event::Close));
    assert_eq!(channel.count(&Event::Close), 1);
    assert!(!cancel.is_cancelled());
}
