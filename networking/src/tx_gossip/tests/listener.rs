use std::sync::Arc;
use std::time::Duration;

use containers::{TransactionBody, TransactionId};
use libp2p_identity::PeerId;
use metrics::{Metrics, ReceiveOutcome};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tx_index::{MemoryIndex, SharedIndex, TransactionIndex};

use super::fakes::{FakeLink, FakeSubscription, FakeChannel, announcement};
use crate::channel::TopicHandle;
use crate::error::GossipError;
use crate::tx_gossip::fetcher::{FetchPolicy, Fetcher};
use crate::tx_gossip::listener::Listener;

struct Setup {
    index: Arc<MemoryIndex>,
    link: Arc<FakeLink>,
    listener: Listener<FakeLink>,
    local: PeerId,
}

fn setup(link: FakeLink) -> Setup {
    let index = Arc::new(MemoryIndex::new());
    let link = Arc::new(link);
    let local = PeerId::random();
    let shared: SharedIndex = index.clone();
    let listener = Listener::new(
        shared,
        Fetcher::new(link.clone(), FetchPolicy::default()),
        local,
    );

    Setup {
        index,
        link,
        listener,
        local,
    }
}

#[tokio::test(start_paused = true)]
async fn test_known_id_is_not_fetched() {
    let id = TransactionId::random();
    let setup = setup(FakeLink::connected().with_body(id, TransactionBody::new(vec![1])));
    let _ = setup.index.store(&id, TransactionBody::new(vec![1]));

    let peer = PeerId::random();
    let outcome = setup
        .listener
        .handle_message(announcement(id, peer, peer), &CancellationToken::new())
        .await;

    assert_eq!(outcome, ReceiveOutcome::Duplicate);
    assert!(setup.link.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_own_announcement_is_ignored() {
    let id = TransactionId::random();
    let setup = setup(FakeLink::connected().with_body(id, TransactionBody::new(vec![1])));

    let outcome = setup
        .listener
        .handle_message(
            announcement(id, setup.local, PeerId::random()),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, ReceiveOutcome::OwnMessage);
    assert!(setup.link.requests().is_empty());
    assert!(!setup.index.have(&id));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_skipped() {
    let setup = setup(FakeLink::connected());
    let peer = PeerId::random();

    let outcome = setup
        .listener
        .handle_message(
            crate::types::GossipMessage::new(vec![1, 2, 3], Some(peer), peer),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, ReceiveOutcome::Malformed);
    assert!(setup.link.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_from_disconnected_peer_is_fetched_and_stored() {
    let id = TransactionId::random();
    let body = TransactionBody::new(b"body C".to_vec());
    let setup = setup(FakeLink::disconnected().with_body(id, body.clone()));
    let origin = PeerId::random();
    let relay = PeerId::random();
    let start = Instant::now();

    let outcome = setup
        .listener
        .handle_message(announcement(id, origin, relay), &CancellationToken::new())
        .await;

    assert_eq!(outcome, ReceiveOutcome::Fetched);
    assert_eq!(setup.index.get(&id), Some(body));

    let requests = setup.link.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].peer, relay);
    assert_eq!(requests[0].id, id);
    assert!(requests[0].at.duration_since(start) >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_metrics_count_outcomes() {
    let id = TransactionId::random();
    let metrics = Arc::new(Metrics::new());
    let setup = setup(FakeLink::connected().with_body(id, TransactionBody::new(vec![9; 10])));
    let listener = setup.listener.with_metrics(Some(metrics.clone()));
    let peer = PeerId::random();
    let cancel = CancellationToken::new();

    listener.handle_message(announcement(id, peer, peer), &cancel).await;
    listener.handle_message(announcement(id, peer, peer), &cancel).await;

    assert_eq!(metrics.txs_received(ReceiveOutcome::Fetched), 1);
    assert_eq!(metrics.txs_received(ReceiveOutcome::Duplicate), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_does_not_block_next_message() {
    let missing = TransactionId::random();
    let present = TransactionId::random();
    let body = TransactionBody::new(vec![7; 10]);
    let setup = setup(FakeLink::connected().with_body(present, body.clone()));

    let (channel, deliveries) = FakeChannel::new();
    let subscription: FakeSubscription = channel.topic("txs").subscribe().await.unwrap();

    let peer = PeerId::random();
    deliveries.send(Ok(announcement(missing, peer, peer))).unwrap();
    deliveries.send(Ok(announcement(present, peer, peer))).unwrap();

    let cancel = CancellationToken::new();
    let (done_tx, done_rx) = oneshot::channel();
    let task = tokio::spawn(setup.listener.run(subscription, cancel.clone(), done_tx));

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), Ok(()));
    assert!(done_rx.await.is_ok());

    assert_eq!(setup.link.requests_for(&missing), 10);
    assert!(!setup.index.have(&missing));
    assert_eq!(setup.index.get(&present), Some(body));
}

#[tokio::test(start_paused = true)]
async fn test_delivery_error_stops_listener() {
    let setup = setup(FakeLink::connected());
    let (channel, deliveries) = FakeChannel::new();
    let subscription = channel.topic("txs").subscribe().await.unwrap();

    deliveries
        .send(Err(GossipError::Delivery("stream reset".to_string())))
        .unwrap();

    let (done_tx, done_rx) = oneshot::channel();
    let result = setup
        .listener
        .run(subscription, CancellationToken::new(), done_tx)
        .await;

    assert_eq!(result, Err(GossipError::Delivery("stream reset".to_string())));
    assert!(done_rx.await.is_ok());
    assert_eq!(channel.count(&super::fakes::Event::Unsubscribe), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_is_clean_exit() {
    let setup = setup(FakeLink::connected());
    let (channel, _deliveries) = FakeChannel::new();
    let subscription = channel.topic("txs").subscribe().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (done_tx, done_rx) = oneshot::channel();
    let result = setup.listener.run(subscription, cancel, done_tx).await;

    assert_eq!(result, Ok(()));
    assert!(done_rx.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_messages_processed_in_delivery_order() {
    let first = TransactionId::random();
    let second = TransactionId::random();
    let setup = setup(
        FakeLink::connected()
            .with_body(first, TransactionBody::new(vec![1]))
            .with_body(second, TransactionBody::new(vec![2])),
    );
    let (channel, deliveries): (_, mpsc::UnboundedSender<_>) = FakeChannel::new();
    let subscription = channel.topic("txs").subscribe().await.unwrap();

    let peer = PeerId::random();
    deliveries.send(Ok(announcement(first, peer, peer))).unwrap();
    deliveries.send(Ok(announcement(second, peer, peer))).unwrap();

    let cancel = CancellationToken::new();
    let (done_tx, _done_rx) = oneshot::channel();
    let task = tokio::spawn(setup.listener.run(subscription, cancel.clone(), done_tx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    let requested: Vec<_> = setup.link.requests().iter().map(|r| r.id).collect();
    assert_eq!(requested, vec![first, second]);
}
