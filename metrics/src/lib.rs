pub mod server;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Outcome label for a received gossip announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Published by this node.
    OwnMessage,
    /// Already present in the index.
    Duplicate,
    /// Fetched from a peer and stored.
    Fetched,
    /// Fetch gave up.
    FetchFailed,
    /// Payload was not a transaction id.
    Malformed,
}

impl ReceiveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiveOutcome::OwnMessage => "self",
            ReceiveOutcome::Duplicate => "duplicate",
            ReceiveOutcome::Fetched => "fetched",
            ReceiveOutcome::FetchFailed => "failed",
            ReceiveOutcome::Malformed => "malformed",
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    peers: IntGauge,
    peer_connection_events: IntCounterVec,
    peer_disconnection_events: IntCounterVec,
    // Gossip
    txs_announced: IntCounter,
    txs_received: IntCounterVec,
    tx_fetch_attempts: IntCounterVec,
    tx_fetch_time: HistogramVec,
    tx_index_size: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let peers = IntGauge::with_opts(Opts::new("network_peers_connected", "Number of connected peers")).unwrap();
        registry.register(Box::new(peers.clone())).unwrap();

        // Network
        let peer_connection_events = IntCounterVec::new(
            Opts::new("gossip_peer_connection_events_total", "Total number of peer connection events"),
            &["direction"],
        ).unwrap();
        registry.register(Box::new(peer_connection_events.clone())).unwrap();

        let peer_disconnection_events = IntCounterVec::new(
            Opts::new("gossip_peer_disconnection_events_total", "Total number of peer disconnection events"),
            &["reason"],
        ).unwrap();
        registry.register(Box::new(peer_disconnection_events.clone())).unwrap();

        // Gossip
        let txs_announced = IntCounter::with_opts(
            Opts::new("gossip_txs_announced_total", "Total number of transactions minted and announced"),
        ).unwrap();
        registry.register(Box::new(txs_announced.clone())).unwrap();

        let txs_received = IntCounterVec::new(
            Opts::new("gossip_txs_received_total", "Total number of transaction announcements received"),
            &["outcome"],
        ).unwrap();
        registry.register(Box::new(txs_received.clone())).unwrap();

        let tx_fetch_attempts = IntCounterVec::new(
            Opts::new("gossip_tx_fetch_attempts_total", "Total number of transaction fetch attempts"),
            &["result"],
        ).unwrap();
        registry.register(Box::new(tx_fetch_attempts.clone())).unwrap();

        let tx_fetch_time = HistogramVec::new(
            HistogramOpts::new("gossip_tx_fetch_time_seconds", "Time taken to fetch a transaction body, retries included")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(tx_fetch_time.clone())).unwrap();

        let tx_index_size = IntGauge::with_opts(Opts::new("gossip_tx_index_size", "Number of transactions in the local index")).unwrap();
        registry.register(Box::new(tx_index_size.clone())).unwrap();

        Self {
            registry,
            peers,
            peer_connection_events,
            peer_disconnection_events,
            txs_announced,
            txs_received,
            tx_fetch_attempts,
            tx_fetch_time,
            tx_index_size,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics not utf8")
    }

    pub fn set_peers(&self, v: i64) {
        self.peers.set(v);
    }

    // Network
    pub fn inc_peer_connection(&self, direction: &str) {
        self.peer_connection_events.with_label_values(&[direction]).inc();
    }

    pub fn inc_peer_disconnection(&self, reason: &str) {
        self.peer_disconnection_events.with_label_values(&[reason]).inc();
    }

    // Gossip
    pub fn inc_txs_announced(&self) {
        self.txs_announced.inc();
    }

    pub fn inc_txs_received(&self, outcome: ReceiveOutcome) {
        self.txs_received.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn inc_tx_fetch_attempt(&self, result: &str) {
        self.tx_fetch_attempts.with_label_values(&[result]).inc();
    }

    pub fn observe_tx_fetch_time(&self, duration: f64) {
        self.tx_fetch_time.with_label_values::<&str>(&[]).observe(duration);
    }

    pub fn set_tx_index_size(&self, v: i64) {
        self.tx_index_size.set(v);
    }

    pub fn txs_announced(&self) -> u64 {
        self.txs_announced.get()
    }

    pub fn txs_received(&self, outcome: ReceiveOutcome) -> u64 {
        self.txs_received.with_label_values(&[outcome.as_str()]).get()
    }

    /// Total seconds recorded by the fetch time histogram.
    pub fn tx_fetch_time_sum(&self) -> f64 {
        self.tx_fetch_time.with_label_values::<&str>(&[]).get_sample_sum()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<Metrics>;
