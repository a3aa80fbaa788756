use std::{
    collections::HashMap,
    net::IpAddr,
    num::{NonZeroU8, NonZeroUsize},
    sync::Arc,
};

use anyhow::{Result, anyhow};
use containers::TransactionBody;
use futures::StreamExt;
use libp2p::{
    Multiaddr, SwarmBuilder,
    connection_limits::{self, ConnectionLimits},
    gossipsub::{
        Event, IdentTopic, MessageAcceptance, MessageAuthenticity, PublishError, TopicHash,
    },
    identify,
    multiaddr::Protocol,
    request_response::{OutboundFailure, OutboundRequestId},
    swarm::{Config, Swarm, SwarmEvent},
};
use libp2p_identity::{Keypair, PeerId};
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tx_index::SharedIndex;

use crate::{
    bootnodes::{BootnodeSource, StaticBootnodes},
    compressor::Compressor,
    error::{FetchError, GossipError},
    gossipsub::{self, config::GossipsubConfig, message::GossipsubMessage, topic::GossipsubTopic},
    network::behaviour::{NodeBehaviour, NodeBehaviourEvent},
    network::handle::NetworkHandle,
    req_resp::{self, ReqRespMessage, TX_BY_ID_PROTOCOL_V1, TxRequest, TxResponse},
    types::{ConnectionState, GossipMessage, NetworkCommand, PeerTable, Reply, SubscriptionId},
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

const RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct NetworkServiceConfig {
    pub gossipsub_config: GossipsubConfig,
    pub socket_address: IpAddr,
    pub socket_port: u16,
    pub network: String,
    /// Upper bound the swarm puts on one fetch request.
    pub request_timeout: Duration,
    bootnodes: StaticBootnodes,
}

impl NetworkServiceConfig {
    pub fn new(
        mut gossipsub_config: GossipsubConfig,
        socket_address: IpAddr,
        socket_port: u16,
        bootnodes: Vec<String>,
        network: String,
    ) -> Self {
        gossipsub_config.set_topics(gossipsub::get_topics(network.clone()));

        NetworkServiceConfig {
            gossipsub_config,
            socket_address,
            socket_port,
            network,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            bootnodes: StaticBootnodes::from_args(&bootnodes),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn bootnodes(&self) -> &StaticBootnodes {
        &self.bootnodes
    }
}

type Subscribers = Vec<(SubscriptionId, mpsc::UnboundedSender<GossipMessage>)>;

/// Owns the swarm. Everything else talks to it through a [`NetworkHandle`].
pub struct NetworkService {
    network_config: Arc<NetworkServiceConfig>,
    swarm: Swarm<NodeBehaviour>,
    peer_table: Arc<Mutex<PeerTable>>,
    index: SharedIndex,
    metrics: Option<SharedMetrics>,
    command_tx: mpsc::UnboundedSender<NetworkCommand>,
    commands: mpsc::UnboundedReceiver<NetworkCommand>,
    // Join count per topic. The swarm is subscribed while it is non-zero.
    joined: HashMap<TopicHash, usize>,
    subscribers: HashMap<TopicHash, Subscribers>,
    next_subscription: SubscriptionId,
    pending_fetches: HashMap<OutboundRequestId, Reply<TransactionBody, FetchError>>,
}

impl NetworkService {
    pub fn new(
        network_config: Arc<NetworkServiceConfig>,
        index: SharedIndex,
        metrics: Option<SharedMetrics>,
    ) -> Result<Self> {
        let local_key = Keypair::generate_secp256k1();
        Self::new_with_keypair(network_config, index, metrics, local_key)
    }

    pub fn new_with_keypair(
        network_config: Arc<NetworkServiceConfig>,
        index: SharedIndex,
        metrics: Option<SharedMetrics>,
        local_key: Keypair,
    ) -> Result<Self> {
        let behaviour = Self::build_behaviour(&local_key, &network_config)?;

        let config = Config::with_tokio_executor()
            .with_notify_handler_buffer_size(
                NonZeroUsize::new(7).ok_or_else(|| anyhow!("invalid handler buffer size"))?,
            )
            .with_per_connection_event_buffer_size(4)
            .with_dial_concurrency_factor(
                NonZeroU8::new(1).ok_or_else(|| anyhow!("invalid dial concurrency factor"))?,
            );

        let multiaddr = Self::multiaddr(&network_config);
        let swarm = SwarmBuilder::with_existing_identity(local_key)
            .with_tokio()
            .with_quic()
            .with_behaviour(|_| behaviour)?
            .with_swarm_config(|_| config)
            .build();

        let (command_tx, commands) = mpsc::unbounded_channel();

        let mut service = Self {
            network_config,
            swarm,
            peer_table: Arc::new(Mutex::new(HashMap::new())),
            index,
            metrics,
            command_tx,
            commands,
            joined: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscription: 0,
            pending_fetches: HashMap::new(),
        };

        service.listen(&multiaddr)?;

        Ok(service)
    }

    /// Cloneable front end used by the gossip tasks.
    pub fn handle(&self) -> NetworkHandle {
        NetworkHandle::new(
            self.command_tx.clone(),
            self.peer_table.clone(),
            self.local_peer_id(),
            self.network_config.gossipsub_config.topics.clone(),
        )
    }

    /// Drives the swarm until `cancel` fires.
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        // Periodic reconnect attempts to bootnodes
        let mut reconnect_interval = interval(RECONNECT_INTERVAL);
        reconnect_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Network service stopping");
                    break;
                }
                _ = reconnect_interval.tick() => {
                    self.connect_to_peers(self.network_config.bootnodes.to_multiaddrs());
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event);
                }
            }
        }

        // Outstanding fetches resolve as failed once their reply senders drop.
        self.pending_fetches.clear();
        self.subscribers.clear();

        Ok(())
    }

    fn handle_command(&mut self, command: NetworkCommand) {
        match command {
            NetworkCommand::Join { topic, reply } => {
                let _ = reply.send(self.join(topic));
            }
            NetworkCommand::Leave { topic, reply } => {
                self.leave(&topic);
                let _ = reply.send(Ok(()));
            }
            NetworkCommand::Publish { topic, data, reply } => {
                let _ = reply.send(self.publish(topic, data));
            }
            NetworkCommand::Subscribe { topic, reply } => {
                let id = self.next_subscription;
                self.next_subscription += 1;

                let (tx, rx) = mpsc::unbounded_channel();
                self.subscribers.entry(topic.hash()).or_default().push((id, tx));
                debug!(topic = %topic, subscription = id, "Opened subscription");

                let _ = reply.send(Ok((id, rx)));
            }
            NetworkCommand::Unsubscribe {
                topic,
                subscription,
                reply,
            } => {
                remove_subscriber(&mut self.subscribers, &topic, subscription);
                debug!(topic = %topic, subscription, "Closed subscription");
                let _ = reply.send(());
            }
            NetworkCommand::FetchTransaction { peer, id, reply } => {
                trace!(%peer, tx_id = %id, "Sending transaction request");
                let request_id = self
                    .swarm
                    .behaviour_mut()
                    .req_resp
                    .send_request(&peer, TxRequest(id));
                self.pending_fetches.insert(request_id, reply);
            }
        }
    }

    fn join(&mut self, topic: GossipsubTopic) -> Result<(), GossipError> {
        let hash = topic.hash();
        let count = self.joined.get(&hash).copied().unwrap_or(0);

        if count == 0 {
            self.swarm
                .behaviour_mut()
                .gossipsub
                .subscribe(&IdentTopic::from(topic.clone()))
                .map_err(|err| GossipError::Join {
                    topic: topic.to_string(),
                    reason: format!("{err:?}"),
                })?;
            info!(topic = %topic, "Subscribed to topic");
        }

        self.joined.insert(hash, count + 1);
        Ok(())
    }

    fn leave(&mut self, topic: &GossipsubTopic) {
        let hash = topic.hash();
        let Some(count) = self.joined.get_mut(&hash) else {
            return;
        };

        *count -= 1;
        if *count == 0 {
            self.joined.remove(&hash);
            let _ = self
                .swarm
                .behaviour_mut()
                .gossipsub
                .unsubscribe(&IdentTopic::from(topic.clone()));
            info!(topic = %topic, "Unsubscribed from topic");
        }
    }

    fn publish(&mut self, topic: GossipsubTopic, data: Vec<u8>) -> Result<(), GossipError> {
        match self
            .swarm
            .behaviour_mut()
            .gossipsub
            .publish(IdentTopic::from(topic.clone()), data)
        {
            Ok(_) => Ok(()),
            Err(err) if is_benign_publish_error(&err) => {
                debug!(topic = %topic, ?err, "Publish not propagated");
                Ok(())
            }
            Err(err) => Err(GossipError::Publish {
                topic: topic.to_string(),
                reason: format!("{err:?}"),
            }),
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(NodeBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub_event(event)
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::ReqResp(event)) => {
                self.handle_request_response_event(event)
            }
            SwarmEvent::Behaviour(NodeBehaviourEvent::Identify(event)) => {
                self.handle_identify_event(event)
            }
            SwarmEvent::Behaviour(_) => {
                // ConnectionLimits behaviour has no events
            }
            SwarmEvent::ConnectionEstablished {
                peer_id, endpoint, ..
            } => {
                self.peer_table
                    .lock()
                    .insert(peer_id, ConnectionState::Connected);

                let connected = self.connected_peers();
                let direction = if endpoint.is_dialer() {
                    "outbound"
                } else {
                    "inbound"
                };
                if let Some(metrics) = &self.metrics {
                    metrics.set_peers(connected as i64);
                    metrics.inc_peer_connection(direction);
                }

                info!(peer = %peer_id, direction, "Connected to peer (total: {})", connected);
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                cause,
                ..
            } => {
                if num_established > 0 {
                    return;
                }

                self.peer_table
                    .lock()
                    .insert(peer_id, ConnectionState::Disconnected);

                let connected = self.connected_peers();
                if let Some(metrics) = &self.metrics {
                    metrics.set_peers(connected as i64);
                    metrics.inc_peer_disconnection(if cause.is_some() { "error" } else { "closed" });
                }

                info!(peer = %peer_id, ?cause, "Disconnected from peer (total: {})", connected);
            }
            SwarmEvent::IncomingConnection { local_addr, .. } => {
                debug!(?local_addr, "Incoming connection");
            }
            SwarmEvent::Dialing { peer_id, .. } => {
                debug!(?peer_id, "Dialing peer");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                if let Some(peer_id) = peer_id {
                    self.peer_table
                        .lock()
                        .insert(peer_id, ConnectionState::Disconnected);
                }
                warn!(?peer_id, ?error, "Failed to connect to peer");
            }
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                info!(?listener_id, ?address, "New listen address");
            }
            SwarmEvent::NewExternalAddrCandidate { address } => {
                info!(?address, "New external address candidate");
                self.swarm.add_external_address(address);
            }
            _ => {
                trace!(?event, "Unhandled swarm event");
            }
        }
    }

    fn handle_gossipsub_event(&mut self, event: Event) {
        match event {
            Event::Subscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer subscribed to topic");
            }
            Event::Unsubscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer unsubscribed from topic");
            }
            Event::Message {
                propagation_source,
                message_id,
                message,
                ..
            } => {
                let acceptance = validate_gossip(&message.topic, &message.data);
                let accepted = matches!(acceptance, MessageAcceptance::Accept);
                let reported = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .report_message_validation_result(&message_id, &propagation_source, acceptance);
                trace!(?message_id, accepted, ?reported, "Reported gossip validation");

                if !accepted {
                    return;
                }

                let Some(subscribers) = self.subscribers.get_mut(&message.topic) else {
                    trace!(topic = %message.topic, "No local subscribers for message");
                    return;
                };

                let delivery = GossipMessage::new(message.data, message.source, propagation_source);
                subscribers.retain(|(_, tx)| tx.send(delivery.clone()).is_ok());
                if subscribers.is_empty() {
                    self.subscribers.remove(&message.topic);
                }
            }
            _ => {
                debug!(?event, "Unhandled gossipsub event");
            }
        }
    }

    fn handle_request_response_event(&mut self, event: ReqRespMessage) {
        use libp2p::request_response::{Event, Message};

        match event {
            Event::Message { peer, message, .. } => match message {
                Message::Request {
                    request: TxRequest(id),
                    channel,
                    ..
                } => {
                    let response = match self.index.get(&id) {
                        Some(body) => TxResponse::Found(body),
                        None => TxResponse::NotFound,
                    };
                    debug!(peer = %peer, tx_id = %id, found = matches!(response, TxResponse::Found(_)), "Received transaction request");

                    if let Err(response) = self
                        .swarm
                        .behaviour_mut()
                        .req_resp
                        .send_response(channel, response)
                    {
                        warn!(peer = %peer, ?response, "Failed to send response");
                    }
                }
                Message::Response {
                    request_id,
                    response,
                } => {
                    let Some(reply) = self.pending_fetches.remove(&request_id) else {
                        warn!(peer = %peer, ?request_id, "Response for unknown request");
                        return;
                    };

                    let result = match response {
                        TxResponse::Found(body) => Ok(body),
                        TxResponse::NotFound => Err(FetchError::NotFound),
                    };
                    let _ = reply.send(result);
                }
            },
            Event::OutboundFailure {
                peer,
                request_id,
                error,
                ..
            } => {
                debug!(peer = %peer, ?error, "Request failed");

                if let Some(reply) = self.pending_fetches.remove(&request_id) {
                    let _ = reply.send(Err(self.fetch_error(error)));
                }
            }
            Event::InboundFailure { peer, error, .. } => {
                warn!(peer = %peer, ?error, "Inbound request failed");
            }
            Event::ResponseSent { peer, .. } => {
                trace!(peer = %peer, "Response sent");
            }
        }
    }

    fn fetch_error(&self, error: OutboundFailure) -> FetchError {
        match error {
            OutboundFailure::DialFailure | OutboundFailure::ConnectionClosed => {
                FetchError::Disconnected
            }
            OutboundFailure::Timeout => FetchError::Timeout(self.network_config.request_timeout),
            other => FetchError::Request(format!("{other:?}")),
        }
    }

    fn handle_identify_event(&mut self, event: identify::Event) {
        match event {
            identify::Event::Received { peer_id, info, .. } => {
                debug!(
                    peer = %peer_id,
                    agent_version = %info.agent_version,
                    protocol_version = %info.protocol_version,
                    listen_addrs = info.listen_addrs.len(),
                    "Received peer info"
                );
            }
            identify::Event::Error { peer_id, error, .. } => {
                warn!(peer = %peer_id, ?error, "Identify error");
            }
            _ => {}
        }
    }

    fn connect_to_peers(&mut self, peers: Vec<Multiaddr>) {
        if peers.is_empty() {
            return;
        }

        debug!(?peers, "Connecting to bootnodes");
        for peer in peers {
            let Some(Protocol::P2p(peer_id)) = peer
                .iter()
                .find(|protocol| matches!(protocol, Protocol::P2p(_)))
            else {
                warn!(addr = %peer, "Bootnode address has no peer id, skipping");
                continue;
            };

            if peer_id == self.local_peer_id() {
                continue;
            }

            let current_state = self.peer_table.lock().get(&peer_id).cloned();
            if !matches!(current_state, Some(ConnectionState::Disconnected) | None) {
                trace!(?peer_id, "Already connected");
                continue;
            }

            if let Err(err) = self.swarm.dial(peer.clone()) {
                warn!(?err, "Failed to dial peer");
                continue;
            }

            info!(peer = %peer_id, "Dialing peer");
            self.peer_table
                .lock()
                .insert(peer_id, ConnectionState::Connecting);
        }
    }

    fn connected_peers(&self) -> usize {
        self.peer_table
            .lock()
            .values()
            .filter(|s| **s == ConnectionState::Connected)
            .count()
    }

    pub fn peer_table(&self) -> Arc<Mutex<PeerTable>> {
        self.peer_table.clone()
    }

    pub fn local_peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    pub fn swarm_mut(&mut self) -> &mut Swarm<NodeBehaviour> {
        &mut self.swarm
    }

    fn build_behaviour(local_key: &Keypair, cfg: &NetworkServiceConfig) -> Result<NodeBehaviour> {
        let identify = Self::build_identify(local_key);
        // Signed so that receivers learn the publishing peer.
        let gossipsub = gossipsub::GossipsubBehaviour::new_with_transform(
            MessageAuthenticity::Signed(local_key.clone()),
            cfg.gossipsub_config.config.clone(),
            Compressor::default(),
        )
        .map_err(|err| anyhow!("Failed to create gossipsub behaviour: {err:?}"))?;

        let req_resp = req_resp::build(
            vec![TX_BY_ID_PROTOCOL_V1.to_string()],
            cfg.request_timeout,
        );

        let connection_limits = connection_limits::Behaviour::new(
            ConnectionLimits::default()
                .with_max_pending_incoming(Some(5))
                .with_max_pending_outgoing(Some(16))
                .with_max_established_per_peer(Some(2)),
        );

        Ok(NodeBehaviour {
            identify,
            req_resp,
            gossipsub,
            connection_limits,
        })
    }

    fn build_identify(local_key: &Keypair) -> identify::Behaviour {
        let identify_config =
            identify::Config::new("/gossipnode/1.0.0".into(), local_key.public())
                .with_agent_version(format!("gossip_node/{}", env!("CARGO_PKG_VERSION")))
                .with_cache_size(0);

        identify::Behaviour::new(identify_config)
    }

    fn multiaddr(cfg: &NetworkServiceConfig) -> Multiaddr {
        let mut addr: Multiaddr = cfg.socket_address.into();
        addr.push(Protocol::Udp(cfg.socket_port));
        addr.push(Protocol::QuicV1);
        addr
    }

    fn listen(&mut self, addr: &Multiaddr) -> Result<()> {
        self.swarm
            .listen_on(addr.clone())
            .map_err(|e| anyhow!("Failed to listen on {addr:?}: {e:?}"))?;
        info!(?addr, "Listening on");
        Ok(())
    }
}

/// Decides whether a gossip message is delivered locally and forwarded.
fn validate_gossip(topic: &TopicHash, data: &[u8]) -> MessageAcceptance {
    match GossipsubMessage::decode(topic, data) {
        Ok(_) => MessageAcceptance::Accept,
        Err(err) => {
            warn!(%err, %topic, "gossip decode failed");
            MessageAcceptance::Reject
        }
    }
}

fn remove_subscriber(
    subscribers: &mut HashMap<TopicHash, Subscribers>,
    topic: &TopicHash,
    subscription: SubscriptionId,
) {
    if let Some(list) = subscribers.get_mut(topic) {
        list.retain(|(id, _)| *id != subscription);
        if list.is_empty() {
            subscribers.remove(topic);
        }
    }
}

/// Publish errors that only mean nobody else saw the message.
///
/// Matched on the debug rendering since the variant set differs between
/// gossipsub releases.
fn is_benign_publish_error(err: &PublishError) -> bool {
    let err = format!("{err:?}");
    ["Duplicate", "InsufficientPeers", "NoPeersSubscribedToTopic"]
        .iter()
        .any(|benign| err.contains(benign))
}
