//! [`DhtNode`]: a [`DhtTransport`] implemented over a libp2p swarm.
//!
//! Uses a command-channel architecture: [`DhtNode`] sends commands over an
//! mpsc channel to a background swarm task running on tokio, bridging the
//! async [`DhtTransport`] trait with the libp2p event loop. Incoming events
//! (stores, broadcasts) are dispatched straight into the registered
//! [`DhtHandlers`] from inside that task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use libp2p::futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic};
use libp2p::identity::Keypair;
use libp2p::kad::{self, QueryId, Quorum, Record, RecordKey};
use libp2p::multiaddr::Protocol;
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, mdns, Multiaddr, PeerId, StreamProtocol, SwarmBuilder};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use chaindht_core::hash::Hash32;

use crate::behaviour::{self, ChaindhtBehaviour, ChaindhtBehaviourEvent, ValidatingStore, PROTOCOL_VERSION};
use crate::config::NetworkConfig;
use crate::error::DhtError;
use crate::protocol::{CustomCommand, BROADCAST_TOPIC};
use crate::transport::{DhtHandlers, DhtTransport, StoreResult};

/// Commands sent from [`DhtNode`] to the background swarm task.
enum Command {
    PutRecord { key: RecordKey, value: Vec<u8>, respond: oneshot::Sender<Result<usize, DhtError>> },
    GetRecord { key: RecordKey, respond: oneshot::Sender<Result<Vec<u8>, DhtError>> },
    Broadcast(CustomCommand),
    Shutdown,
}

struct SharedState {
    peer_count: AtomicUsize,
    running: AtomicBool,
}

/// DHT transport implemented over a libp2p swarm.
pub struct DhtNode {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
    local_peer_id: PeerId,
}

impl std::fmt::Debug for DhtNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhtNode")
            .field("peer_id", &self.local_peer_id)
            .field("peer_count", &self.state.peer_count.load(Ordering::Relaxed))
            .field("running", &self.state.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl DhtNode {
    /// Start the transport, spawning a background tokio task that runs the
    /// libp2p swarm event loop and dispatches inbound events to `handlers`.
    pub async fn start(config: NetworkConfig, handlers: Arc<dyn DhtHandlers>) -> Result<Self, DhtError> {
        let keypair = Keypair::generate_ed25519();
        let local_peer_id = PeerId::from(keypair.public());
        info!(%local_peer_id, "starting dht transport");

        let gossipsub = behaviour::build_gossipsub(config.gossipsub_heartbeat)
            .map_err(|reason| DhtError::PutFailed { reason })?;

        let kad_config = kad::Config::new(
            StreamProtocol::try_from_owned(String::from_utf8_lossy(behaviour::KAD_PROTOCOL).into_owned())
                .map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?,
        );
        let store = ValidatingStore::new(local_peer_id, Arc::clone(&handlers));
        let kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);

        let identify = identify::Behaviour::new(identify::Config::new(PROTOCOL_VERSION.to_string(), keypair.public()));

        let mdns = if config.enable_mdns {
            Some(
                mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)
                    .map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?,
            )
        } else {
            None
        };

        let chaindht_behaviour = ChaindhtBehaviour { gossipsub, kademlia, identify, mdns: mdns.into() };

        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(libp2p::tcp::Config::default(), libp2p::noise::Config::new, libp2p::yamux::Config::default)
            .map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?
            .with_behaviour(|_| Ok(chaindht_behaviour))
            .map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?
            .build();

        let topic = IdentTopic::new(BROADCAST_TOPIC);
        swarm.behaviour_mut().gossipsub.subscribe(&topic).map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?;

        let listen_addr: Multiaddr =
            config.listen_multiaddr().parse().map_err(|e: libp2p::multiaddr::Error| DhtError::InvalidListenAddr(e.to_string()))?;
        swarm.listen_on(listen_addr).map_err(|e| DhtError::InvalidListenAddr(e.to_string()))?;

        if let Some(peer_addr) = &config.bootstrap_peer {
            let addr: Multiaddr = peer_addr.parse().map_err(|_| DhtError::InvalidBootstrapAddr(peer_addr.clone()))?;
            if let Some(Protocol::P2p(peer_id)) = addr.iter().last() {
                swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
            }
            let _ = swarm.dial(addr);
            let _ = swarm.behaviour_mut().kademlia.bootstrap();
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState { peer_count: AtomicUsize::new(0), running: AtomicBool::new(true) });

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            swarm_event_loop(swarm, command_rx, handlers, state_clone).await;
        });

        Ok(Self { command_tx, state, local_peer_id })
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    pub fn peer_count(&self) -> usize {
        self.state.peer_count.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

fn hash_to_key(hash: Hash32) -> RecordKey {
    RecordKey::new(hash.as_bytes())
}

#[async_trait::async_trait]
impl DhtTransport for DhtNode {
    async fn store_at(&self, key: Hash32, value: Vec<u8>) -> Result<StoreResult, DhtError> {
        let (respond, rx) = oneshot::channel();
        self.command_tx
            .send(Command::PutRecord { key: hash_to_key(key), value, respond })
            .map_err(|_| DhtError::TransportStopped)?;
        let peers_stored = rx.await.map_err(|_| DhtError::TransportStopped)??;
        Ok(StoreResult { peers_stored, replication_factor: kad::K_VALUE.get() })
    }

    async fn get(&self, key: Hash32) -> Result<Vec<u8>, DhtError> {
        let (respond, rx) = oneshot::channel();
        self.command_tx.send(Command::GetRecord { key: hash_to_key(key), respond }).map_err(|_| DhtError::TransportStopped)?;
        rx.await.map_err(|_| DhtError::TransportStopped)?
    }

    async fn broadcast(&self, cmd: CustomCommand) {
        let _ = self.command_tx.send(Command::Broadcast(cmd));
    }

    fn connected_peer_count(&self) -> usize {
        self.peer_count()
    }
}

/// Background task running the libp2p swarm event loop: serves commands
/// from [`DhtNode`] and dispatches inbound network events into `handlers`.
async fn swarm_event_loop(
    mut swarm: libp2p::Swarm<ChaindhtBehaviour>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    handlers: Arc<dyn DhtHandlers>,
    state: Arc<SharedState>,
) {
    let mut pending_puts: HashMap<QueryId, oneshot::Sender<Result<usize, DhtError>>> = HashMap::new();
    let mut pending_gets: HashMap<QueryId, oneshot::Sender<Result<Vec<u8>, DhtError>>> = HashMap::new();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::PutRecord { key, value, respond }) => {
                        let record = Record::new(key, value);
                        match swarm.behaviour_mut().kademlia.put_record(record, Quorum::One) {
                            Ok(id) => { pending_puts.insert(id, respond); }
                            Err(e) => { let _ = respond.send(Err(DhtError::PutFailed { reason: e.to_string() })); }
                        }
                    }
                    Some(Command::GetRecord { key, respond }) => {
                        let id = swarm.behaviour_mut().kademlia.get_record(key);
                        pending_gets.insert(id, respond);
                    }
                    Some(Command::Broadcast(cmd)) => {
                        let topic = IdentTopic::new(BROADCAST_TOPIC);
                        if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, cmd.encode()) {
                            debug!("gossipsub publish error: {e}");
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        info!("shutting down dht transport");
                        state.running.store(false, Ordering::Relaxed);
                        break;
                    }
                }
            }
            event = swarm.next() => {
                let Some(event) = event else {
                    state.running.store(false, Ordering::Relaxed);
                    break;
                };
                handle_swarm_event(event, &mut swarm, &handlers, &state, &mut pending_puts, &mut pending_gets);
            }
        }
    }
}

fn handle_swarm_event(
    event: SwarmEvent<ChaindhtBehaviourEvent>,
    swarm: &mut libp2p::Swarm<ChaindhtBehaviour>,
    handlers: &Arc<dyn DhtHandlers>,
    state: &Arc<SharedState>,
    pending_puts: &mut HashMap<QueryId, oneshot::Sender<Result<usize, DhtError>>>,
    pending_gets: &mut HashMap<QueryId, oneshot::Sender<Result<Vec<u8>, DhtError>>>,
) {
    match event {
        SwarmEvent::Behaviour(ChaindhtBehaviourEvent::Gossipsub(gossipsub::Event::Message { message, .. })) => {
            if let Some(cmd) = CustomCommand::decode(&message.data) {
                let _ = handlers.on_custom_cmd(cmd);
            } else {
                let _ = handlers.on_broadcast(&message.data);
            }
        }
        SwarmEvent::Behaviour(ChaindhtBehaviourEvent::Kademlia(kad::Event::OutboundQueryProgressed { id, result, .. })) => {
            match result {
                kad::QueryResult::PutRecord(Ok(kad::PutRecordOk { .. })) => {
                    if let Some(respond) = pending_puts.remove(&id) {
                        let _ = respond.send(Ok(1));
                    }
                }
                kad::QueryResult::PutRecord(Err(e)) => {
                    if let Some(respond) = pending_puts.remove(&id) {
                        let _ = respond.send(Err(DhtError::PutFailed { reason: e.to_string() }));
                    }
                }
                kad::QueryResult::GetRecord(Ok(kad::GetRecordOk::FoundRecord(peer_record))) => {
                    if let Some(respond) = pending_gets.remove(&id) {
                        let _ = respond.send(Ok(peer_record.record.value));
                    }
                }
                kad::QueryResult::GetRecord(Err(e)) => {
                    if let Some(respond) = pending_gets.remove(&id) {
                        let _ = respond.send(Err(DhtError::GetFailed { reason: e.to_string() }));
                    }
                }
                _ => {}
            }
        }
        SwarmEvent::Behaviour(ChaindhtBehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
            for (peer_id, addr) in peers {
                debug!(%peer_id, %addr, "mdns discovered peer");
                swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
            }
        }
        SwarmEvent::Behaviour(ChaindhtBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. })) => {
            for addr in info.listen_addrs {
                swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
            }
        }
        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
            let count = state.peer_count.fetch_add(1, Ordering::Relaxed) + 1;
            info!(%peer_id, count, "peer connected");
        }
        SwarmEvent::ConnectionClosed { peer_id, .. } => {
            if state.peer_count.load(Ordering::Relaxed) > 0 {
                state.peer_count.fetch_sub(1, Ordering::Relaxed);
            }
            info!(%peer_id, "peer disconnected");
        }
        SwarmEvent::NewListenAddr { address, .. } => {
            info!(%address, "listening on");
        }
        SwarmEvent::ListenerError { error, .. } => {
            error!(%error, "listener error");
        }
        _ => {}
    }
}
