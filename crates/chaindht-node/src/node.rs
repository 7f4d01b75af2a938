//! Node composition and background tasks.
//!
//! [`Node`] wires a wallet identity, a [`ChainEngine`], flat-file
//! persistence, and a [`DhtTransport`] into a running node. State lives
//! behind a single [`RwLock`] ([`CoreState`]); the miner thread never holds
//! it while hashing, only briefly before (to take a candidate) and never
//! after, since the miner does not apply its own blocks — see
//! [`Node::run_miner`].
//!
//! Two atomics drive the miner's hot loop without it ever touching a lock:
//! `must_stop` is a one-shot restart signal (tripped by a new pending
//! transaction or a new block landing via the DHT, cleared by the miner
//! after every mining attempt) and `shutdown` is the permanent
//! stop-everything signal set by [`Node::request_stop`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use chaindht_consensus::engine::{ChainEngine, EngineSnapshot};
use chaindht_consensus::error::MempoolError;
use chaindht_core::codec;
use chaindht_core::constants::SYNC_POLL_INTERVAL_SECS;
use chaindht_core::hash::{sha256, Hash32};
use chaindht_core::stats::Stats;
use chaindht_core::tx;
use chaindht_core::types::{Block, BlockHeader, Transaction};
use chaindht_net::{CustomCommand, DhtHandlers, DhtTransport, NodeInfo, CMD_GET_INFO, CMD_NEW_BLOCK, CMD_NEW_TRANSACTION};
use chaindht_wallet::Wallet;

use crate::config::NodeConfig;
use crate::storage;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("dht transport has not been attached yet")]
    TransportNotAttached,
    #[error("dht transport was already attached")]
    TransportAlreadyAttached,
    #[error("insufficient funds to send {amount}")]
    InsufficientFunds { amount: u64 },
    #[error("transaction rejected: {0}")]
    Mempool(#[from] MempoolError),
    #[error("dht transport error: {0}")]
    Dht(#[from] chaindht_net::DhtError),
    #[error("persistence error: {0}")]
    Storage(#[from] storage::StorageError),
    #[error("encoding error: {0}")]
    Codec(#[from] chaindht_core::error::TransactionError),
}

/// A point-in-time view of node state for `-s`/`-w` output and the GUI.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub address: String,
    pub engine: EngineSnapshot,
    pub current_hash_rate: Option<u64>,
    pub average_hash_rate: f64,
    pub found_blocks: u64,
    pub balance: u64,
    pub synced: bool,
    pub connected_peers: usize,
}

struct CoreState {
    engine: ChainEngine,
}

/// A running node: wallet identity, chain engine, persistence, and DHT
/// transport composed together.
pub struct Node {
    state: RwLock<CoreState>,
    stats: Mutex<Stats>,
    wallet: Wallet,
    config: NodeConfig,
    transport: OnceLock<Arc<dyn DhtTransport>>,
    sync_notify: Notify,
    must_stop: AtomicBool,
    shutdown: AtomicBool,
    synced: AtomicBool,
    running: AtomicBool,
}

impl Node {
    /// Build a node around `wallet`'s identity. The DHT transport is
    /// attached separately via [`Node::attach_transport`], since the
    /// transport itself needs this node (as [`DhtHandlers`]) to exist first.
    pub fn new(config: NodeConfig, wallet: Wallet) -> Arc<Self> {
        let engine = ChainEngine::new(wallet.pub_pem.clone());
        Arc::new(Self {
            state: RwLock::new(CoreState { engine }),
            stats: Mutex::new(Stats::new()),
            wallet,
            config,
            transport: OnceLock::new(),
            sync_notify: Notify::new(),
            must_stop: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            running: AtomicBool::new(false),
        })
    }

    /// Attach the DHT transport once it has been started with this node as
    /// its handlers. Fails if called more than once.
    pub fn attach_transport(&self, transport: Arc<dyn DhtTransport>) -> Result<(), NodeError> {
        self.transport.set(transport).map_err(|_| NodeError::TransportAlreadyAttached)
    }

    fn transport(&self) -> Result<&Arc<dyn DhtTransport>, NodeError> {
        self.transport.get().ok_or(NodeError::TransportNotAttached)
    }

    pub fn address(&self) -> &str {
        &self.wallet.pub_pem
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Ask every background task to stop. Does not block for them to do so.
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.must_stop.store(true, Ordering::Relaxed);
        self.sync_notify.notify_waiters();
    }

    /// This wallet's own transaction history: one entry per applied block
    /// or pending transaction whose net effect touched its balance, newest
    /// last. Used by stats/status observers, not by consensus itself.
    pub fn history(&self) -> Vec<chaindht_core::types::HistoryTx> {
        self.state.read().engine.history().to_vec()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        let state = self.state.read();
        let balance = state.engine.utxo().funds(&self.wallet.pub_pem);
        let engine = state.engine.snapshot();
        drop(state);

        let stats = self.stats.lock();
        NodeSnapshot {
            address: self.wallet.pub_pem.clone(),
            engine,
            current_hash_rate: stats.current_hash_rate(),
            average_hash_rate: stats.average_hash_rate(),
            found_blocks: stats.found_blocks(),
            balance,
            synced: self.is_synced(),
            connected_peers: self.transport().map(|t| t.connected_peer_count()).unwrap_or(0),
        }
    }

    /// Build, admit to the mempool, and broadcast a transaction paying
    /// `amount` to `destination` from this node's own wallet. Trips
    /// `must_stop` so the miner picks the new transaction up on its next
    /// candidate.
    pub async fn send(self: &Arc<Self>, amount: u64, destination: &str) -> Result<Hash32, NodeError> {
        let transaction = {
            let state = self.state.read();
            tx::new_transaction(state.engine.utxo(), &self.wallet.signing_key, &self.wallet.pub_pem, amount, destination)
                .ok_or(NodeError::InsufficientFunds { amount })?
        };

        {
            let mut state = self.state.write();
            state.engine.add_pending(transaction.clone())?;
        }
        self.must_stop.store(true, Ordering::Relaxed);

        let encoded = codec::encode(&transaction)?;
        self.transport()?.broadcast(CustomCommand::new_transaction(encoded)).await;
        Ok(transaction.stamp.hash)
    }

    /// Spawn the miner (if configured), sync poller, and stats ticker as
    /// background tasks on the current tokio runtime.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        self.running.store(true, Ordering::Relaxed);

        if self.config.mine {
            let node = Arc::clone(self);
            tokio::task::spawn_blocking(move || node.run_miner());
        }

        {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.run_sync_poller().await });
        }

        {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.run_stats_ticker().await });
        }
    }

    /// CPU-bound mining loop. Owns a private [`Stats`] for the duration of
    /// each mining session so the hot hashing loop never touches a shared
    /// lock, folding it into the shared stats once the session ends.
    ///
    /// A found block is never applied here: it is only serialized and
    /// handed to the DHT via `store_at`. Authoritative application happens
    /// exclusively through [`DhtHandlers::on_store`], so a block this node
    /// mines and a block it receives from a peer follow the exact same
    /// path into the chain. `must_stop` is cleared after every attempt,
    /// whether it found a block or was cancelled mid-hash by a new
    /// transaction or a block arriving through sync, so the loop always
    /// rebuilds a fresh candidate rather than exiting.
    fn run_miner(self: Arc<Self>) {
        let handle = tokio::runtime::Handle::current();

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let candidate = {
                let mut state = self.state.write();
                state.engine.new_candidate(&self.wallet.signing_key)
            };

            let mut session_stats = Stats::new();
            let mined = ChainEngine::mine(candidate, &self.must_stop, &mut session_stats);

            {
                let mut stats = self.stats.lock();
                stats.absorb(&session_stats);
            }
            self.must_stop.store(false, Ordering::Relaxed);

            if let Some(block) = mined {
                handle.block_on(self.publish_mined_block(block));
            }
        }

        self.running.store(false, Ordering::Relaxed);
    }

    /// Store a freshly mined block in the DHT under `sha256(prec_hash)` and
    /// announce its arrival so peers' sync pollers wake early instead of
    /// waiting out their poll interval. Never touches engine state: if this
    /// node is itself selected to hold the record, [`DhtHandlers::on_store`]
    /// will apply it through the normal path.
    async fn publish_mined_block(&self, block: Block) {
        let Ok(transport) = self.transport() else { return };

        let key = sha256(block.header.prec_hash.as_bytes());
        let Ok(encoded) = codec::encode(&block) else {
            warn!("failed to encode mined block");
            return;
        };

        match transport.store_at(key, encoded).await {
            Ok(result) if result.peers_stored > 0 => {
                if let Ok(encoded_header) = codec::encode(&block.header) {
                    transport.broadcast(CustomCommand::new_block(encoded_header)).await;
                }
            }
            Ok(_) => warn!("dht reported zero replicas storing mined block"),
            Err(e) => warn!("failed to store mined block in the dht: {e}"),
        }
    }

    /// Apply a block that has become (or already is) part of the chain —
    /// whether pulled from the DHT by the sync poller or accepted as the
    /// next tip inside [`DhtHandlers::on_store`] — and persist it. Trips
    /// `must_stop` so the miner rebuilds a candidate on top of it.
    fn apply_next_tip(&self, block: Block) -> bool {
        let header = block.header.clone();
        let mined_by_us = block.coinbase().is_some_and(|cb| String::from_utf8_lossy(&cb.stamp.pub_key) == self.address());
        let applied = {
            let mut state = self.state.write();
            state.engine.add_block(block)
        };

        match applied {
            Ok(_) => {
                if mined_by_us {
                    self.stats.lock().record_found_block();
                }
                self.persist_after_apply(&header);
                self.must_stop.store(true, Ordering::Relaxed);
                info!(height = header.height, %header.hash, "applied new tip");
                true
            }
            Err(e) => {
                debug!("rejected candidate next-tip block: {e}");
                false
            }
        }
    }

    fn persist_after_apply(&self, header: &BlockHeader) {
        if let Err(e) = storage::append_header(&self.config.chain_dir(), header) {
            warn!("failed to persist header at height {}: {e}", header.height);
        }
        let state = self.state.read();
        let entries = state.engine.utxo().entries(&self.wallet.pub_pem).to_vec();
        drop(state);
        if let Err(e) = storage::save_unspent(&self.config.unspent_dir(), &self.wallet.pub_pem, &entries) {
            warn!("failed to persist unspent outputs: {e}");
        }
    }

    /// Catch up at startup by repeatedly pulling the block extending our
    /// tip until the DHT has nothing more, then fall back to a 5-second
    /// poll forever, woken early by [`DhtHandlers::on_custom_cmd`] when a
    /// peer announces a new block.
    async fn run_sync_poller(self: Arc<Self>) {
        while self.pull_and_apply_next().await {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
        }
        self.synced.store(true, Ordering::Relaxed);
        info!("initial sync complete");

        let mut ticker = tokio::time::interval(Duration::from_secs(SYNC_POLL_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.sync_notify.notified() => {}
            }
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.pull_and_apply_next().await;
        }
    }

    /// Pull the block extending our current tip from the DHT and apply it.
    /// Returns `true` on success, so the startup catch-up loop knows to
    /// keep going.
    async fn pull_and_apply_next(self: &Arc<Self>) -> bool {
        let Ok(transport) = self.transport() else { return false };

        let key = {
            let state = self.state.read();
            sha256(state.engine.last_block().header.hash.as_bytes())
        };

        let bytes = match transport.get(key).await {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let block: Block = match codec::decode(&bytes) {
            Ok(block) => block,
            Err(e) => {
                debug!("discarding undecodable block pulled from the dht: {e}");
                return false;
            }
        };

        self.apply_next_tip(block)
    }

    async fn run_stats_ticker(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.stats.lock().tick();
        }
    }
}

impl DhtHandlers for Node {
    /// Gate for both the DHT's own acceptance of a stored record and this
    /// node's chain state: a block one height above our tip is verified
    /// and, if valid, applied immediately (this is how mined and received
    /// blocks alike become part of the chain); a block at or below our tip
    /// is checked against history without touching state; anything further
    /// ahead is rejected so the sync poller's `get` is what pulls it in.
    fn on_store(&self, key: Hash32, value: &[u8]) -> bool {
        let Ok(block) = codec::decode::<Block>(value) else {
            return false;
        };
        let expected_key = sha256(block.header.prec_hash.as_bytes());
        if expected_key != key {
            return false;
        }

        let last_height = self.state.read().engine.last_block().header.height;
        if block.header.height == last_height + 1 {
            self.apply_next_tip(block)
        } else if block.header.height <= last_height {
            self.state.read().engine.verify_old(&block).is_ok()
        } else {
            false
        }
    }

    fn on_custom_cmd(&self, cmd: CustomCommand) -> Option<Vec<u8>> {
        match cmd.command {
            CMD_NEW_TRANSACTION => {
                let transaction: Transaction = codec::decode(&cmd.data).ok()?;
                let mut state = self.state.write();
                match state.engine.add_pending(transaction) {
                    Ok(()) => {
                        drop(state);
                        self.must_stop.store(true, Ordering::Relaxed);
                    }
                    Err(e) => debug!("rejected broadcast transaction: {e}"),
                }
            }
            CMD_NEW_BLOCK => {
                let _header: BlockHeader = codec::decode(&cmd.data).ok()?;
                self.sync_notify.notify_waiters();
            }
            CMD_GET_INFO => {
                let snapshot = self.snapshot();
                let info = NodeInfo {
                    blocks_height: snapshot.engine.blocks_height,
                    time_since_last_block: snapshot.engine.time_since_last_block,
                    waiting_transaction_count: snapshot.engine.waiting_transaction_count as u64,
                    processing_transaction_count: snapshot.engine.processing_transaction_count as u64,
                    connected_peers: snapshot.connected_peers as u64,
                    synced: snapshot.synced,
                };
                return codec::encode(&info).ok();
            }
            _ => {}
        }
        None
    }

    fn on_broadcast(&self, _packet: &[u8]) -> Option<Vec<u8>> {
        None
    }
}
