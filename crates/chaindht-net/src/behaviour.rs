//! Composite libp2p [`NetworkBehaviour`] backing the DHT transport.
//!
//! Combines Kademlia (block storage, addressed by `sha256(prev_block_hash)`),
//! Gossipsub (transaction/block-hash broadcast), and Identify (handshake).

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use libp2p::gossipsub;
use libp2p::identity::Keypair;
use libp2p::kad;
use libp2p::kad::store::{Error as StoreError, RecordStore, Result as StoreResult};
use libp2p::kad::{ProviderRecord, Record, RecordKey};
use libp2p::swarm::NetworkBehaviour;
use libp2p::{identify, mdns, PeerId};
use sha2::{Digest, Sha256};

use chaindht_core::hash::Hash32;

use crate::transport::DhtHandlers;

pub const PROTOCOL_VERSION: &str = "/chaindht/1.0.0";
pub const KAD_PROTOCOL: &[u8] = b"/chaindht/kad/1.0.0";

/// Composite network behaviour combining the chaindht sub-protocols.
#[derive(NetworkBehaviour)]
pub struct ChaindhtBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<ValidatingStore>,
    pub identify: identify::Behaviour,
    pub mdns: libp2p::swarm::behaviour::toggle::Toggle<mdns::tokio::Behaviour>,
}

/// A [`kad::store::MemoryStore`] wrapper that calls [`DhtHandlers::on_store`]
/// before accepting an incoming record, so a peer cannot force-write a block
/// the node would reject.
pub struct ValidatingStore {
    inner: kad::store::MemoryStore,
    handlers: Arc<dyn DhtHandlers>,
}

impl ValidatingStore {
    pub fn new(local_peer_id: PeerId, handlers: Arc<dyn DhtHandlers>) -> Self {
        Self { inner: kad::store::MemoryStore::new(local_peer_id), handlers }
    }
}

impl RecordStore for ValidatingStore {
    type RecordsIter<'a> = <kad::store::MemoryStore as RecordStore>::RecordsIter<'a>;
    type ProvidedIter<'a> = <kad::store::MemoryStore as RecordStore>::ProvidedIter<'a>;

    fn get(&self, k: &RecordKey) -> Option<Cow<'_, Record>> {
        self.inner.get(k)
    }

    fn put(&mut self, record: Record) -> StoreResult<()> {
        let key_hash = key_to_hash(&record.key);
        if self.handlers.on_store(key_hash, &record.value) {
            self.inner.put(record)
        } else {
            Err(StoreError::MaxRecords)
        }
    }

    fn remove(&mut self, k: &RecordKey) {
        self.inner.remove(k)
    }

    fn records(&self) -> Self::RecordsIter<'_> {
        self.inner.records()
    }

    fn add_provider(&mut self, record: ProviderRecord) -> StoreResult<()> {
        self.inner.add_provider(record)
    }

    fn providers(&self, key: &RecordKey) -> Vec<ProviderRecord> {
        self.inner.providers(key)
    }

    fn provided(&self) -> Self::ProvidedIter<'_> {
        self.inner.provided()
    }

    fn remove_provider(&mut self, k: &RecordKey, p: &PeerId) {
        self.inner.remove_provider(k, p)
    }
}

/// Kademlia keys are opaque bytes; blocks are addressed by a 32-byte hash,
/// so a well-formed key decodes straight into one.
fn key_to_hash(key: &RecordKey) -> Hash32 {
    let bytes = key.as_ref();
    let mut buf = [0u8; 32];
    let n = bytes.len().min(32);
    buf[..n].copy_from_slice(&bytes[..n]);
    Hash32::from(buf)
}

/// Build a gossipsub behaviour with content-addressed message IDs.
pub fn build_gossipsub(heartbeat: Duration) -> Result<gossipsub::Behaviour, String> {
    let message_id_fn = |message: &gossipsub::Message| {
        let hash = Sha256::digest(&message.data);
        gossipsub::MessageId::from(hash.to_vec())
    };

    let config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(heartbeat)
        .validation_mode(gossipsub::ValidationMode::Strict)
        .max_transmit_size(crate::protocol::MAX_MESSAGE_SIZE)
        .message_id_fn(message_id_fn)
        .build()
        .map_err(|e| format!("gossipsub config error: {e}"))?;

    gossipsub::Behaviour::new(gossipsub::MessageAuthenticity::Signed(Keypair::generate_ed25519()), config)
        .map_err(|e| format!("gossipsub behaviour error: {e}"))
}
