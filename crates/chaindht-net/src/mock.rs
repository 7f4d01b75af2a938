//! An in-process [`DhtTransport`] double for tests and doctests.
//!
//! Grounded on the teacher's in-memory chain-state testing pattern: a shared
//! `HashMap` behind a lock stands in for the DHT record store, and a
//! registered peer list stands in for gossipsub so that `broadcast` fans out
//! to every other `MockDht` sharing the same cluster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chaindht_core::hash::Hash32;

use crate::error::DhtError;
use crate::protocol::CustomCommand;
use crate::transport::{DhtHandlers, DhtTransport, StoreResult};

struct Shared {
    records: Mutex<HashMap<Hash32, Vec<u8>>>,
    peers: Mutex<Vec<Arc<dyn DhtHandlers>>>,
}

/// A single node's view of an in-process mock DHT cluster.
///
/// Multiple `MockDht` handles created via [`MockDht::join`] on the same
/// [`MockCluster`] share one record store and broadcast to one another,
/// standing in for a real libp2p swarm in end-to-end tests.
pub struct MockDht {
    shared: Arc<Shared>,
}

/// The shared backing state a cluster of [`MockDht`] nodes is built from.
#[derive(Clone)]
pub struct MockCluster {
    shared: Arc<Shared>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self { shared: Arc::new(Shared { records: Mutex::new(HashMap::new()), peers: Mutex::new(Vec::new()) }) }
    }

    /// Add a node to the cluster, registering its handlers to receive
    /// broadcasts from every other member.
    pub fn join(&self, handlers: Arc<dyn DhtHandlers>) -> MockDht {
        self.shared.peers.lock().unwrap().push(handlers);
        MockDht { shared: Arc::clone(&self.shared) }
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDht {
    /// A single isolated node with no peers, for single-node scenarios.
    pub fn solo(handlers: Arc<dyn DhtHandlers>) -> Self {
        MockCluster::new().join(handlers)
    }
}

#[async_trait]
impl DhtTransport for MockDht {
    async fn store_at(&self, key: Hash32, value: Vec<u8>) -> Result<StoreResult, DhtError> {
        let peers = self.shared.peers.lock().unwrap();
        let mut stored = 0usize;
        for peer in peers.iter() {
            if peer.on_store(key, &value) {
                stored += 1;
            }
        }
        self.shared.records.lock().unwrap().insert(key, value);
        Ok(StoreResult { peers_stored: stored, replication_factor: peers.len().max(1) })
    }

    async fn get(&self, key: Hash32) -> Result<Vec<u8>, DhtError> {
        self.shared
            .records
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| DhtError::NotFound { key: key.to_string() })
    }

    async fn broadcast(&self, cmd: CustomCommand) {
        // The sender is itself in the peer list (pushed by `join`/`solo`),
        // so this also delivers the command back to the caller, matching a
        // real gossipsub node receiving its own published message.
        let peers = self.shared.peers.lock().unwrap();
        for peer in peers.iter() {
            let _ = peer.on_custom_cmd(cmd.clone());
        }
    }

    fn connected_peer_count(&self) -> usize {
        self.shared.peers.lock().unwrap().len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandlers {
        stores: AtomicUsize,
        cmds: AtomicUsize,
    }

    impl CountingHandlers {
        fn new() -> Self {
            Self { stores: AtomicUsize::new(0), cmds: AtomicUsize::new(0) }
        }
    }

    impl DhtHandlers for CountingHandlers {
        fn on_store(&self, _key: Hash32, _value: &[u8]) -> bool {
            self.stores.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn on_custom_cmd(&self, _cmd: CustomCommand) -> Option<Vec<u8>> {
            self.cmds.fetch_add(1, Ordering::SeqCst);
            None
        }
        fn on_broadcast(&self, _packet: &[u8]) -> Option<Vec<u8>> {
            None
        }
    }

    #[tokio::test]
    async fn store_and_get_round_trip() {
        let handlers = Arc::new(CountingHandlers::new());
        let dht = MockDht::solo(handlers);
        let key = Hash32::ZERO;
        dht.store_at(key, vec![1, 2, 3]).await.unwrap();
        let value = dht.get(key).await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn get_missing_key_errors() {
        let handlers = Arc::new(CountingHandlers::new());
        let dht = MockDht::solo(handlers);
        let result = dht.get(Hash32::ZERO).await;
        assert!(matches!(result, Err(DhtError::NotFound { .. })));
    }

    #[tokio::test]
    async fn broadcast_reaches_other_cluster_members() {
        let cluster = MockCluster::new();
        let a = Arc::new(CountingHandlers::new());
        let b = Arc::new(CountingHandlers::new());
        let dht_a = cluster.join(a.clone());
        let _dht_b = cluster.join(b.clone());

        dht_a.broadcast(CustomCommand::new_transaction(vec![9])).await;

        assert_eq!(a.cmds.load(Ordering::SeqCst), 1);
        assert_eq!(b.cmds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_notifies_every_peer() {
        let cluster = MockCluster::new();
        let a = Arc::new(CountingHandlers::new());
        let b = Arc::new(CountingHandlers::new());
        let dht_a = cluster.join(a.clone());
        let _dht_b = cluster.join(b.clone());

        let result = dht_a.store_at(Hash32::ZERO, vec![1]).await.unwrap();
        assert_eq!(result.peers_stored, 2);
        assert_eq!(a.stores.load(Ordering::SeqCst), 1);
        assert_eq!(b.stores.load(Ordering::SeqCst), 1);
    }
}
