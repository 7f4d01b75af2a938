//! The DHT transport interface the node drives, and the callback hooks the
//! transport drives back into the node.

use async_trait::async_trait;
use chaindht_core::hash::Hash32;

use crate::error::DhtError;
use crate::protocol::CustomCommand;

/// Result of a `store_at`: how many peers acknowledged the record and the
/// replication factor that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResult {
    pub peers_stored: usize,
    pub replication_factor: usize,
}

/// Required collaborator: puts/gets opaque byte blobs by key, and broadcasts
/// custom commands to every connected peer. Implemented over libp2p by
/// [`crate::service::DhtNode`] and, for tests, by [`crate::mock::MockDht`].
#[async_trait]
pub trait DhtTransport: Send + Sync {
    async fn store_at(&self, key: Hash32, value: Vec<u8>) -> Result<StoreResult, DhtError>;
    async fn get(&self, key: Hash32) -> Result<Vec<u8>, DhtError>;
    async fn broadcast(&self, cmd: CustomCommand);

    /// Peers currently reachable through this transport, for stats/GUI
    /// observers. A plain, non-async accessor since it's just an atomic or
    /// lock read, not a network round trip.
    fn connected_peer_count(&self) -> usize;
}

/// Event hooks invoked by the transport when the network delivers something.
/// No error crosses this boundary: a rejection is expressed by returning
/// `false`/`None`, per the node's error handling design.
pub trait DhtHandlers: Send + Sync {
    /// A peer asked us to store `value` under `key`. Return `true` to accept.
    fn on_store(&self, key: Hash32, value: &[u8]) -> bool;
    /// A peer broadcast a custom command. Return an optional reply payload.
    fn on_custom_cmd(&self, cmd: CustomCommand) -> Option<Vec<u8>>;
    /// A raw gossipsub packet arrived outside the custom-command envelope.
    fn on_broadcast(&self, packet: &[u8]) -> Option<Vec<u8>>;
}
