//! # chaindht-net — DHT transport layer.
//!
//! Blocks are addressed by `sha256(prev_block_hash)` and pulled from peers
//! on demand via Kademlia `put_record`/`get_record`; transactions and new
//! block announcements travel over a single gossipsub topic as
//! [`CustomCommand`] envelopes. [`mock::MockDht`] provides an in-process
//! double for tests that don't need a real swarm.

pub mod behaviour;
pub mod config;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod service;
pub mod transport;

pub use config::NetworkConfig;
pub use error::DhtError;
pub use mock::{MockCluster, MockDht};
pub use protocol::{CustomCommand, NodeInfo, BROADCAST_TOPIC, CMD_GET_INFO, CMD_NEW_BLOCK, CMD_NEW_TRANSACTION};
pub use service::DhtNode;
pub use transport::{DhtHandlers, DhtTransport, StoreResult};
