//! Wire format: the broadcast command envelope and the gossipsub topic
//! blocks and transactions travel on.

use serde::{Deserialize, Serialize};

/// Maximum gossipsub message size, matching the teacher's limit.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Single gossipsub topic carrying every broadcast command; dispatch happens
/// on `command`, not on separate topics, matching the original's one
/// `customCmd` channel.
pub const BROADCAST_TOPIC: &str = "chaindht/broadcast/1";

/// A new, unconfirmed transaction is being announced to the mempool.
pub const CMD_NEW_TRANSACTION: u8 = 1;
/// A newly mined block's hash is being announced; peers pull the full block
/// from the DHT rather than receiving it inline.
pub const CMD_NEW_BLOCK: u8 = 2;
/// A status query: ask a peer for its [`NodeInfo`], answered synchronously
/// by `on_custom_cmd`'s return payload rather than a separate RPC protocol.
pub const CMD_GET_INFO: u8 = 3;

/// A broadcast envelope: a command byte plus its opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct CustomCommand {
    pub command: u8,
    pub data: Vec<u8>,
}

impl CustomCommand {
    pub fn new_transaction(data: Vec<u8>) -> Self {
        Self { command: CMD_NEW_TRANSACTION, data }
    }

    pub fn new_block(data: Vec<u8>) -> Self {
        Self { command: CMD_NEW_BLOCK, data }
    }

    pub fn get_info() -> Self {
        Self { command: CMD_GET_INFO, data: Vec::new() }
    }

    pub fn encode(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, bincode::config::standard()).expect("command always encodes")
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        bincode::decode_from_slice(bytes, bincode::config::standard()).map(|(v, _)| v).ok()
    }
}

/// A node's status, returned in reply to [`CMD_GET_INFO`]. Everything here
/// is read under the node's shared lock plus its transport's connected-peer
/// count; it carries no wallet balance, since that's specific to the asker,
/// not the answering node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct NodeInfo {
    pub blocks_height: u64,
    pub time_since_last_block: i64,
    pub waiting_transaction_count: u64,
    pub processing_transaction_count: u64,
    pub connected_peers: u64,
    pub synced: bool,
}
