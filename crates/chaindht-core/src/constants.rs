//! Protocol constants shared by every crate in the workspace.

/// Size in bytes of a [`Hash32`](crate::hash::Hash32) or a [`Target`](crate::types::Target).
pub const HASH_SIZE: usize = 32;

/// Fixed reward paid to the miner's own address by every coinbase transaction.
pub const COINBASE_REWARD: u64 = 100;

/// Expected wall-clock time, in seconds, for ten consecutive blocks.
///
/// Used by the difficulty retarget in [`chaindht_consensus`](../chaindht_consensus/index.html)
/// every [`RETARGET_INTERVAL`] blocks.
pub const EXPECTED_10_BLOCKS_TIME: i64 = 600;

/// Retarget the difficulty every this many blocks.
pub const RETARGET_INTERVAL: u64 = 10;

/// Maximum number of headers stored per chain data file.
pub const HEADERS_PER_FILE: u64 = 1000;

/// Default listen address for the DHT transport.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default wallet identity file name, created on first run if absent.
pub const MAIN_WALLET_NAME: &str = "main.key";

/// The easiest allowed proof-of-work target: `000000FF` followed by 28 `0xFF` bytes.
///
/// A block header hash is valid iff it compares strictly less than the
/// current target under [`crate::hash::compare_bytes`].
pub const BASE_TARGET: [u8; HASH_SIZE] = {
    let mut t = [0xFFu8; HASH_SIZE];
    t[0] = 0x00;
    t[1] = 0x00;
    t[2] = 0x00;
    t[3] = 0xFF;
    t
};

/// How often, in seconds, the sync loop polls the DHT for a new tip once caught up.
pub const SYNC_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum number of per-second hash-rate samples kept by the stats tracker (one hour).
pub const STATS_WINDOW_SECS: usize = 3600;
