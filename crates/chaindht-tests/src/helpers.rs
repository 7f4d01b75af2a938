//! Shared test helpers for end-to-end and adversarial tests.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chaindht_consensus::engine::ChainEngine;
use chaindht_core::crypto::KeyPair;
use chaindht_core::stats::Stats;
use chaindht_core::types::Block;
use chaindht_node::{Node, NodeConfig};
use chaindht_wallet::Wallet;

/// A freshly generated node, its own temp data directory, and the directory
/// handle (drop order matters: keep the `TempDir` alive for the node's
/// lifetime).
pub fn test_node(mine: bool) -> (Arc<Node>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let wallet = Wallet::generate("main.key").unwrap();
    let config = NodeConfig { data_dir: dir.path().to_path_buf(), mine, ..NodeConfig::default() };
    (Node::new(config, wallet), dir)
}

pub fn test_node_at(data_dir: PathBuf, mine: bool) -> Arc<Node> {
    let wallet = Wallet::generate("main.key").unwrap();
    let config = NodeConfig { data_dir, mine, ..NodeConfig::default() };
    Node::new(config, wallet)
}

/// Mine one block on a standalone reference engine, independent of any
/// running [`Node`]. Used to hand-construct blocks for adversarial
/// `on_store` tests without waiting on real-time background mining on a
/// live node.
pub fn mine_next(engine: &mut ChainEngine, key: &KeyPair) -> Block {
    let candidate = engine.new_candidate(key);
    ChainEngine::mine(candidate, &AtomicBool::new(false), &mut Stats::new()).expect("mining at the base target never cancels")
}

/// Poll `cond` every 10ms until it returns `true` or `timeout` elapses.
/// Returns the final value of `cond`, so a timeout shows up as `false`
/// rather than a panic with no context.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
