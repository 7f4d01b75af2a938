//! Adversarial and malformed-input tests.
//!
//! Builds blocks and transactions independently of any running [`Node`] (the
//! genesis block is a fixed global constant, so a standalone
//! [`ChainEngine`] shares it with any node's own engine) and feeds them
//! straight into a node's public [`DhtHandlers`] methods, asserting that
//! corrupt, out-of-order, or conflicting input is rejected without
//! panicking or silently corrupting state.

use std::sync::Arc;

use chaindht_consensus::engine::ChainEngine;
use chaindht_core::codec;
use chaindht_core::crypto::KeyPair;
use chaindht_core::hash::{sha256, Hash32};
use chaindht_net::{CustomCommand, DhtHandlers, DhtTransport, MockDht};
use chaindht_node::{Node, NodeConfig, NodeError};
use chaindht_tests::helpers::mine_next;
use chaindht_wallet::Wallet;

fn fresh_node() -> (Arc<Node>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let wallet = Wallet::generate("main.key").unwrap();
    let config = NodeConfig { data_dir: dir.path().to_path_buf(), mine: false, ..NodeConfig::default() };
    (Node::new(config, wallet), dir)
}

#[test]
fn on_store_rejects_a_payload_that_does_not_decode_as_a_block() {
    let (node, _dir) = fresh_node();
    assert!(!node.on_store(Hash32::ZERO, b"definitely not bincode"));
}

#[test]
fn on_store_rejects_a_block_whose_key_does_not_match_its_prec_hash() {
    let (node, _dir) = fresh_node();

    let mut engine = ChainEngine::new("someone".to_string());
    let key = KeyPair::generate();
    let block = mine_next(&mut engine, &key);
    let encoded = codec::encode(&block).unwrap();

    // Wrong key: store it under its own hash rather than sha256(prec_hash).
    assert!(!node.on_store(block.header.hash, &encoded));
}

#[test]
fn on_store_rejects_a_block_with_a_tampered_header_hash() {
    let (node, _dir) = fresh_node();

    let mut engine = ChainEngine::new("someone".to_string());
    let key = KeyPair::generate();
    let mut block = mine_next(&mut engine, &key);
    block.header.hash = Hash32::ZERO;
    let dht_key = sha256(block.header.prec_hash.as_bytes());
    let encoded = codec::encode(&block).unwrap();

    assert!(!node.on_store(dht_key, &encoded));
}

#[test]
fn on_store_accepts_a_valid_block_extending_genesis() {
    let (node, _dir) = fresh_node();

    let mut engine = ChainEngine::new("someone".to_string());
    let key = KeyPair::generate();
    let block = mine_next(&mut engine, &key);
    let dht_key = sha256(block.header.prec_hash.as_bytes());
    let encoded = codec::encode(&block).unwrap();

    assert!(node.on_store(dht_key, &encoded));
    assert_eq!(node.snapshot().engine.blocks_height, 1);
}

#[test]
fn on_store_accepts_a_replay_of_an_already_applied_block_without_reapplying_it() {
    let (node, _dir) = fresh_node();

    let mut engine = ChainEngine::new("someone".to_string());
    let key = KeyPair::generate();
    let block = mine_next(&mut engine, &key);
    let dht_key = sha256(block.header.prec_hash.as_bytes());
    let encoded = codec::encode(&block).unwrap();

    assert!(node.on_store(dht_key, &encoded));
    assert_eq!(node.snapshot().engine.blocks_height, 1);

    // height <= last_height now, so on_store takes the verify_old path and
    // must not apply it a second time.
    assert!(node.on_store(dht_key, &encoded));
    assert_eq!(node.snapshot().engine.blocks_height, 1);
}

#[test]
fn on_store_rejects_a_block_further_ahead_than_the_next_tip() {
    let (node, _dir) = fresh_node();

    let mut engine = ChainEngine::new("someone".to_string());
    let key = KeyPair::generate();
    let first = mine_next(&mut engine, &key);
    engine.add_block(first).unwrap();
    let second = mine_next(&mut engine, &key);
    let dht_key = sha256(second.header.prec_hash.as_bytes());
    let encoded = codec::encode(&second).unwrap();

    // The node is still at genesis; height 2 is two ahead of its tip.
    assert!(!node.on_store(dht_key, &encoded));
    assert_eq!(node.snapshot().engine.blocks_height, 0);
}

#[test]
fn on_custom_cmd_ignores_an_undecodable_transaction_payload() {
    let (node, _dir) = fresh_node();
    let cmd = CustomCommand::new_transaction(vec![0xff, 0x00, 0xff]);
    assert!(node.on_custom_cmd(cmd).is_none());
    assert_eq!(node.snapshot().engine.waiting_transaction_count, 0);
}

#[tokio::test]
async fn a_second_overlapping_send_is_rejected_as_a_double_spend() {
    // Build the node's wallet ourselves so a standalone engine can mine a
    // block paying its coinbase to this exact address, giving the node one
    // spendable 100-unit output to fight over.
    let dir = tempfile::tempdir().unwrap();
    let wallet = Wallet::generate("main.key").unwrap();
    let address = wallet.pub_pem.clone();
    let signing_key = KeyPair::from_pkcs8_pem(&wallet.signing_key.to_pkcs8_pem().unwrap()).unwrap();
    let config = NodeConfig { data_dir: dir.path().to_path_buf(), mine: false, ..NodeConfig::default() };
    let node = Node::new(config, wallet);

    let handlers: Arc<dyn DhtHandlers> = Arc::clone(&node) as Arc<dyn DhtHandlers>;
    node.attach_transport(Arc::new(MockDht::solo(handlers)) as Arc<dyn DhtTransport>).unwrap();

    let mut engine = ChainEngine::new(address.clone());
    let funded = mine_next(&mut engine, &signing_key);
    let dht_key = sha256(funded.header.prec_hash.as_bytes());
    let encoded = codec::encode(&funded).unwrap();
    assert!(node.on_store(dht_key, &encoded));
    assert_eq!(node.snapshot().balance, 100);

    // The wallet holds a single 100-unit output. The first send of 80
    // reserves it (`targeted`); a second, overlapping send before anything
    // is mined has nothing left to draw from.
    let first = node.send(80, "somewhere").await;
    assert!(first.is_ok());

    let second = node.send(80, "somewhere-else").await;
    assert!(matches!(second, Err(NodeError::InsufficientFunds { amount: 80 })));
}
