//! # chaindht-node — node composition, flat-file persistence, and CLI wiring.
//!
//! - [`storage`] — flat-file persistence for chain headers and per-address
//!   unspent outputs, replacing a conventional embedded database
//! - [`node::Node`] — wires a wallet, chain engine, persistence, and DHT
//!   transport into a running node with a miner, sync poller, and stats
//!   ticker
//! - [`config::NodeConfig`] — CLI-derived configuration

pub mod config;
pub mod node;
pub mod storage;

pub use config::NodeConfig;
pub use node::{Node, NodeError, NodeSnapshot};
