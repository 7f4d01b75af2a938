//! End-to-end and adversarial integration test suite for chaindht.
//!
//! Exercises the composed [`chaindht_node::Node`] over a [`chaindht_net::MockDht`]
//! cluster rather than any single crate in isolation: mining, sending,
//! cross-node propagation via the DHT, and rejection of malformed or
//! conflicting input.

pub mod helpers;
