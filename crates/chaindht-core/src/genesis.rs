//! Deterministic genesis block, synthesized identically by every node at
//! startup rather than hardcoded or loaded from disk.

use std::sync::LazyLock;

use crate::constants::BASE_TARGET;
use crate::hash::Hash32;
use crate::types::{Block, BlockHeader};

static GENESIS: LazyLock<Block> = LazyLock::new(build_genesis);

fn build_genesis() -> Block {
    let mut header = BlockHeader {
        height: 0,
        hash: Hash32::ZERO,
        prec_hash: Hash32::ZERO,
        merkle_hash: Hash32::ZERO,
        target: BASE_TARGET,
        timestamp: 0,
        nonce: 0,
    };
    header.hash = header.compute_hash();

    Block {
        header,
        transactions: Vec::new(),
    }
}

/// The genesis block (height 0).
pub fn genesis_block() -> &'static Block {
    &GENESIS
}

/// The genesis block's header hash.
pub fn genesis_hash() -> Hash32 {
    GENESIS.header.hash
}

/// Whether `block` is the genesis block, by comparing header hashes.
pub fn is_genesis(block: &Block) -> bool {
    block.header.hash == GENESIS.header.hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_block_deterministic() {
        assert_eq!(genesis_block(), genesis_block());
    }

    #[test]
    fn genesis_block_has_no_transactions() {
        assert!(genesis_block().transactions.is_empty());
    }

    #[test]
    fn genesis_header_height_zero() {
        assert_eq!(genesis_block().header.height, 0);
    }

    #[test]
    fn genesis_header_prec_hash_zero() {
        assert!(genesis_block().header.prec_hash.is_zero());
    }

    #[test]
    fn genesis_header_timestamp_zero() {
        assert_eq!(genesis_block().header.timestamp, 0);
    }

    #[test]
    fn genesis_header_target_is_base_target() {
        assert_eq!(genesis_block().header.target, BASE_TARGET);
    }

    #[test]
    fn genesis_hash_matches_recomputed_header_hash() {
        assert_eq!(genesis_hash(), genesis_block().header.compute_hash());
    }

    #[test]
    fn genesis_hash_nonzero() {
        assert!(!genesis_hash().is_zero());
    }

    #[test]
    fn genesis_hash_deterministic() {
        assert_eq!(genesis_hash(), genesis_hash());
    }

    #[test]
    fn is_genesis_true_for_genesis() {
        assert!(is_genesis(genesis_block()));
    }

    #[test]
    fn is_genesis_false_for_other_block() {
        let mut other = genesis_block().clone();
        other.header.height = 1;
        other.header.prec_hash = genesis_hash();
        other.header.hash = other.header.compute_hash();
        assert!(!is_genesis(&other));
    }

    #[test]
    fn is_genesis_false_for_modified_genesis() {
        let mut modified = genesis_block().clone();
        modified.header.nonce = 999;
        assert!(!is_genesis(&modified));
    }
}
