//! Core protocol types: transactions, blocks, and unspent outputs.
//!
//! All monetary values are plain `u64` amounts with no implied decimal
//! scaling, matching the original ledger's integer accounting.

use serde::{Deserialize, Serialize};

use crate::constants::HASH_SIZE;
use crate::hash::Hash32;

/// A 32-byte proof-of-work target, big-endian, compared with
/// [`crate::hash::compare_bytes`] against a candidate block hash.
pub type Target = [u8; HASH_SIZE];

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct TxIn {
    /// Hash of the transaction containing the referenced output.
    pub prev_hash: Hash32,
    /// Index of the output within that transaction.
    pub prev_idx: u32,
}

/// A transaction output, creating a new spendable balance for `address`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TxOut {
    /// Amount credited to `address`.
    pub value: u64,
    /// PEM-encoded SubjectPublicKeyInfo string identifying the recipient.
    pub address: String,
}

/// The authenticating signature attached to a transaction.
///
/// `r` and `s` are the raw big-endian ECDSA scalar components, `pub_key` is
/// the PEM-encoded signer public key, and `hash` is the hash of the
/// transaction body that was signed — carried alongside the signature so a
/// verifier can recompute and compare without re-deriving it from scratch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Stamp {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
    pub pub_key: Vec<u8>,
    pub hash: Hash32,
    pub timestamp: i64,
}

/// A transaction transferring value from the stamp's signer to its outputs.
///
/// A coinbase transaction has no inputs and a [`Stamp`] whose `pub_key` is
/// the miner's reward address with an all-zero signature.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    pub ins: Vec<TxIn>,
    pub outs: Vec<TxOut>,
    pub stamp: Stamp,
}

impl Transaction {
    /// A transaction is a coinbase iff it spends no inputs.
    pub fn is_coinbase(&self) -> bool {
        self.ins.is_empty()
    }

    /// Sum of all output values. `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }
}

/// Block header carrying the proof-of-work puzzle and chain linkage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Hash32,
    pub prec_hash: Hash32,
    pub merkle_hash: Hash32,
    pub target: Target,
    pub timestamp: i64,
    pub nonce: u64,
}

impl BlockHeader {
    /// Recompute this header's hash: encode with `hash` zeroed, then SHA-256
    /// the encoding. Mining and verification both call this — mining until
    /// the result compares less than `target`, verification to check the
    /// stored `hash` against the recomputed one.
    pub fn compute_hash(&self) -> crate::hash::Hash32 {
        let mut zeroed = self.clone();
        zeroed.hash = crate::hash::Hash32::ZERO;
        let encoded = crate::codec::encode(&zeroed).expect("header always encodes");
        crate::hash::sha256(&encoded)
    }
}

/// A complete block: header plus the transactions it commits to.
///
/// The first transaction is always the coinbase paying the miner.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

/// An entry in the unspent transaction output index.
///
/// `targeted` marks a UTXO reserved by a pending mempool transaction so a
/// second spend attempt against the same output is rejected before it ever
/// reaches the chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct UnspentTxOut {
    pub out: TxOut,
    pub tx_hash: Hash32,
    pub in_idx: u32,
    pub targeted: bool,
}

impl UnspentTxOut {
    pub fn as_txin(&self) -> TxIn {
        TxIn {
            prev_hash: self.tx_hash,
            prev_idx: self.in_idx,
        }
    }
}

/// One entry in an address's transaction history, as surfaced to wallet
/// owners querying their own activity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct HistoryTx {
    pub tx_hash: Hash32,
    pub value: i64,
    pub label: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_txout(value: u64) -> TxOut {
        TxOut {
            value,
            address: "-----BEGIN PUBLIC KEY-----\nMFk...\n-----END PUBLIC KEY-----".to_string(),
        }
    }

    fn sample_stamp() -> Stamp {
        Stamp {
            r: vec![1; 32],
            s: vec![2; 32],
            pub_key: b"pubkey".to_vec(),
            hash: Hash32([7; HASH_SIZE]),
            timestamp: 1_700_000_000,
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            ins: vec![TxIn {
                prev_hash: Hash32([0x11; HASH_SIZE]),
                prev_idx: 0,
            }],
            outs: vec![sample_txout(50)],
            stamp: sample_stamp(),
        }
    }

    fn sample_coinbase() -> Transaction {
        Transaction {
            ins: vec![],
            outs: vec![sample_txout(100)],
            stamp: sample_stamp(),
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            height: 1,
            hash: Hash32::ZERO,
            prec_hash: Hash32::ZERO,
            merkle_hash: Hash32::ZERO,
            target: crate::constants::BASE_TARGET,
            timestamp: 1_700_000_000,
            nonce: 0,
        }
    }

    // --- Transaction ---

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn total_output_value_sums_correctly() {
        let tx = Transaction {
            ins: vec![],
            outs: vec![sample_txout(100), sample_txout(200), sample_txout(300)],
            stamp: sample_stamp(),
        };
        assert_eq!(tx.total_output_value(), Some(600));
    }

    #[test]
    fn total_output_value_overflow_returns_none() {
        let tx = Transaction {
            ins: vec![],
            outs: vec![sample_txout(u64::MAX), sample_txout(1)],
            stamp: sample_stamp(),
        };
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn total_output_value_empty() {
        let tx = Transaction {
            ins: vec![],
            outs: vec![],
            stamp: sample_stamp(),
        };
        assert_eq!(tx.total_output_value(), Some(0));
    }

    // --- Block ---

    #[test]
    fn block_coinbase_accessor() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase()],
        };
        assert!(block.coinbase().is_some());
    }

    #[test]
    fn block_empty_has_no_coinbase() {
        let block = Block {
            header: sample_header(),
            transactions: vec![],
        };
        assert!(block.coinbase().is_none());
    }

    // --- UnspentTxOut ---

    #[test]
    fn unspent_as_txin_matches_fields() {
        let utxo = UnspentTxOut {
            out: sample_txout(10),
            tx_hash: Hash32([9; HASH_SIZE]),
            in_idx: 2,
            targeted: false,
        };
        let txin = utxo.as_txin();
        assert_eq!(txin.prev_hash, utxo.tx_hash);
        assert_eq!(txin.prev_idx, 2);
    }

    // --- Bincode round-trips ---

    #[test]
    fn bincode_round_trip_transaction() {
        let tx = sample_tx();
        let encoded = bincode::encode_to_vec(&tx, bincode::config::standard()).unwrap();
        let (decoded, _): (Transaction, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn bincode_round_trip_block_header() {
        let header = sample_header();
        let encoded = bincode::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let (decoded, _): (BlockHeader, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn bincode_round_trip_block() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase(), sample_tx()],
        };
        let encoded = bincode::encode_to_vec(&block, bincode::config::standard()).unwrap();
        let (decoded, _): (Block, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn bincode_round_trip_unspent_txout() {
        let utxo = UnspentTxOut {
            out: sample_txout(77),
            tx_hash: Hash32([0xCC; HASH_SIZE]),
            in_idx: 4,
            targeted: true,
        };
        let encoded = bincode::encode_to_vec(&utxo, bincode::config::standard()).unwrap();
        let (decoded, _): (UnspentTxOut, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(utxo, decoded);
    }

    #[test]
    fn bincode_round_trip_history_tx() {
        let h = HistoryTx {
            tx_hash: Hash32([3; HASH_SIZE]),
            value: -42,
            label: "Miner fee (Block 7)".to_string(),
            timestamp: 1_700_000_100,
        };
        let encoded = bincode::encode_to_vec(&h, bincode::config::standard()).unwrap();
        let (decoded, _): (HistoryTx, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(h, decoded);
    }
}
