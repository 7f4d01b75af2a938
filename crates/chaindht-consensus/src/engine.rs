//! The chain engine: header list, last-block pointer, mempool, and the
//! verify/apply/mine/retarget operations that drive the chain forward.
//!
//! Every mutating method here is meant to be called with the caller already
//! holding the node's single read/write lock (see `chaindht-node::node`);
//! this crate itself does not lock anything, so it can be exercised
//! directly in tests without any concurrency machinery.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chaindht_core::constants::RETARGET_INTERVAL;
use chaindht_core::crypto::KeyPair;
use chaindht_core::error::TransactionError;
use chaindht_core::genesis;
use chaindht_core::hash::Hash32;
use chaindht_core::merkle;
use chaindht_core::stats::Stats;
use chaindht_core::tx;
use chaindht_core::types::{Block, BlockHeader, HistoryTx, Target, Transaction};
use chaindht_core::utxo::UtxoIndex;

use crate::difficulty;
use crate::error::{BlockError, MempoolError};

/// Read-only snapshot of engine state for stats/GUI observers.
///
/// Fields that depend on the DHT transport (connected peers, stored key
/// count) are not included here — the node composition layer fills those
/// in alongside this snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub blocks_height: u64,
    pub time_since_last_block: i64,
    pub waiting_transaction_count: usize,
    pub processing_transaction_count: usize,
}

/// The blockchain state engine: headers, UTXOs, mempool, and the chain
/// rules that connect them.
pub struct ChainEngine {
    own_address: String,
    headers: Vec<BlockHeader>,
    last_block: Block,
    last_block_target_changed: Block,
    last_target: Target,
    utxo: UtxoIndex,
    pending: Vec<Transaction>,
    mining_block: Option<Block>,
    running: bool,
    history: Vec<HistoryTx>,
}

impl ChainEngine {
    /// Start a fresh engine at the genesis block for a node whose own
    /// wallet address is `own_address` (a PEM-encoded public key).
    pub fn new(own_address: String) -> Self {
        let genesis_block = genesis::genesis_block().clone();
        Self {
            own_address,
            headers: vec![genesis_block.header.clone()],
            last_target: genesis_block.header.target,
            last_block_target_changed: genesis_block.clone(),
            last_block: genesis_block,
            utxo: UtxoIndex::new(),
            pending: Vec::new(),
            mining_block: None,
            running: false,
            history: Vec::new(),
        }
    }

    pub fn last_block(&self) -> &Block {
        &self.last_block
    }

    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn utxo(&self) -> &UtxoIndex {
        &self.utxo
    }

    pub fn history(&self) -> &[HistoryTx] {
        &self.history
    }

    /// Pending transactions whose net effect touches this node's own
    /// address, for the "waiting" view the stats/GUI observers show.
    pub fn pending_summary(&self) -> Vec<&Transaction> {
        self.pending
            .iter()
            .filter(|tx| {
                tx.outs.iter().any(|o| o.address == self.own_address)
                    || String::from_utf8_lossy(&tx.stamp.pub_key) == self.own_address
            })
            .collect()
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let now = current_timestamp();
        EngineSnapshot {
            blocks_height: self.last_block.header.height,
            time_since_last_block: now - self.last_block.header.timestamp,
            waiting_transaction_count: self.pending.len(),
            processing_transaction_count: if self.running {
                self.mining_block
                    .as_ref()
                    .map(|b| b.transactions.len().saturating_sub(1))
                    .unwrap_or(0)
            } else {
                0
            },
        }
    }

    /// `base_target / last_target`, the current chain difficulty.
    pub fn difficulty(&self) -> num_bigint::BigUint {
        let base = num_bigint::BigUint::from_bytes_be(&chaindht_core::constants::BASE_TARGET);
        let actual = num_bigint::BigUint::from_bytes_be(&self.last_target);
        if actual == num_bigint::BigUint::from(0u32) {
            return base;
        }
        base / actual
    }

    // --- Candidate construction & mining ---

    /// Build a new candidate block: coinbase plus the current pending
    /// transactions, extending the current tip.
    pub fn new_candidate(&mut self, miner_key: &KeyPair) -> Block {
        let coinbase = tx::new_coinbase(miner_key, &self.own_address);
        let mut transactions = vec![coinbase];
        transactions.extend(self.pending.iter().cloned());

        let merkle_hash = merkle::merkle_root(
            &transactions.iter().map(|t| t.stamp.hash).collect::<Vec<_>>(),
        );

        let header = BlockHeader {
            height: self.last_block.header.height + 1,
            hash: Hash32::ZERO,
            prec_hash: self.last_block.header.hash,
            merkle_hash,
            target: self.last_target,
            timestamp: current_timestamp(),
            nonce: 0,
        };

        let candidate = Block { header, transactions };
        self.mining_block = Some(candidate.clone());
        candidate
    }

    /// Proof-of-work search: increment nonce and re-read the timestamp on
    /// every attempt until the header hash compares less than its target,
    /// or `stop` is observed set. Returns `None` if cancelled.
    pub fn mine(mut candidate: Block, stop: &AtomicBool, stats: &mut Stats) -> Option<Block> {
        let mut hash = candidate.header.compute_hash();
        while !stop.load(Ordering::Relaxed)
            && chaindht_core::hash::compare_bytes(hash.as_bytes(), &candidate.header.target)
                != std::cmp::Ordering::Less
        {
            candidate.header.nonce = candidate.header.nonce.wrapping_add(1);
            candidate.header.timestamp = current_timestamp();
            hash = candidate.header.compute_hash();
            stats.record_hash();
        }
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        candidate.header.hash = hash;
        Some(candidate)
    }

    // --- Verification ---

    /// Verify `block` as the new chain tip.
    pub fn verify(&self, block: &Block) -> Result<(), BlockError> {
        if block.header.height != self.last_block.header.height + 1 {
            return Err(BlockError::WrongHeight {
                expected: self.last_block.header.height + 1,
                got: block.header.height,
            });
        }
        if block.header.prec_hash != self.last_block.header.hash {
            return Err(BlockError::WrongPrecHash);
        }
        if block.header.target != self.last_target {
            return Err(BlockError::WrongTarget);
        }
        self.verify_structure(block)
    }

    /// Verify a historical block replayed from the DHT at a height we
    /// already have a stored header for: same structural checks as
    /// [`verify`](Self::verify) plus equality with the stored hash.
    pub fn verify_old(&self, block: &Block) -> Result<(), BlockError> {
        self.verify_structure(block)?;
        let stored = self
            .headers
            .iter()
            .find(|h| h.height == block.header.height);
        match stored {
            Some(stored) if stored.hash == block.header.hash => Ok(()),
            _ => Err(BlockError::HistoricalHashMismatch {
                height: block.header.height,
            }),
        }
    }

    fn verify_structure(&self, block: &Block) -> Result<(), BlockError> {
        if block.header.compute_hash() != block.header.hash {
            return Err(BlockError::HashMismatch);
        }

        let coinbase = block.transactions.first().ok_or(BlockError::BadCoinbaseShape)?;
        if !coinbase.is_coinbase() || coinbase.outs.len() != 1 {
            return Err(BlockError::BadCoinbaseShape);
        }

        for (index, transaction) in block.transactions.iter().enumerate() {
            tx::verify(transaction, &self.utxo).map_err(|source| BlockError::InvalidTransaction {
                index,
                source,
            })?;
        }

        let leaves: Vec<Hash32> = block.transactions.iter().map(|t| t.stamp.hash).collect();
        if merkle::merkle_root(&leaves) != block.header.merkle_hash {
            return Err(BlockError::MerkleMismatch);
        }

        let mut seen = HashSet::new();
        for transaction in &block.transactions {
            for input in &transaction.ins {
                if !seen.insert((input.prev_hash, input.prev_idx)) {
                    return Err(BlockError::InternalDoubleSpend);
                }
            }
        }

        Ok(())
    }

    // --- Apply ---

    /// Verify and apply `block` as the new tip. On success, updates the
    /// UTXO index, drops mined transactions from the mempool, retargets
    /// difficulty every [`RETARGET_INTERVAL`] blocks, and returns the new
    /// history entries. On failure, state is unchanged.
    pub fn add_block(&mut self, block: Block) -> Result<Vec<HistoryTx>, BlockError> {
        self.verify(&block)?;

        if block.header.prec_hash == genesis::genesis_hash() {
            self.last_block_target_changed = block.clone();
        }

        let new_history = self
            .utxo
            .update(&block, &self.own_address)
            .expect("a block that passed verify() always applies cleanly");

        self.headers.push(block.header.clone());
        let mined: HashSet<Hash32> = block.transactions.iter().map(|t| t.stamp.hash).collect();
        self.pending.retain(|t| !mined.contains(&t.stamp.hash));

        self.last_block = block;
        self.history.extend(new_history.clone());

        if self.last_block.header.height % RETARGET_INTERVAL == 0 {
            self.retarget();
        }

        Ok(new_history)
    }

    fn retarget(&mut self) {
        self.last_target = difficulty::retarget(
            &self.last_block.header.target,
            self.last_block.header.timestamp,
            self.last_block_target_changed.header.timestamp,
        );
        self.last_block_target_changed = self.last_block.clone();
    }

    // --- Mempool ---

    /// Verify and admit `transaction` to the pending pool, rejecting
    /// double-spends against UTXOs already targeted by another pending
    /// transaction.
    pub fn add_pending(&mut self, transaction: Transaction) -> Result<(), MempoolError> {
        if self.pending.iter().any(|t| t.stamp.hash == transaction.stamp.hash) {
            return Err(MempoolError::AlreadyPending);
        }

        tx::verify(&transaction, &self.utxo).map_err(MempoolError::Invalid)?;

        let sender = String::from_utf8_lossy(&transaction.stamp.pub_key).into_owned();
        for input in &transaction.ins {
            match self.utxo.find(&sender, input.prev_hash, input.prev_idx) {
                Some(utxo) if utxo.targeted => return Err(MempoolError::DoubleSpend),
                Some(_) => {}
                None => return Err(TransactionError::UnknownUtxo {
                    prev_hash: input.prev_hash.to_string(),
                    prev_idx: input.prev_idx,
                }
                .into()),
            }
        }

        let spent: Vec<_> = transaction
            .ins
            .iter()
            .filter_map(|input| self.utxo.find(&sender, input.prev_hash, input.prev_idx).cloned())
            .collect();
        self.utxo.mark_targeted(&sender, &spent);

        self.pending.push(transaction);
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
