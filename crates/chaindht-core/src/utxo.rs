//! Unspent transaction output index.
//!
//! Keyed by the *sanitized* PEM public key string (PEM header/footer and
//! newlines stripped) so that minor whitespace differences in how an
//! address was encoded never cause a lookup miss.

use std::collections::HashMap;

use crate::error::UtxoError;
use crate::hash::Hash32;
use crate::types::{Block, HistoryTx, TxIn, TxOut, UnspentTxOut};

/// Strip PEM armor and newlines, leaving the bare base64 body as the map key.
pub fn sanitize_address(address: &str) -> String {
    address
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>()
}

/// Per-address unspent output bookkeeping.
#[derive(Debug, Default)]
pub struct UtxoIndex {
    unspent: HashMap<String, Vec<UnspentTxOut>>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All unspent outputs currently recorded for `address`.
    pub fn entries(&self, address: &str) -> &[UnspentTxOut] {
        self.unspent
            .get(&sanitize_address(address))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sum of unspent values for `address`.
    pub fn funds(&self, address: &str) -> u64 {
        self.entries(address).iter().map(|u| u.out.value).sum()
    }

    /// Accumulate untargeted unspent outputs for `address` until the running
    /// total strictly exceeds `value`. Returns an empty vector if the
    /// address's untargeted funds can never exceed `value`.
    pub fn enough_own(&self, address: &str, value: u64) -> Vec<UnspentTxOut> {
        let mut total = 0u64;
        let mut selected = Vec::new();
        for utxo in self.entries(address).iter().filter(|u| !u.targeted) {
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.out.value);
            if total > value {
                return selected;
            }
        }
        Vec::new()
    }

    /// Build the `(ins, outs)` pair for a transaction spending `utxos`
    /// toward `dest`, returning change to `change_address` when the
    /// selected total exceeds `value`.
    pub fn in_out_from_unspent(
        value: u64,
        dest: &str,
        change_address: &str,
        utxos: &[UnspentTxOut],
    ) -> (Vec<TxIn>, Vec<TxOut>) {
        let ins: Vec<TxIn> = utxos.iter().map(UnspentTxOut::as_txin).collect();
        let total: u64 = utxos.iter().map(|u| u.out.value).sum();

        let mut outs = vec![TxOut {
            value,
            address: dest.to_string(),
        }];
        if total > value {
            outs.push(TxOut {
                value: total - value,
                address: change_address.to_string(),
            });
        }
        (ins, outs)
    }

    /// Mark a set of unspent outputs as reserved by a pending transaction so
    /// a second spend attempt against them is rejected before it reaches the
    /// chain.
    pub fn mark_targeted(&mut self, address: &str, utxos: &[UnspentTxOut]) {
        let key = sanitize_address(address);
        let Some(entries) = self.unspent.get_mut(&key) else {
            return;
        };
        for entry in entries.iter_mut() {
            if utxos
                .iter()
                .any(|u| u.tx_hash == entry.tx_hash && u.in_idx == entry.in_idx)
            {
                entry.targeted = true;
            }
        }
    }

    /// Clear the `targeted` flag on a set of unspent outputs, e.g. when the
    /// mempool transaction reserving them is dropped without being mined.
    pub fn clear_targeted(&mut self, address: &str, utxos: &[UnspentTxOut]) {
        let key = sanitize_address(address);
        let Some(entries) = self.unspent.get_mut(&key) else {
            return;
        };
        for entry in entries.iter_mut() {
            if utxos
                .iter()
                .any(|u| u.tx_hash == entry.tx_hash && u.in_idx == entry.in_idx)
            {
                entry.targeted = false;
            }
        }
    }

    /// Remove the unspent output matching `(prev_hash, prev_idx)` from
    /// `address`'s set. Failing to find it is a critical invariant
    /// violation: it can only happen for a block that passed verification
    /// against a UTXO set that has since diverged.
    pub fn remove(
        &mut self,
        address: &str,
        prev_hash: Hash32,
        prev_idx: u32,
    ) -> Result<UnspentTxOut, UtxoError> {
        let key = sanitize_address(address);
        let entries = self.unspent.get_mut(&key).ok_or_else(|| UtxoError::NotFound {
            address: key.clone(),
            prev_hash: prev_hash.to_string(),
            prev_idx,
        })?;
        let pos = entries
            .iter()
            .position(|u| u.tx_hash == prev_hash && u.in_idx == prev_idx)
            .ok_or_else(|| UtxoError::NotFound {
                address: key.clone(),
                prev_hash: prev_hash.to_string(),
                prev_idx,
            })?;
        Ok(entries.remove(pos))
    }

    /// Look up a single unspent output by `(prev_hash, prev_idx)` under
    /// `address`, without removing it.
    pub fn find(&self, address: &str, prev_hash: Hash32, prev_idx: u32) -> Option<&UnspentTxOut> {
        self.entries(address)
            .iter()
            .find(|u| u.tx_hash == prev_hash && u.in_idx == prev_idx)
    }

    fn insert(&mut self, address: &str, utxo: UnspentTxOut) {
        self.unspent
            .entry(sanitize_address(address))
            .or_default()
            .push(utxo);
    }

    /// Apply a block's transactions in order: remove spent inputs, append
    /// new outputs, and return a history entry summarizing each
    /// transaction's net effect on `own_address`.
    pub fn update(&mut self, block: &Block, own_address: &str) -> Result<Vec<HistoryTx>, UtxoError> {
        let own_key = sanitize_address(own_address);
        let mut history = Vec::new();

        for (is_coinbase, tx) in block
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| (i == 0, tx))
        {
            let mut own_delta: i64 = 0;

            let sender = String::from_utf8_lossy(&tx.stamp.pub_key).into_owned();
            for txin in &tx.ins {
                let spent = self.remove(&sender, txin.prev_hash, txin.prev_idx)?;
                if sanitize_address(&spent.out.address) == own_key {
                    own_delta -= spent.out.value as i64;
                }
            }

            for (idx, out) in tx.outs.iter().enumerate() {
                self.insert(
                    &out.address,
                    UnspentTxOut {
                        out: out.clone(),
                        tx_hash: tx.stamp.hash,
                        in_idx: idx as u32,
                        targeted: false,
                    },
                );
                if sanitize_address(&out.address) == own_key {
                    own_delta += out.value as i64;
                }
            }

            if own_delta != 0 {
                let label = if is_coinbase {
                    format!("Miner fee (Block {})", block.header.height)
                } else {
                    "Transaction".to_string()
                };
                history.push(HistoryTx {
                    tx_hash: tx.stamp.hash,
                    value: own_delta,
                    label,
                    timestamp: tx.stamp.timestamp,
                });
            }
        }

        Ok(history)
    }
}
