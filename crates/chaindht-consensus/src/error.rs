//! Error types for block and mempool handling.

use thiserror::Error;

/// Reasons a candidate block is rejected as the new tip or as a historical
/// block replayed from the DHT. Rejection is never fatal: the engine logs
/// and returns, it does not retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block height {got} does not follow last block height {expected}")]
    WrongHeight { expected: u64, got: u64 },
    #[error("block header hash does not match its recomputed hash")]
    HashMismatch,
    #[error("first transaction is not a well-formed coinbase")]
    BadCoinbaseShape,
    #[error("transaction {index} failed verification: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: chaindht_core::error::TransactionError,
    },
    #[error("merkle root does not match recomputed root")]
    MerkleMismatch,
    #[error("block does not extend the current chain tip")]
    WrongPrecHash,
    #[error("block target does not match the current chain target")]
    WrongTarget,
    #[error("block contains a double-spend across its own transactions")]
    InternalDoubleSpend,
    #[error("historical block hash does not match the stored header at height {height}")]
    HistoricalHashMismatch { height: u64 },
}

/// Reasons a transaction is refused admission to the pending-transaction
/// pool. Refusal is logged and the transaction is simply not added.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction failed verification: {0}")]
    Invalid(#[from] chaindht_core::error::TransactionError),
    #[error("transaction double-spends a UTXO already targeted by a pending transaction")]
    DoubleSpend,
    #[error("transaction is already pending")]
    AlreadyPending,
}
