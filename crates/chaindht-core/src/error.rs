//! Error types for the core data model.

use thiserror::Error;

/// Failures from building, signing, or verifying a [`Transaction`](crate::types::Transaction).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("cannot sign transaction: {0}")]
    SigningFailed(String),
    #[error("hash mismatch in transaction stamp")]
    HashMismatch,
    #[error("cannot decode sender public key")]
    InvalidPublicKey,
    #[error("signature does not verify")]
    SignatureInvalid,
    #[error("bad coinbase amount: expected {expected}, got {got}")]
    BadCoinbaseAmount { expected: u64, got: u64 },
    #[error("unknown UTXO referenced by input {prev_hash}:{prev_idx}")]
    UnknownUtxo { prev_hash: String, prev_idx: u32 },
    #[error("outputs total {outs} exceeds inputs total {ins}")]
    OutputsExceedInputs { ins: u64, outs: u64 },
    #[error("serialization failure: {0}")]
    Serialization(String),
}

/// Failures from cryptographic operations (key decoding, signing, verifying).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid PEM public key")]
    InvalidPublicKeyPem,
    #[error("invalid PEM private key")]
    InvalidPrivateKeyPem,
    #[error("ECDSA signing failed: {0}")]
    SigningFailed(String),
    #[error("ECDSA signature does not verify")]
    VerificationFailed,
}

/// Critical-invariant violations in the UTXO index.
///
/// Per spec §7, these are logged at critical severity and abort the
/// application of the block that triggered them — they never occur for a
/// block that passed verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    #[error("unspent output not found for address {address}, outpoint {prev_hash}:{prev_idx}")]
    NotFound {
        address: String,
        prev_hash: String,
        prev_idx: u32,
    },
    #[error("unspent output not present at the expected position during removal")]
    RemovalFailed,
}
