//! Canonical binary encoding shared by every hashed or persisted structure.
//!
//! Built on `bincode`'s standard configuration: fixed field order, no
//! padding, and deterministic output for equal inputs — the property block
//! and transaction hashing depends on. `decode(encode(x)) == x` for every
//! type in [`crate::types`].

use crate::error::TransactionError;

/// Encode `value` with the canonical configuration.
pub fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, TransactionError> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| TransactionError::Serialization(e.to_string()))
}

/// Decode a value of type `T` previously produced by [`encode`].
pub fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, TransactionError> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| TransactionError::Serialization(e.to_string()))
}
