//! Wallet error types.
//!
//! Every variant here is startup-fatal: a wallet directory that fails to
//! load is not something the node can run around, so these errors are
//! logged at critical severity and abort the process.

use chaindht_core::error::CryptoError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("could not read wallet file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("wallet file {path} is not valid PKCS#8 PEM: {source}")]
    MalformedPem {
        path: String,
        #[source]
        source: CryptoError,
    },

    #[error("could not write wallet file {path}: {reason}")]
    Unwritable { path: String, reason: String },

    #[error("wallet directory {path} could not be created: {reason}")]
    DirectoryUnavailable { path: String, reason: String },
}
