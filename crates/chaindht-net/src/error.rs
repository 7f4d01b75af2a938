//! Transport-level errors.
//!
//! Per the node's error handling design, no `DhtError` crosses into the
//! chain engine: callers log and treat failures as "end of chain" (sync) or
//! retry after a delay (poll).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DhtError {
    #[error("dht get for key {key} found nothing")]
    NotFound { key: String },

    #[error("dht put failed: {reason}")]
    PutFailed { reason: String },

    #[error("dht get failed: {reason}")]
    GetFailed { reason: String },

    #[error("swarm task is not running")]
    TransportStopped,

    #[error("invalid listen address: {0}")]
    InvalidListenAddr(String),

    #[error("invalid bootstrap address: {0}")]
    InvalidBootstrapAddr(String),
}
