//! # chaindht-wallet
//!
//! On-disk key store for node-owned wallet identities. Each wallet is an
//! ECDSA (P-256) keypair persisted as a PKCS#8 PEM `.key` file; loading an
//! empty wallet directory generates a fresh `main.key`.
//!
//! # Modules
//!
//! - [`error`] — `WalletError`, all variants fatal to node startup
//! - [`wallet`] — the [`Wallet`] identity type
//! - [`store`] — directory scanning, loading, and persistence

pub mod error;
pub mod store;
pub mod wallet;

pub use error::WalletError;
pub use store::load_or_create_wallets;
pub use wallet::Wallet;
