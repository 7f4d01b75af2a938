//! Wallet identity: an ECDSA P-256 keypair loaded from, or written to, a
//! `.key` file.

use chaindht_core::crypto::KeyPair;

use crate::error::WalletError;

/// A single wallet identity: a signing key plus its cached PEM public key.
pub struct Wallet {
    pub name: String,
    pub signing_key: KeyPair,
    pub pub_pem: String,
}

impl Wallet {
    /// Generate a brand-new wallet identity named `name`.
    pub fn generate(name: impl Into<String>) -> Result<Self, WalletError> {
        let signing_key = KeyPair::generate();
        let pub_pem = signing_key
            .public_key()
            .to_pem()
            .map_err(|source| WalletError::MalformedPem { path: String::new(), source })?;
        Ok(Self { name: name.into(), signing_key, pub_pem })
    }

    /// Load a wallet identity from its PKCS#8 PEM private key text.
    pub fn from_pkcs8_pem(name: impl Into<String>, path: &str, pem: &str) -> Result<Self, WalletError> {
        let signing_key = KeyPair::from_pkcs8_pem(pem)
            .map_err(|source| WalletError::MalformedPem { path: path.to_string(), source })?;
        let pub_pem = signing_key
            .public_key()
            .to_pem()
            .map_err(|source| WalletError::MalformedPem { path: path.to_string(), source })?;
        Ok(Self { name: name.into(), signing_key, pub_pem })
    }

    pub fn to_pkcs8_pem(&self) -> Result<String, WalletError> {
        self.signing_key
            .to_pkcs8_pem()
            .map_err(|source| WalletError::MalformedPem { path: self.name.clone(), source })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_matching_pem() {
        let wallet = Wallet::generate("main.key").unwrap();
        assert_eq!(wallet.name, "main.key");
        assert!(wallet.pub_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn pkcs8_round_trip_preserves_address() {
        let original = Wallet::generate("main.key").unwrap();
        let pem = original.to_pkcs8_pem().unwrap();
        let loaded = Wallet::from_pkcs8_pem("main.key", "main.key", &pem).unwrap();
        assert_eq!(original.pub_pem, loaded.pub_pem);
    }

    #[test]
    fn malformed_pem_is_rejected() {
        let result = Wallet::from_pkcs8_pem("bad.key", "bad.key", "not a pem");
        assert!(matches!(result, Err(WalletError::MalformedPem { .. })));
    }

    #[test]
    fn debug_does_not_panic() {
        let wallet = Wallet::generate("main.key").unwrap();
        assert!(format!("{wallet:?}").contains("main.key"));
    }
}
