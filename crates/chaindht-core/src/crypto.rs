//! ECDSA (NIST P-256) key handling: generation, PEM encode/decode, signing,
//! and verification.
//!
//! Transaction and wallet addresses are PEM-encoded SubjectPublicKeyInfo
//! strings. Signing operates over a pre-computed [`Hash32`] — callers in
//! [`crate::tx`] are responsible for producing that hash from a
//! zeroed-signature transaction encoding.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use std::fmt;

use crate::error::CryptoError;
use crate::hash::Hash32;

/// An ECDSA P-256 keypair used to sign transactions.
///
/// Wraps [`p256::ecdsa::SigningKey`]; the scalar is zeroized on drop by the
/// underlying `elliptic-curve` crate.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Load a keypair from a PKCS#8 PEM-encoded private key (the on-disk
    /// format used by wallet `.key` files).
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|_| CryptoError::InvalidPrivateKeyPem)?;
        Ok(Self { signing_key })
    }

    /// Encode this keypair's private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String, CryptoError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|zstr| zstr.to_string())
            .map_err(|_| CryptoError::InvalidPrivateKeyPem)
    }

    /// Derive the public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: *self.signing_key.verifying_key(),
        }
    }

    /// Sign a hash, returning the raw big-endian `(r, s)` scalar components.
    pub fn sign_hash(&self, hash: &Hash32) -> (Vec<u8>, Vec<u8>) {
        let signature: Signature = self.signing_key.sign(hash.as_bytes());
        let (r, s) = signature.split_bytes();
        (r.to_vec(), s.to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// An ECDSA P-256 public key, exchanged and stored as PEM-encoded
/// SubjectPublicKeyInfo.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Decode a PEM-encoded SubjectPublicKeyInfo public key.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let verifying_key =
            VerifyingKey::from_public_key_pem(pem).map_err(|_| CryptoError::InvalidPublicKeyPem)?;
        Ok(Self { verifying_key })
    }

    /// Encode this key as PEM SubjectPublicKeyInfo.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| CryptoError::InvalidPublicKeyPem)
    }

    /// Verify a signature given as raw big-endian `(r, s)` bytes over `hash`.
    pub fn verify_hash(&self, hash: &Hash32, r: &[u8], s: &[u8]) -> Result<(), CryptoError> {
        let signature = Signature::from_scalars(
            pad_to_32(r).map_err(|_| CryptoError::VerificationFailed)?,
            pad_to_32(s).map_err(|_| CryptoError::VerificationFailed)?,
        )
        .map_err(|_| CryptoError::VerificationFailed)?;
        self.verifying_key
            .verify(hash.as_bytes(), &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({:?})", self.to_pem().unwrap_or_default())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.verifying_key == other.verifying_key
    }
}

impl Eq for PublicKey {}

/// Left-pad a scalar component to exactly 32 bytes, as required by
/// [`p256::ecdsa::Signature::from_scalars`].
fn pad_to_32(bytes: &[u8]) -> Result<[u8; 32], ()> {
    if bytes.len() > 32 {
        return Err(());
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn generate_produces_usable_keypair() {
        let kp = KeyPair::generate();
        let pk = kp.public_key();
        let h = sha256(b"hello");
        let (r, s) = kp.sign_hash(&h);
        assert!(pk.verify_hash(&h, &r, &s).is_ok());
    }

    #[test]
    fn wrong_hash_fails_verification() {
        let kp = KeyPair::generate();
        let pk = kp.public_key();
        let (r, s) = kp.sign_hash(&sha256(b"hello"));
        assert!(pk.verify_hash(&sha256(b"world"), &r, &s).is_err());
    }

    #[test]
    fn different_keypair_fails_verification() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let h = sha256(b"hello");
        let (r, s) = kp1.sign_hash(&h);
        assert!(kp2.public_key().verify_hash(&h, &r, &s).is_err());
    }

    #[test]
    fn private_key_pem_round_trips() {
        let kp = KeyPair::generate();
        let pem = kp.to_pkcs8_pem().unwrap();
        let kp2 = KeyPair::from_pkcs8_pem(&pem).unwrap();
        assert_eq!(kp.public_key(), kp2.public_key());
    }

    #[test]
    fn public_key_pem_round_trips() {
        let kp = KeyPair::generate();
        let pk = kp.public_key();
        let pem = pk.to_pem().unwrap();
        let pk2 = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(pk, pk2);
    }

    #[test]
    fn public_key_pem_is_pem_formatted() {
        let pem = KeyPair::generate().public_key().to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(pem.trim_end().ends_with("-----END PUBLIC KEY-----"));
    }

    #[test]
    fn invalid_pem_is_rejected() {
        assert!(PublicKey::from_pem("not a pem").is_err());
        assert!(KeyPair::from_pkcs8_pem("not a pem").is_err());
    }

    #[test]
    fn pad_to_32_rejects_oversized_input() {
        assert!(pad_to_32(&[1u8; 33]).is_err());
    }

    #[test]
    fn pad_to_32_preserves_short_input() {
        let padded = pad_to_32(&[0xAB]).unwrap();
        assert_eq!(padded[31], 0xAB);
        assert!(padded[..31].iter().all(|&b| b == 0));
    }
}
