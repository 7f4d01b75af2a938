//! Wallet directory loading: scans `<folder>/wallets/*.key` for PKCS#8 PEM
//! ECDSA private keys and generates a `main.key` when the directory is empty.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::WalletError;
use crate::wallet::Wallet;

const KEY_EXTENSION: &str = "key";
const DEFAULT_WALLET_NAME: &str = "main.key";

/// Load every `*.key` file under `<folder>/wallets/`, generating a fresh
/// `main.key` if the directory is empty or does not yet exist.
pub fn load_or_create_wallets(folder: &Path) -> Result<Vec<Wallet>, WalletError> {
    let wallets_dir = folder.join("wallets");
    ensure_dir(&wallets_dir)?;

    let key_paths = list_key_files(&wallets_dir)?;
    if key_paths.is_empty() {
        info!(dir = %wallets_dir.display(), "no wallet keys found, generating main.key");
        let wallet = Wallet::generate(DEFAULT_WALLET_NAME)?;
        persist(&wallets_dir.join(DEFAULT_WALLET_NAME), &wallet)?;
        return Ok(vec![wallet]);
    }

    let mut wallets = Vec::with_capacity(key_paths.len());
    for path in key_paths {
        wallets.push(load_one(&path)?);
    }
    Ok(wallets)
}

/// Persist a wallet's private key as PKCS#8 PEM under `<folder>/wallets/<name>`
/// with owner-only permissions where the platform supports it.
pub fn persist(path: &Path, wallet: &Wallet) -> Result<(), WalletError> {
    let pem = wallet.to_pkcs8_pem()?;
    fs::write(path, pem).map_err(|e| WalletError::Unwritable { path: path.display().to_string(), reason: e.to_string() })?;
    restrict_permissions(path)?;
    Ok(())
}

fn load_one(path: &Path) -> Result<Wallet, WalletError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let pem = fs::read_to_string(path)
        .map_err(|e| WalletError::Unreadable { path: path.display().to_string(), reason: e.to_string() })?;
    Wallet::from_pkcs8_pem(name, &path.display().to_string(), &pem)
}

fn list_key_files(dir: &Path) -> Result<Vec<PathBuf>, WalletError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| WalletError::Unreadable { path: dir.display().to_string(), reason: e.to_string() })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WalletError::Unreadable { path: dir.display().to_string(), reason: e.to_string() })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(KEY_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn ensure_dir(dir: &Path) -> Result<(), WalletError> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| WalletError::DirectoryUnavailable { path: dir.display().to_string(), reason: e.to_string() })
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), WalletError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| WalletError::Unwritable { path: path.display().to_string(), reason: e.to_string() })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), WalletError> {
    warn!("file permission restriction is only enforced on unix platforms");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_generates_main_key() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = load_or_create_wallets(dir.path()).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, DEFAULT_WALLET_NAME);
        assert!(dir.path().join("wallets").join(DEFAULT_WALLET_NAME).exists());
    }

    #[test]
    fn reloading_returns_the_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_wallets(dir.path()).unwrap();
        let second = load_or_create_wallets(dir.path()).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].pub_pem, second[0].pub_pem);
    }

    #[test]
    fn loads_multiple_key_files() {
        let dir = tempfile::tempdir().unwrap();
        let wallets_dir = dir.path().join("wallets");
        fs::create_dir_all(&wallets_dir).unwrap();

        let a = Wallet::generate("a.key").unwrap();
        let b = Wallet::generate("b.key").unwrap();
        persist(&wallets_dir.join("a.key"), &a).unwrap();
        persist(&wallets_dir.join("b.key"), &b).unwrap();

        let loaded = load_or_create_wallets(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn malformed_key_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let wallets_dir = dir.path().join("wallets");
        fs::create_dir_all(&wallets_dir).unwrap();
        fs::write(wallets_dir.join("bad.key"), "not a pem").unwrap();

        let result = load_or_create_wallets(dir.path());
        assert!(matches!(result, Err(WalletError::MalformedPem { .. })));
    }

    #[test]
    fn non_key_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let wallets_dir = dir.path().join("wallets");
        fs::create_dir_all(&wallets_dir).unwrap();
        fs::write(wallets_dir.join("readme.txt"), "hello").unwrap();

        let wallets = load_or_create_wallets(dir.path()).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, DEFAULT_WALLET_NAME);
    }
}
