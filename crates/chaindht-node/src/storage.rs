//! Flat-file persistence: block headers grouped into fixed-size files under
//! `<data_dir>/chain/`, and per-address unspent output sets under
//! `<data_dir>/unspent/`.
//!
//! Wallet persistence lives in [`chaindht_wallet::store`]; this module only
//! covers the chain and UTXO data a node rebuilds its in-memory
//! [`chaindht_consensus::ChainEngine`] state from on restart.

use std::fs;
use std::path::{Path, PathBuf};

use chaindht_core::constants::HEADERS_PER_FILE;
use chaindht_core::types::{BlockHeader, UnspentTxOut};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("corrupt data in {path}: {source}")]
    Decode { path: PathBuf, source: bincode::error::DecodeError },
    #[error("cannot encode data for {path}: {source}")]
    Encode { path: PathBuf, source: bincode::error::EncodeError },
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir { path: dir.to_path_buf(), source })
}

fn encode_to_file(path: &Path, value: &impl bincode::Encode) -> Result<(), StorageError> {
    let bytes = bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|source| StorageError::Encode { path: path.to_path_buf(), source })?;
    fs::write(path, bytes).map_err(|source| StorageError::Write { path: path.to_path_buf(), source })
}

fn decode_from_file<T: bincode::Decode<()>>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path).map_err(|source| StorageError::Read { path: path.to_path_buf(), source })?;
    let (value, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|source| StorageError::Decode { path: path.to_path_buf(), source })?;
    Ok(value)
}

/// Which group file a header at `height` belongs to.
fn group_of(height: u64) -> u64 {
    height / HEADERS_PER_FILE
}

fn group_path(chain_dir: &Path, group: u64) -> PathBuf {
    chain_dir.join(group.to_string())
}

/// Append `header` to its group file under `chain_dir`, creating the
/// directory and the file's group on first use.
pub fn append_header(chain_dir: &Path, header: &BlockHeader) -> Result<(), StorageError> {
    ensure_dir(chain_dir)?;
    let group = group_of(header.height);
    let path = group_path(chain_dir, group);

    let mut headers: Vec<BlockHeader> = if path.exists() { decode_from_file(&path)? } else { Vec::new() };
    headers.push(header.clone());
    encode_to_file(&path, &headers)
}

/// Load every header stored under `chain_dir`, across every group file, in
/// height order. Returns an empty vector if the directory does not exist
/// yet (a brand-new node with no chain history).
pub fn load_all_headers(chain_dir: &Path) -> Result<Vec<BlockHeader>, StorageError> {
    if !chain_dir.exists() {
        return Ok(Vec::new());
    }

    let mut groups: Vec<u64> = fs::read_dir(chain_dir)
        .map_err(|source| StorageError::Read { path: chain_dir.to_path_buf(), source })?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()))
        .collect();
    groups.sort_unstable();

    let mut all = Vec::new();
    for group in groups {
        let path = group_path(chain_dir, group);
        let mut headers: Vec<BlockHeader> = decode_from_file(&path)?;
        all.append(&mut headers);
    }
    all.sort_by_key(|h| h.height);
    Ok(all)
}

/// Overwrite the headers for a given group (used when a node's chain state
/// is rebuilt from scratch rather than appended to incrementally).
pub fn rewrite_headers(chain_dir: &Path, headers: &[BlockHeader]) -> Result<(), StorageError> {
    ensure_dir(chain_dir)?;
    for chunk in headers.chunks(HEADERS_PER_FILE as usize) {
        let group = group_of(chunk[0].height);
        let path = group_path(chain_dir, group);
        encode_to_file(&path, &chunk.to_vec())?;
    }
    Ok(())
}

fn unspent_path(unspent_dir: &Path, address: &str) -> PathBuf {
    unspent_dir.join(urlencoding::encode(address).into_owned())
}

/// Persist `entries` as the complete unspent set for `address`, replacing
/// whatever was previously stored.
pub fn save_unspent(unspent_dir: &Path, address: &str, entries: &[UnspentTxOut]) -> Result<(), StorageError> {
    ensure_dir(unspent_dir)?;
    let path = unspent_path(unspent_dir, address);
    encode_to_file(&path, &entries.to_vec())
}

/// Load the unspent set previously saved for `address`, or an empty vector
/// if none has ever been written.
pub fn load_unspent(unspent_dir: &Path, address: &str) -> Result<Vec<UnspentTxOut>, StorageError> {
    let path = unspent_path(unspent_dir, address);
    if !path.exists() {
        return Ok(Vec::new());
    }
    decode_from_file(&path)
}

/// Every address with a persisted unspent file, derived from the file
/// names under `unspent_dir` (URL-decoded back to PEM addresses).
pub fn known_addresses(unspent_dir: &Path) -> Result<Vec<String>, StorageError> {
    if !unspent_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(unspent_dir)
        .map_err(|source| StorageError::Read { path: unspent_dir.to_path_buf(), source })?;

    let mut addresses = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(decoded) = urlencoding::decode(name) {
                addresses.push(decoded.into_owned());
            }
        }
    }
    Ok(addresses)
}
