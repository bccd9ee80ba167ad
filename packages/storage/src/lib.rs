#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Durable key-value storage.
//!
//! The engine persists two kinds of records: the full geofence zone list
//! (one record, rewritten on every mutation) and one record per offline
//! region. Both go through the [`KeyValueStore`] trait so the storage
//! backend can be swapped. [`FileStore`] writes one JSON file per key
//! under a data directory, [`MemoryStore`] keeps everything in process for
//! tests and ephemeral sessions.
//!
//! Records are written inside a small versioned envelope
//! (`{"version": 1, "data": ...}`) by [`save_json`]. [`load_json`] also
//! accepts bare payloads written before the envelope existed.

pub mod file;
pub mod memory;
pub mod paths;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written into every envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The key is empty or contains characters that cannot be stored.
    #[error("Invalid storage key: {key:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// The record was written by a newer schema than this build reads.
    #[error("Record {key} has unsupported schema version {version}")]
    UnsupportedVersion {
        /// Key of the record.
        key: String,
        /// Version found in the envelope.
        version: u32,
    },
}

/// An asynchronous string-keyed store of string values.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes the value under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every stored key starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be listed.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Rejects keys that are empty or could escape a storage directory.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for unusable keys.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
        })
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored<T> {
    Versioned { version: u32, data: T },
    Legacy(T),
}

/// Serializes `value` inside a versioned envelope and writes it.
///
/// # Errors
///
/// Returns [`StorageError`] if serialization or the write fails.
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let body = serde_json::to_string(&EnvelopeRef {
        version: SCHEMA_VERSION,
        data: value,
    })?;
    store.set(key, &body).await
}

/// Reads and deserializes the record under `key`.
///
/// Accepts both enveloped records and bare legacy payloads.
///
/// # Errors
///
/// Returns [`StorageError`] if the read fails, the payload does not parse,
/// or the envelope carries a version newer than [`SCHEMA_VERSION`].
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(body) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<Stored<T>>(&body) {
        Ok(Stored::Versioned { version, data }) => {
            if version > SCHEMA_VERSION {
                return Err(StorageError::UnsupportedVersion {
                    key: key.to_string(),
                    version,
                });
            }
            Ok(Some(data))
        }
        Ok(Stored::Legacy(data)) => {
            log::debug!("Loaded legacy (unversioned) record: {key}");
            Ok(Some(data))
        }
        // Re-parse as the bare type to surface a meaningful error rather
        // than serde's generic untagged-enum message.
        Err(_) => Ok(Some(serde_json::from_str::<T>(&body)?)),
    }
}
