//! Session persistence for the Project Ledger client.
//!
//! This crate provides the storage surfaces a session touches:
//! - **Durable store**: JSON file key/value store that survives restarts
//! - **Volatile store**: in-memory key/value store scoped to the process
//! - **Cookie jar**: cookies captured from API responses
//! - **Local databases**: database files kept under the client directory
//!
//! [`StorageSync`] ties them together and is the only component that reads or
//! writes session keys.

mod cookies;
mod databases;
mod file;
mod keys;
mod memory;
mod sync;
mod traits;

pub use cookies::{ancestor_domains, Cookie, CookieJar};
pub use databases::LocalDatabases;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use sync::{
    CleanupReport, PersistedMonitoring, PersistedSession, PersistedState, StorageSync,
    SurfaceFailure,
};
pub use traits::KeyValueStore;

use ledger_config::Paths;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the file-backed storage surfaces under the client directory.
pub fn create_storage_sync(paths: &Paths) -> StorageResult<StorageSync> {
    paths
        .ensure_dirs()
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    let durable = FileStorage::open(paths.storage_file())?;
    let cookies = CookieJar::open(paths.cookies_file())?;

    Ok(StorageSync::new(Box::new(durable))
        .with_cookie_jar(Arc::new(cookies))
        .with_databases(LocalDatabases::new(paths.databases_dir())))
}
