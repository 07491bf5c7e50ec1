//! Local key-value persistence.
//!
//! This module provides:
//! - `KeyValueStore`: the string-keyed, string-valued store the session
//!   persists into
//! - `MemoryStore`: in-process store for tests and throwaway sessions
//! - `FileStore`: a single JSON file in the data directory
//! - `KeyringStore`: OS-level secure storage via keyring

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

pub use error::StorageError;
pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A local string key-value store.
///
/// Removing a key that is not present is not an error.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}
