//! Storage backends for persisted session material.
//!
//! The token store composes three backends behind one interface: a durable
//! primary, a volatile fallback used when the primary misbehaves, and a
//! cookie mirror so request-time checks can see session presence without
//! running any client code.

pub mod cookie;
pub mod file;
pub mod memory;

pub use cookie::CookieMirror;
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::errors::StorageError;
use tokio::sync::broadcast;

/// Synchronous key-value storage.
///
/// Reads and writes are synchronous by design; the only suspension points
/// in the session lifecycle are network calls.
pub trait KeyValueStore: Send + Sync {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A change to a stored session key.
///
/// Events published by one token store and observed by another instance
/// sharing the same backing store model the browser's cross-tab storage
/// notifications: delivery is asynchronous and advisory, never
/// transactional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Fully qualified storage key that changed
    pub key: String,

    /// Value before the change
    pub old_value: Option<String>,

    /// Value after the change; `None` means the key was removed
    pub new_value: Option<String>,

    /// Instance id of the store that made the change
    pub origin: u64,
}

/// Broadcast channel carrying [`StorageEvent`]s between store instances.
pub type StorageBus = broadcast::Sender<StorageEvent>;

/// Create a storage event bus.
pub fn storage_bus() -> StorageBus {
    broadcast::channel(64).0
}
