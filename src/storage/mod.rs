//! Temporary holding area for payload bytes while a pipeline runs.
//!
//! [`TemporaryStorage`] is the backend trait. [`FsStorage`] keeps payloads in
//! an upload directory and [`MemoryStorage`] keeps them in a map.
//! [`StorageScope`] ties one stored payload to a lexical scope and releases it
//! on drop, so the copy is gone after success, error and panic alike.

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use tracing::{debug, warn};

use crate::error::Result;

/// Opaque reference to one stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempHandle {
    key: String,
}

impl TempHandle {
    pub(crate) fn new(key: String) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A backend able to hold payload bytes under a unique handle.
pub trait TemporaryStorage: Send + Sync {
    /// Stores `bytes` under a handle that no other call can receive.
    fn acquire(&self, origin_name: &str, bytes: &[u8]) -> Result<TempHandle>;

    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>>;

    /// Removes the payload. Releasing an absent handle is not an error.
    fn release(&self, handle: &TempHandle) -> Result<()>;

    fn exists(&self, handle: &TempHandle) -> bool;
}

/// Guard that owns one stored payload until it goes out of scope.
pub struct StorageScope<'a> {
    storage: &'a dyn TemporaryStorage,
    handle: TempHandle,
}

impl<'a> StorageScope<'a> {
    pub fn acquire(
        storage: &'a dyn TemporaryStorage,
        origin_name: &str,
        bytes: &[u8],
    ) -> Result<Self> {
        let handle = storage.acquire(origin_name, bytes)?;
        debug!(key = handle.key(), "Stored temporary payload");
        Ok(Self { storage, handle })
    }

    pub fn handle(&self) -> &TempHandle {
        &self.handle
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.storage.read(&self.handle)
    }
}

impl Drop for StorageScope<'_> {
    fn drop(&mut self) {
        match self.storage.release(&self.handle) {
            Ok(()) => debug!(key = self.handle.key(), "Released temporary payload"),
            Err(e) => warn!(
                key = self.handle.key(),
                error = %e,
                "Failed to release temporary payload"
            ),
        }
    }
}
