use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{TempHandle, TemporaryStorage};
use crate::error::{IngestError, Result};

/// Keeps payloads in process memory, keyed by a monotonically increasing id.
#[derive(Default)]
pub struct MemoryStorage {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads currently held.
    pub fn held(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries.lock().map_err(|_| {
            IngestError::Storage(std::io::Error::other("memory storage lock poisoned"))
        })
    }
}

impl TemporaryStorage for MemoryStorage {
    fn acquire(&self, origin_name: &str, bytes: &[u8]) -> Result<TempHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = format!("mem_{id}_{origin_name}");
        self.lock()?.insert(key.clone(), bytes.to_vec());
        Ok(TempHandle::new(key))
    }

    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>> {
        self.lock()?.get(handle.key()).cloned().ok_or_else(|| {
            IngestError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no payload stored under {}", handle.key()),
            ))
        })
    }

    fn release(&self, handle: &TempHandle) -> Result<()> {
        self.lock()?.remove(handle.key());
        Ok(())
    }

    fn exists(&self, handle: &TempHandle) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(handle.key()))
            .unwrap_or(false)
    }
}
