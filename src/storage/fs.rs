use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{TempHandle, TemporaryStorage};
use crate::error::{IngestError, Result};

const MAX_NAME_LEN: usize = 64;

/// Stores payloads as files in an upload directory.
///
/// File names follow `<prefix>_<unix millis>_<sequence>_<origin name>` and
/// are opened with create-new semantics, so two invocations never share a file
/// even when they carry the same origin name in the same millisecond.
pub struct FsStorage {
    dir: PathBuf,
    prefix: String,
    sequence: AtomicU64,
}

impl FsStorage {
    /// Creates the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, handle: &TempHandle) -> PathBuf {
        self.dir.join(handle.key())
    }

    fn next_name(&self, origin_name: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_{}_{}",
            self.prefix,
            Utc::now().timestamp_millis(),
            seq,
            sanitize(origin_name)
        )
    }
}

impl TemporaryStorage for FsStorage {
    fn acquire(&self, origin_name: &str, bytes: &[u8]) -> Result<TempHandle> {
        loop {
            let name = self.next_name(origin_name);
            let path = self.dir.join(&name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                // another process picked the same name; take the next sequence number
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(IngestError::Storage(e)),
            };

            let handle = TempHandle::new(name);
            if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
                let _ = fs::remove_file(&path);
                return Err(IngestError::Storage(e));
            }
            return Ok(handle);
        }
    }

    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>> {
        fs::read(self.path_of(handle)).map_err(IngestError::Storage)
    }

    fn release(&self, handle: &TempHandle) -> Result<()> {
        match fs::remove_file(self.path_of(handle)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IngestError::Storage(e)),
        }
    }

    fn exists(&self, handle: &TempHandle) -> bool {
        self.path_of(handle).exists()
    }
}

/// Keeps the origin name recognisable while making it safe as a single path component.
fn sanitize(origin_name: &str) -> String {
    let cleaned: String = origin_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "payload".to_string()
    } else {
        cleaned
    }
}
