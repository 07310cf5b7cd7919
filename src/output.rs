//! Persistence of session records and response output.
//!
//! [`RecordStore`] is the async trait the ingest layer saves summaries
//! through. [`CsvRecordStore`] appends them to a CSV file and
//! [`MemoryRecordStore`] keeps them in memory.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::types::SessionRecord;

/// Saves one record per successfully summarized session.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<()>;
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &SessionRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// File-backed store; appends are serialized so headers are written once.
pub struct CsvRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordStore for CsvRecordStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        append_record(&self.path, record)
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Writes a response as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write>(mut out: W, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
