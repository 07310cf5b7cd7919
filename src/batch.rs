//! Per-item isolated processing of message attachments.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{FailureReason, IngestError, Result, ValidationError};
use crate::pipeline::SessionPipeline;
use crate::storage::{StorageScope, TemporaryStorage};
use crate::types::{AttachmentResult, Outcome, RawBlob, SessionSummary};

/// Stores one payload, runs the pipeline over the stored copy, and releases it.
///
/// The copy is released when the scope drops, whether the pipeline succeeds,
/// fails, or panics.
pub fn process_blob(
    pipeline: &SessionPipeline,
    storage: &dyn TemporaryStorage,
    blob: &RawBlob,
) -> Result<SessionSummary> {
    let scope = StorageScope::acquire(storage, &blob.origin_name, &blob.bytes)?;
    let bytes = scope.read()?;
    pipeline.run(&bytes)
}

/// Runs [`process_blob`] on the blocking pool, turning a panic into [`IngestError::Fault`].
pub async fn run_isolated(
    pipeline: SessionPipeline,
    storage: Arc<dyn TemporaryStorage>,
    blob: RawBlob,
) -> Result<SessionSummary> {
    let span = Span::current();
    let task = tokio::task::spawn_blocking(move || {
        span.in_scope(|| process_blob(&pipeline, storage.as_ref(), &blob))
    });

    match task.await {
        Ok(result) => result,
        Err(e) => Err(IngestError::Fault(e.to_string())),
    }
}

enum Slot {
    Rejected(IngestError),
    Running(JoinHandle<Result<SessionSummary>>),
}

/// Runs the pipeline over every accepted attachment of one message.
///
/// Names without an accepted suffix are dropped from the output. Every other
/// item yields exactly one [`AttachmentResult`], in input order, and a failure
/// in one item never touches another.
pub struct AttachmentBatchProcessor {
    pipeline: SessionPipeline,
    storage: Arc<dyn TemporaryStorage>,
    config: IngestConfig,
    semaphore: Arc<Semaphore>,
}

impl AttachmentBatchProcessor {
    pub fn new(
        pipeline: SessionPipeline,
        storage: Arc<dyn TemporaryStorage>,
        config: IngestConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.batch_concurrency.max(1)));
        Self {
            pipeline,
            storage,
            config,
            semaphore,
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.config.accepts_name(name)
    }

    #[tracing::instrument(skip_all, fields(attachments = blobs.len()))]
    pub async fn process(&self, blobs: Vec<RawBlob>) -> Vec<AttachmentResult> {
        let mut slots = Vec::new();

        for blob in blobs {
            if !self.accepts(&blob.origin_name) {
                debug!(filename = %blob.origin_name, "Skipping non-gzip attachment");
                continue;
            }

            let name = blob.origin_name.clone();
            let size = blob.size_bytes();
            if size > self.config.max_upload_bytes {
                let err = ValidationError::Oversize {
                    size,
                    limit: self.config.max_upload_bytes,
                };
                slots.push((name, Slot::Rejected(err.into())));
                continue;
            }

            let sem = self.semaphore.clone();
            let storage = self.storage.clone();
            let pipeline = self.pipeline;
            let span = tracing::info_span!(
                "process_attachment",
                filename = %name,
                source = blob.source.as_str(),
                bytes = size,
            );

            let task = tokio::spawn(
                async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|e| IngestError::Fault(e.to_string()))?;
                    run_isolated(pipeline, storage, blob).await
                }
                .instrument(span),
            );
            slots.push((name, Slot::Running(task)));
        }

        let mut results = Vec::with_capacity(slots.len());
        for (origin_name, slot) in slots {
            let result = match slot {
                Slot::Rejected(e) => Err(e),
                Slot::Running(task) => match task.await {
                    Ok(r) => r,
                    Err(e) => Err(IngestError::Fault(e.to_string())),
                },
            };

            let outcome = match result {
                Ok(summary) => {
                    info!(
                        filename = %origin_name,
                        average = summary.average_value,
                        readiness = %summary.readiness,
                        "Attachment processed"
                    );
                    Outcome::Summary(summary)
                }
                Err(e) => {
                    warn!(
                        filename = %origin_name,
                        stage = e.stage().as_str(),
                        reason = e.reason(),
                        error = %e,
                        "Attachment failed"
                    );
                    Outcome::Failed(FailureReason::from(&e))
                }
            };
            results.push(AttachmentResult {
                origin_name,
                outcome,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, TempHandle};
    use crate::types::ReadinessClass;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn processor(
        storage: Arc<dyn TemporaryStorage>,
        config: IngestConfig,
    ) -> AttachmentBatchProcessor {
        AttachmentBatchProcessor::new(SessionPipeline::default(), storage, config)
    }

    /// Panics when reading back a payload named `boom.gz`.
    struct PanickingStorage(MemoryStorage);

    impl TemporaryStorage for PanickingStorage {
        fn acquire(&self, origin_name: &str, bytes: &[u8]) -> Result<TempHandle> {
            self.0.acquire(origin_name, bytes)
        }
        fn read(&self, handle: &TempHandle) -> Result<Vec<u8>> {
            if handle.key().ends_with("boom.gz") {
                panic!("storage exploded");
            }
            self.0.read(handle)
        }
        fn release(&self, handle: &TempHandle) -> Result<()> {
            self.0.release(handle)
        }
        fn exists(&self, handle: &TempHandle) -> bool {
            self.0.exists(handle)
        }
    }

    #[test]
    fn test_process_blob_releases_storage() {
        let storage = MemoryStorage::new();
        let blob = RawBlob::attachment("a.gz", gzip(b"t0,60\n"));
        let summary = process_blob(&SessionPipeline::default(), &storage, &blob).unwrap();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(storage.held(), 0);

        let bad = RawBlob::attachment("b.gz", b"junk".to_vec());
        assert!(process_blob(&SessionPipeline::default(), &storage, &bad).is_err());
        assert_eq!(storage.held(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_middle_item_is_isolated() {
        let storage = Arc::new(MemoryStorage::new());
        let p = processor(storage.clone(), IngestConfig::default());

        let results = p
            .process(vec![
                RawBlob::attachment("one.gz", gzip(b"t0,60\nt1,40\nt2,30\n")),
                RawBlob::attachment("two.gz", b"\x1f\x8bcorrupt".to_vec()),
                RawBlob::attachment("three.gzip", gzip(b"t0,55\nt1,65\n")),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].origin_name, "one.gz");
        let first = results[0].outcome.summary().unwrap();
        assert_eq!(first.average_value, 43.33);
        assert_eq!(first.readiness, ReadinessClass::Yellow);

        let failure = results[1].outcome.failure().unwrap();
        assert_eq!(failure.reason, "decompress.corrupt_stream");

        let third = results[2].outcome.summary().unwrap();
        assert_eq!(third.average_value, 60.0);
        assert_eq!(third.readiness, ReadinessClass::Green);
        assert_eq!(storage.held(), 0);
    }

    #[tokio::test]
    async fn test_non_gzip_names_are_omitted() {
        let p = processor(Arc::new(MemoryStorage::new()), IngestConfig::default());
        let results = p
            .process(vec![
                RawBlob::attachment("notes.txt", b"hello".to_vec()),
                RawBlob::attachment("s.gz", gzip(b"t0,20\n")),
                RawBlob::attachment("photo.png", b"png".to_vec()),
            ])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].origin_name, "s.gz");
        assert_eq!(
            results[0].outcome.summary().unwrap().readiness,
            ReadinessClass::Red
        );
    }

    #[tokio::test]
    async fn test_oversize_item_fails_without_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let config = IngestConfig {
            max_upload_bytes: 16,
            ..IngestConfig::default()
        };
        let p = processor(storage.clone(), config);
        let big = gzip(&b"t0,60\n".repeat(200));
        assert!(big.len() > 16);

        let results = p
            .process(vec![
                RawBlob::attachment("big.gz", big),
                RawBlob::attachment("small.gz", b"x".to_vec()),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome.failure().unwrap().reason, "validation.oversize");
        assert_eq!(
            results[1].outcome.failure().unwrap().reason,
            "decompress.corrupt_stream"
        );
    }

    #[tokio::test]
    async fn test_panic_in_one_item_is_reported_as_fault() {
        let inner = Arc::new(PanickingStorage(MemoryStorage::new()));
        let p = processor(inner.clone(), IngestConfig::default());

        let results = p
            .process(vec![
                RawBlob::attachment("ok.gz", gzip(b"t0,40\n")),
                RawBlob::attachment("boom.gz", gzip(b"t0,40\n")),
                RawBlob::attachment("also_ok.gz", gzip(b"t0,45\n")),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.summary().is_some());
        assert_eq!(results[1].outcome.failure().unwrap().reason, "pipeline.fault");
        assert!(results[2].outcome.summary().is_some());
        assert_eq!(inner.0.held(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let p = processor(Arc::new(MemoryStorage::new()), IngestConfig::default());
        assert!(p.process(Vec::new()).await.is_empty());
    }
}
