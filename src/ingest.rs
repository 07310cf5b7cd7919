//! Submission entry points: direct upload and inbound message attachments.
//!
//! Both paths validate the request, resolve the athlete through the injected
//! [`IdentityResolver`], run the session pipeline, and save each summary
//! through the injected [`RecordStore`]. Request-level failures are returned
//! as `Err`; per-attachment failures are reported inside [`BatchResponse`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::batch::{AttachmentBatchProcessor, run_isolated};
use crate::config::IngestConfig;
use crate::error::{FailureReason, IngestError, Result, ValidationError};
use crate::identity::IdentityResolver;
use crate::output::RecordStore;
use crate::pipeline::SessionPipeline;
use crate::storage::TemporaryStorage;
use crate::types::{Identity, Outcome, RawBlob, SessionRecord, SessionSummary};

/// One file uploaded directly, with the email of the athlete it belongs to.
#[derive(Debug, Clone)]
pub struct DirectSubmission {
    pub identity_token: String,
    pub blob: RawBlob,
}

/// Sender plus the attachments already extracted from an inbound message.
#[derive(Debug, Clone)]
pub struct MessageSubmission {
    pub sender: String,
    pub attachments: Vec<RawBlob>,
}

/// A summary that has been saved, with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedSession {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectResponse {
    pub identity: Identity,
    pub record: RecordedSession,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemOutcome {
    Recorded { record: RecordedSession },
    Failed { error: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl BatchItem {
    pub fn record(&self) -> Option<&RecordedSession> {
        match &self.outcome {
            ItemOutcome::Recorded { record } => Some(record),
            ItemOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FailureReason> {
        match &self.outcome {
            ItemOutcome::Recorded { .. } => None,
            ItemOutcome::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub identity: Identity,
    pub results: Vec<BatchItem>,
}

/// Body returned in place of a response when a whole request fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: FailureReason,
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        Self {
            error: FailureReason::from(err),
        }
    }
}

/// Checks a direct upload before any storage or pipeline work.
pub fn validate_direct(config: &IngestConfig, req: &DirectSubmission) -> Result<()> {
    if req.identity_token.trim().is_empty() {
        return Err(ValidationError::MissingField("user_email").into());
    }

    let size = req.blob.size_bytes();
    if size > config.max_upload_bytes {
        return Err(ValidationError::Oversize {
            size,
            limit: config.max_upload_bytes,
        }
        .into());
    }

    let type_ok = req
        .blob
        .content_type
        .as_deref()
        .is_some_and(|t| config.accepts_content_type(t));
    if !type_ok && !config.accepts_name(&req.blob.origin_name) {
        return Err(ValidationError::UnsupportedType {
            name: req.blob.origin_name.clone(),
            content_type: req.blob.content_type.clone().unwrap_or_else(|| "none".to_string()),
        }
        .into());
    }

    Ok(())
}

pub struct Ingestor {
    config: IngestConfig,
    pipeline: SessionPipeline,
    storage: Arc<dyn TemporaryStorage>,
    resolver: Arc<dyn IdentityResolver>,
    store: Arc<dyn RecordStore>,
    batch: AttachmentBatchProcessor,
}

impl Ingestor {
    /// Fails if the config does not validate.
    pub fn new(
        config: IngestConfig,
        storage: Arc<dyn TemporaryStorage>,
        resolver: Arc<dyn IdentityResolver>,
        store: Arc<dyn RecordStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let pipeline = SessionPipeline::new(config.thresholds()?);
        let batch = AttachmentBatchProcessor::new(pipeline, storage.clone(), config.clone());
        Ok(Self {
            config,
            pipeline,
            storage,
            resolver,
            store,
            batch,
        })
    }

    #[tracing::instrument(
        skip_all,
        fields(
            filename = %req.blob.origin_name,
            source = req.blob.source.as_str(),
            bytes = req.blob.size_bytes(),
        )
    )]
    pub async fn submit_direct(&self, req: DirectSubmission) -> Result<DirectResponse> {
        validate_direct(&self.config, &req)?;
        let identity = self.resolve(&req.identity_token).await?;

        let summary = run_isolated(self.pipeline, self.storage.clone(), req.blob)
            .await
            .inspect_err(|e| {
                error!(
                    stage = e.stage().as_str(),
                    reason = e.reason(),
                    error = %e,
                    "Direct upload failed"
                )
            })?;
        let record = self.persist(&identity, summary).await?;

        info!(
            account_id = %identity.account_id,
            average = record.summary.average_value,
            readiness = %record.summary.readiness,
            "HRV data uploaded"
        );
        Ok(DirectResponse { identity, record })
    }

    #[tracing::instrument(skip_all, fields(attachments = req.attachments.len()))]
    pub async fn submit_message(&self, req: MessageSubmission) -> Result<BatchResponse> {
        if req.sender.trim().is_empty() {
            return Err(ValidationError::MissingField("sender").into());
        }
        let identity = self.resolve(&req.sender).await?;

        if req.attachments.is_empty() {
            return Err(ValidationError::NoAttachments.into());
        }

        let mut results = Vec::new();
        for item in self.batch.process(req.attachments).await {
            let outcome = match item.outcome {
                Outcome::Summary(summary) => match self.persist(&identity, summary).await {
                    Ok(record) => ItemOutcome::Recorded { record },
                    Err(e) => ItemOutcome::Failed {
                        error: FailureReason::from(&e),
                    },
                },
                Outcome::Failed(error) => ItemOutcome::Failed { error },
            };
            results.push(BatchItem {
                filename: item.origin_name,
                outcome,
            });
        }

        let failed = results.iter().filter(|r| r.error().is_some()).count();
        info!(
            account_id = %identity.account_id,
            processed = results.len(),
            failed,
            "Message processed"
        );
        Ok(BatchResponse { identity, results })
    }

    async fn resolve(&self, token: &str) -> Result<Identity> {
        match self.resolver.resolve(token).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                warn!(identity = token, "Athlete not found");
                Err(IngestError::IdentityNotFound(token.trim().to_string()))
            }
            Err(e) => Err(IngestError::IdentityLookup(format!("{e:#}"))),
        }
    }

    // no retry: a failed save is reported to the caller as-is
    async fn persist(
        &self,
        identity: &Identity,
        summary: SessionSummary,
    ) -> Result<RecordedSession> {
        let recorded_at = Utc::now();
        let record = SessionRecord::new(identity, &summary, recorded_at);
        self.store.save(&record).await.map_err(|e| {
            error!(error = %e, "Failed to save session record");
            IngestError::Persistence(format!("{e:#}"))
        })?;
        Ok(RecordedSession {
            summary,
            recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadinessClass;

    fn config() -> IngestConfig {
        IngestConfig {
            max_upload_bytes: 100,
            ..IngestConfig::default()
        }
    }

    fn direct(token: &str, name: &str, content_type: Option<&str>, len: usize) -> DirectSubmission {
        DirectSubmission {
            identity_token: token.to_string(),
            blob: RawBlob::direct(name, content_type.map(str::to_string), vec![0u8; len]),
        }
    }

    #[test]
    fn test_validate_accepts_gzip_content_type() {
        let req = direct("a@test.com", "upload.bin", Some("application/gzip"), 10);
        validate_direct(&config(), &req).unwrap();
    }

    #[test]
    fn test_validate_accepts_gzip_name_without_type() {
        let req = direct("a@test.com", "1711030771.gzip", None, 10);
        validate_direct(&config(), &req).unwrap();
    }

    #[test]
    fn test_validate_rejects_blank_identity() {
        let req = direct("  ", "s.gz", None, 10);
        let err = validate_direct(&config(), &req).unwrap_err();
        assert_eq!(err.reason(), "validation.missing_field");
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let req = direct("a@test.com", "s.gz", None, 101);
        let err = validate_direct(&config(), &req).unwrap_err();
        assert_eq!(err.reason(), "validation.oversize");
    }

    #[test]
    fn test_validate_accepts_exact_limit() {
        let req = direct("a@test.com", "s.gz", None, 100);
        validate_direct(&config(), &req).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let req = direct("a@test.com", "s.csv", Some("text/csv"), 10);
        let err = validate_direct(&config(), &req).unwrap_err();
        assert_eq!(err.reason(), "validation.unsupported_type");
        assert!(err.to_string().contains("text/csv"));
    }

    #[test]
    fn test_batch_item_json_shape() {
        let ok = BatchItem {
            filename: "a.gz".to_string(),
            outcome: ItemOutcome::Recorded {
                record: RecordedSession {
                    summary: SessionSummary {
                        sample_count: 1,
                        average_value: 40.0,
                        min_value: 40.0,
                        max_value: 40.0,
                        readiness: ReadinessClass::Yellow,
                    },
                    recorded_at: Utc::now(),
                },
            },
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["filename"], "a.gz");
        assert_eq!(json["record"]["average_value"], 40.0);
        assert_eq!(json["record"]["readiness"], "yellow");
        assert!(json.get("error").is_none());

        let failed = BatchItem {
            filename: "b.gz".to_string(),
            outcome: ItemOutcome::Failed {
                error: FailureReason::from(&IngestError::EmptyDataset),
            },
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"]["reason"], "parse.empty_dataset");
        assert!(json.get("record").is_none());
    }
}
