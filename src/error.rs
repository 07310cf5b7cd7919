//! Error taxonomy for the ingest pipeline.
//!
//! Every failure maps to a [`Stage`] and a stable, machine-readable reason
//! string so callers can report which step of ingestion failed.

use serde::Serialize;
use thiserror::Error;

/// The step of ingestion at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Resolve,
    Store,
    Decompress,
    Parse,
    Persist,
    Pipeline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Resolve => "resolve",
            Stage::Store => "store",
            Stage::Decompress => "decompress",
            Stage::Parse => "parse",
            Stage::Persist => "persist",
            Stage::Pipeline => "pipeline",
        }
    }
}

/// A request rejected at ingress, before any pipeline work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required request field was absent or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The payload is larger than the configured ceiling.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: usize, limit: usize },

    /// Neither the declared content type nor the file name is a recognised archive type.
    #[error("unsupported file type for {name} (content type: {content_type})")]
    UnsupportedType { name: String, content_type: String },

    /// An inbound message arrived without any attachments.
    #[error("no attachments found")]
    NoAttachments,
}

/// All errors produced while ingesting HRV sessions.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The identity token does not belong to a known athlete.
    #[error("athlete not found for identity {0}")]
    IdentityNotFound(String),

    /// The identity collaborator itself failed.
    #[error("identity lookup failed: {0}")]
    IdentityLookup(String),

    /// The temporary copy of a payload could not be written or read back.
    #[error("temporary storage failed: {0}")]
    Storage(#[source] std::io::Error),

    /// The payload is not valid gzip data or is truncated.
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(String),

    /// Decompressed text contained no parseable readings.
    #[error("no valid HRV values found in file")]
    EmptyDataset,

    /// The record store rejected a summary.
    #[error("failed to persist session record: {0}")]
    Persistence(String),

    /// An unexpected fault (panic) inside one item's pipeline.
    #[error("internal fault while processing item: {0}")]
    Fault(String),
}

impl IngestError {
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Validation(_) => Stage::Validate,
            IngestError::IdentityNotFound(_) | IngestError::IdentityLookup(_) => Stage::Resolve,
            IngestError::Storage(_) => Stage::Store,
            IngestError::CorruptStream(_) => Stage::Decompress,
            IngestError::EmptyDataset => Stage::Parse,
            IngestError::Persistence(_) => Stage::Persist,
            IngestError::Fault(_) => Stage::Pipeline,
        }
    }

    /// Stable reason string, safe to match on from outside the crate.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Validation(v) => match v {
                ValidationError::MissingField(_) => "validation.missing_field",
                ValidationError::Oversize { .. } => "validation.oversize",
                ValidationError::UnsupportedType { .. } => "validation.unsupported_type",
                ValidationError::NoAttachments => "validation.no_attachments",
            },
            IngestError::IdentityNotFound(_) => "identity.not_found",
            IngestError::IdentityLookup(_) => "identity.lookup_failed",
            IngestError::Storage(_) => "storage.failed",
            IngestError::CorruptStream(_) => "decompress.corrupt_stream",
            IngestError::EmptyDataset => "parse.empty_dataset",
            IngestError::Persistence(_) => "persist.failed",
            IngestError::Fault(_) => "pipeline.fault",
        }
    }
}

/// Serializable description of a failed item or request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReason {
    pub stage: Stage,
    pub reason: &'static str,
    pub message: String,
}

impl From<&IngestError> for FailureReason {
    fn from(err: &IngestError) -> Self {
        FailureReason {
            stage: err.stage(),
            reason: err.reason(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
