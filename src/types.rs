//! Data types shared across the ingest pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// How a payload reached the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DirectUpload,
    MessageAttachment,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DirectUpload => "direct_upload",
            SourceKind::MessageAttachment => "message_attachment",
        }
    }
}

/// Compressed session bytes plus the metadata they arrived with.
#[derive(Debug, Clone)]
pub struct RawBlob {
    pub source: SourceKind,
    pub origin_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl RawBlob {
    pub fn direct(
        origin_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            source: SourceKind::DirectUpload,
            origin_name: origin_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn attachment(origin_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            source: SourceKind::MessageAttachment,
            origin_name: origin_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// One reading taken from one row, with its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedSample {
    pub line: u64,
    pub value: f64,
}

/// Coarse recovery indicator derived from a session's average HRV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessClass {
    Green,
    Yellow,
    Red,
}

impl ReadinessClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessClass::Green => "green",
            ReadinessClass::Yellow => "yellow",
            ReadinessClass::Red => "red",
        }
    }
}

impl std::fmt::Display for ReadinessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reduced result of one session file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub sample_count: usize,
    pub average_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub readiness: ReadinessClass,
}

/// The outcome of one accepted item in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Summary(SessionSummary),
    Failed(FailureReason),
}

impl Outcome {
    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            Outcome::Summary(s) => Some(s),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Summary(_) => None,
            Outcome::Failed(f) => Some(f),
        }
    }
}

/// One result per accepted attachment, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentResult {
    pub origin_name: String,
    pub outcome: Outcome,
}

/// An athlete account as returned by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: String,
    pub name: String,
    pub email: String,
}

/// The value handed to the record store for each successful session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub account_id: String,
    pub email: String,
    pub hrv_value: f64,
    pub readiness: ReadinessClass,
    pub sample_count: usize,
    pub min_hrv: f64,
    pub max_hrv: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(identity: &Identity, summary: &SessionSummary, recorded_at: DateTime<Utc>) -> Self {
        Self {
            account_id: identity.account_id.clone(),
            email: identity.email.clone(),
            hrv_value: summary.average_value,
            readiness: summary.readiness,
            sample_count: summary.sample_count,
            min_hrv: summary.min_value,
            max_hrv: summary.max_value,
            recorded_at,
        }
    }
}
