pub mod batch;
pub mod config;
pub mod decompress;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod readiness;
pub mod stats;
pub mod storage;
pub mod types;

pub use error::{IngestError, Result};
