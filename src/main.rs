//! CLI entry point for the HRV session ingester.
//!
//! Provides subcommands for scoring a directly uploaded session file and for
//! scoring the gzip attachments of an inbound message.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hrv_ingest::config::IngestConfig;
use hrv_ingest::identity::RosterResolver;
use hrv_ingest::ingest::{DirectSubmission, ErrorResponse, Ingestor, MessageSubmission};
use hrv_ingest::output::{CsvRecordStore, write_json};
use hrv_ingest::storage::{FsStorage, MemoryStorage, TemporaryStorage};
use hrv_ingest::types::RawBlob;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "hrv_ingest")]
#[command(about = "Score gzip-compressed HRV session files", long_about = None)]
struct Cli {
    /// JSON config file (falls back to HRV_INGEST_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON roster of athletes keyed by email
    #[arg(long, global = true, default_value = "roster.json")]
    roster: PathBuf,

    /// CSV file session records are appended to
    #[arg(long, global = true, default_value = "records.csv")]
    records: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one directly uploaded session file
    Upload {
        /// Path to the gzip-compressed CSV
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Email of the athlete the session belongs to
        #[arg(short, long)]
        email: String,

        /// Declared content type of the upload
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Score the attachments of an inbound message
    Attachments {
        /// Sender email of the message
        #[arg(short, long)]
        sender: String,

        /// Attachment files, in message order
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let storage: Arc<dyn TemporaryStorage> = match &config.upload_dir {
        Some(dir) => Arc::new(
            FsStorage::new(dir, config.temp_prefix.clone())
                .with_context(|| format!("failed to prepare upload dir {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStorage::new()),
    };
    let resolver = Arc::new(RosterResolver::load(&cli.roster)?);
    let store = Arc::new(CsvRecordStore::new(&cli.records));
    let ingestor = Ingestor::new(config, storage, resolver, store)?;

    let stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Upload {
            file,
            email,
            content_type,
        } => {
            let blob = RawBlob::direct(file_name(&file), content_type, read_file(&file)?);
            let req = DirectSubmission {
                identity_token: email,
                blob,
            };
            match ingestor.submit_direct(req).await {
                Ok(response) => write_json(stdout, &response)?,
                Err(e) => {
                    write_json(stdout, &ErrorResponse::from(&e))?;
                    return Err(e.into());
                }
            }
        }
        Commands::Attachments { sender, files } => {
            let mut attachments = Vec::with_capacity(files.len());
            for path in &files {
                attachments.push(RawBlob::attachment(file_name(path), read_file(path)?));
            }
            let req = MessageSubmission {
                sender,
                attachments,
            };
            match ingestor.submit_message(req).await {
                Ok(response) => write_json(stdout, &response)?,
                Err(e) => {
                    write_json(stdout, &ErrorResponse::from(&e))?;
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Colored stderr plus a JSON daily-rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/hrv_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("hrv_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("HRV_INGEST_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => {
            let config = IngestConfig::load(&path)?;
            info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        None => Ok(IngestConfig::default()),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
