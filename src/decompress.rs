//! Gzip decompression of uploaded session files.

use flate2::read::MultiGzDecoder;
use std::io::Read;

use crate::error::{IngestError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fully decompresses a gzip payload, including concatenated members.
///
/// # Errors
///
/// Returns [`IngestError::CorruptStream`] if the bytes are empty, do not start
/// with a gzip header, fail to inflate, fail the CRC check, or end early.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Err(IngestError::CorruptStream("empty payload".to_string()));
    }
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Err(IngestError::CorruptStream(
            "missing gzip header".to_string(),
        ));
    }

    let mut decoder = MultiGzDecoder::new(bytes);
    let mut out = Vec::with_capacity(bytes.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| IngestError::CorruptStream(e.to_string()))?;

    Ok(out)
}
