//! Tolerant row parser for decompressed HRV session files.

use csv::{ReaderBuilder, Terminator};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::types::ParsedSample;

/// Column holding the HRV reading.
const VALUE_COLUMN: usize = 1;

/// Extracts one [`ParsedSample`] per valid row, in file order.
///
/// Rows are split on `\n` and comma with no quote handling; a bare `\r` does
/// not end a row. A row is valid when it has at least two fields and the
/// second one parses as a finite number; anything else is dropped without
/// error.
///
/// # Errors
///
/// Returns [`IngestError::EmptyDataset`] if no row is valid.
pub fn parse_samples(text: &[u8]) -> Result<Vec<ParsedSample>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(text);

    let mut samples = Vec::new();
    let mut discarded = 0usize;

    for result in rdr.byte_records() {
        let Ok(record) = result else {
            discarded += 1;
            continue;
        };

        match record.get(VALUE_COLUMN).and_then(parse_value) {
            Some(value) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                samples.push(ParsedSample { line, value });
            }
            None => discarded += 1,
        }
    }

    debug!(valid = samples.len(), discarded, "Rows parsed");

    if samples.is_empty() {
        return Err(IngestError::EmptyDataset);
    }
    Ok(samples)
}

fn parse_value(field: &[u8]) -> Option<f64> {
    let value: f64 = std::str::from_utf8(field).ok()?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(samples: &[ParsedSample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_parse_simple_rows() {
        let samples = parse_samples(b"t0,60\nt1,40\nt2,30\n").unwrap();
        assert_eq!(values(&samples), vec![60.0, 40.0, 30.0]);
    }

    #[test]
    fn test_parse_records_line_numbers() {
        let samples = parse_samples(b"timestamp,hrv\nt0,60\nbad\nt2,30\n").unwrap();
        let lines: Vec<u64> = samples.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn test_parse_skips_header_and_malformed_rows() {
        let text = b"timestamp,hrv\nt0,abc\nonly_one_field\nt1,42.5\n,\nt2,NaN\nt3,inf\n";
        let samples = parse_samples(text).unwrap();
        assert_eq!(values(&samples), vec![42.5]);
    }

    #[test]
    fn test_parse_extra_columns_and_whitespace() {
        let samples = parse_samples(b"t0, 55.5 ,extra,cols\r\nt1,-3\r\n").unwrap();
        assert_eq!(values(&samples), vec![55.5, -3.0]);
    }

    #[test]
    fn test_parse_lone_carriage_return_does_not_split_rows() {
        let err = parse_samples(b"t0,60\rt1,40\n").unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset));

        let samples = parse_samples(b"t0,60\rt1,40\nt2,30\r\n").unwrap();
        assert_eq!(values(&samples), vec![30.0]);
        assert_eq!(samples[0].line, 2);
    }

    #[test]
    fn test_parse_quotes_are_not_special() {
        let samples = parse_samples(b"\"t0,60\"\nt1,\"40\"\nt2,30\n").unwrap();
        assert_eq!(values(&samples), vec![30.0]);
    }

    #[test]
    fn test_parse_invalid_utf8_field_is_discarded() {
        let samples = parse_samples(b"t0,\xFF\xFE\nt1,45\n").unwrap();
        assert_eq!(values(&samples), vec![45.0]);
    }

    #[test]
    fn test_parse_all_malformed_is_empty_dataset() {
        let err = parse_samples(b"a\nb,c\nd,e,f\n").unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset));
    }

    #[test]
    fn test_parse_empty_text_is_empty_dataset() {
        let err = parse_samples(b"").unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset));
    }
}
