//! Log loading
//!
//! Turns raw file content into a flat byte buffer. Three source shapes are
//! recognized and tried in a fixed order:
//! - Hex dump with optional ASCII preview (`02 46 20 31 ...   .F 1`)
//! - Contiguous hex digits (`02462031...`)
//! - Plain, already-decoded text (or raw binary)

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::codec;
use super::error::{AnalysisError, Result};
use super::log_data::LogData;

/// Lines inspected when classifying a source
const SAMPLE_LINES: usize = 50;

/// Raw source format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Hex byte pairs, optionally followed by an ASCII preview column
    HexDump,
    /// Contiguous hex digits
    PureHex,
    /// Already-decoded text or raw bytes
    #[default]
    PlainText,
}

impl SourceFormat {
    /// All formats, in detection priority order
    pub fn all() -> &'static [SourceFormat] {
        &[SourceFormat::HexDump, SourceFormat::PureHex, SourceFormat::PlainText]
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::HexDump => "Hex Dump",
            SourceFormat::PureHex => "Pure Hex",
            SourceFormat::PlainText => "Plain Text",
        }
    }

    /// Try to decode text of this format; `None` when the text does not have this shape
    fn decode(&self, text: &str) -> Option<Result<Vec<u8>>> {
        match self {
            SourceFormat::HexDump => looks_like_dump(text).then(|| decode_dump(text)),
            SourceFormat::PureHex => codec::is_contiguous_hex(text)
                .then(|| codec::decode_contiguous(text).map_err(AnalysisError::from)),
            SourceFormat::PlainText => Some(Ok(text.as_bytes().to_vec())),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat buffer produced by the loader
#[derive(Debug, Clone)]
pub struct LoadedLog {
    /// Decoded bytes
    pub bytes: Bytes,
    /// Detected source format
    pub format: SourceFormat,
}

impl LoadedLog {
    /// Frame the buffer into messages with the best of `candidates`
    pub fn into_log_data(self, candidates: &[&[u8]]) -> LogData {
        LogData::from_buffer(self.bytes, candidates).with_source_format(self.format)
    }
}

fn sample_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|l| !l.trim().is_empty()).take(SAMPLE_LINES)
}

/// Hex-dump shape: at least half of the sampled lines carry a run of 4+ hex tokens
///
/// Runs like `17:19:38` (three tokens) never qualify, so timestamped text is
/// not mistaken for hex.
fn looks_like_dump(text: &str) -> bool {
    let (mut total, mut matching) = (0usize, 0usize);
    for line in sample_lines(text) {
        total += 1;
        if codec::has_hex_run(line) {
            matching += 1;
        }
    }
    total > 0 && matching * 2 >= total
}

fn decode_dump(text: &str) -> Result<Vec<u8>> {
    let bytes: Vec<u8> = text
        .lines()
        .filter_map(codec::decode_dump_line)
        .flatten()
        .collect();
    if bytes.is_empty() {
        return Err(AnalysisError::format("hex dump contains no decodable bytes"));
    }
    Ok(bytes)
}

/// Classify text content
pub fn detect_format(text: &str) -> SourceFormat {
    if looks_like_dump(text) {
        SourceFormat::HexDump
    } else if codec::is_contiguous_hex(text) {
        SourceFormat::PureHex
    } else {
        SourceFormat::PlainText
    }
}

/// Load from text content
pub fn load_text(text: &str) -> Result<LoadedLog> {
    if text.is_empty() {
        return Err(AnalysisError::format("log source is empty"));
    }

    for format in SourceFormat::all() {
        if let Some(decoded) = format.decode(text) {
            let bytes = decoded?;
            tracing::debug!(format = %format, bytes = bytes.len(), "Loaded log source");
            return Ok(LoadedLog { bytes: Bytes::from(bytes), format: *format });
        }
    }

    Err(AnalysisError::format("content matches no known capture format"))
}

/// Load from raw bytes
///
/// Content that is not valid UTF-8 is taken as raw binary traffic.
pub fn load_bytes(raw: &[u8]) -> Result<LoadedLog> {
    if raw.is_empty() {
        return Err(AnalysisError::format("log source is empty"));
    }

    match std::str::from_utf8(raw) {
        Ok(text) => load_text(text),
        Err(_) => {
            tracing::debug!(bytes = raw.len(), "Loaded binary log source");
            Ok(LoadedLog {
                bytes: Bytes::copy_from_slice(raw),
                format: SourceFormat::PlainText,
            })
        }
    }
}

/// Load from a file path
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedLog> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AnalysisError::NotFound(path.to_path_buf()),
        _ => AnalysisError::Io(e),
    })?;
    load_bytes(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_dump() {
        let text = "02 46 20 20 30 2E 30 0D 0A     .F  0.0..\n02 46 20 31 32 2E 33 0D 0A     .F 12.3..\n";
        assert_eq!(detect_format(text), SourceFormat::HexDump);
    }

    #[test]
    fn test_detect_pure_hex() {
        assert_eq!(detect_format("46203132 2E330D0A\n"), SourceFormat::PureHex);
    }

    #[test]
    fn test_decimal_readings_stay_plain_text() {
        let loaded = load_text("0012\r\n0034\r\n0056\r\n").unwrap();
        assert_eq!(loaded.format, SourceFormat::PlainText);
        assert_eq!(&loaded.bytes[..], b"0012\r\n0034\r\n0056\r\n");
        let log = loaded.into_log_data(crate::core::splitter::DEFAULT_CANDIDATES);
        assert_eq!(log.message_count(), 3);
    }

    #[test]
    fn test_timestamps_are_plain_text() {
        let text = "17:19:38 W 12.5 kg\n17:19:39 W 12.6 kg\n";
        assert_eq!(detect_format(text), SourceFormat::PlainText);
    }

    #[test]
    fn test_load_dump_bytes() {
        let loaded = load_text("46 20 31 32 0D 0A  |F 12..|\n46 20 33 34 0D 0A  |F 34..|\n").unwrap();
        assert_eq!(loaded.format, SourceFormat::HexDump);
        assert_eq!(&loaded.bytes[..], b"F 12\r\nF 34\r\n");
    }

    #[test]
    fn test_load_plain_text() {
        let loaded = load_text("F 12.3\r\nF 45.6\r\n").unwrap();
        assert_eq!(loaded.format, SourceFormat::PlainText);
        let log = loaded.into_log_data(crate::core::splitter::DEFAULT_CANDIDATES);
        assert_eq!(log.message_count(), 2);
        assert_eq!(log.source_format(), SourceFormat::PlainText);
    }

    #[test]
    fn test_load_binary_bytes() {
        let raw = [0x02, 0xFF, 0x41, 0x03, 0x02, 0xFE, 0x42, 0x03];
        let loaded = load_bytes(&raw).unwrap();
        assert_eq!(loaded.format, SourceFormat::PlainText);
        assert_eq!(&loaded.bytes[..], &raw);
    }

    #[test]
    fn test_empty_is_format_error() {
        assert!(matches!(load_text(""), Err(AnalysisError::FormatError(_))));
        assert!(matches!(load_bytes(&[]), Err(AnalysisError::FormatError(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_file("/definitely/not/here.log").unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }
}
