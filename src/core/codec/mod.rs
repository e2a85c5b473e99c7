//! Byte-level codecs shared by the loader, the detectors and the definition generator
//!
//! - Hex tokens (hex-dump lines, contiguous hex)
//! - Escaped text display (`\r\n`, `\x02`) and its inverse

mod hex;
mod text;

pub use self::hex::{decode_contiguous, decode_dump_line, has_hex_run, is_contiguous_hex, HEX_RUN};
pub use text::{escape, escape_str, unescape};

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Invalid input format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Hex decoding failed
    #[error("Invalid hex: {0}")]
    Hex(#[from] ::hex::FromHexError),
}

impl From<CodecError> for crate::core::error::AnalysisError {
    fn from(err: CodecError) -> Self {
        Self::FormatError(err.to_string())
    }
}

/// Format bytes as space-separated uppercase hex pairs (e.g. `0D 0A`)
pub fn hex_string(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        output.push_str(&format!("{:02X}", byte));
    }
    output
}

/// True for bytes that only make sense as protocol control characters
///
/// CR, LF and TAB are excluded since they routinely appear in text traffic.
pub fn is_control_byte(byte: u8) -> bool {
    (byte < 0x20 && !matches!(byte, b'\r' | b'\n' | b'\t')) || byte == 0x7f
}
