//! Hex token decoding for captured-traffic dumps

use super::CodecError;
use regex::Regex;
use std::sync::LazyLock;

/// Pattern for a run of at least four two-digit hex tokens separated by a
/// space (one or two, as in grouped dumps) or a colon
pub const HEX_RUN: &str = r"\b[0-9A-Fa-f]{2}(?:(?: {1,2}|:)[0-9A-Fa-f]{2}){3,}\b";

static HEX_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(HEX_RUN).expect("static hex run pattern"));

/// Leading wall-clock stamps such as `17:19:38`, `[17:19:38.123]` or `2024-01-02 17:19:38`
static LEADING_STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[?(?:\d{4}-\d{2}-\d{2}[ T])?\d{1,2}:\d{2}:\d{2}(?:[.,]\d+)?\]?")
        .expect("static timestamp pattern")
});

/// Direction tags such as `TX:`, `[RX]`, `<<` or `->`
static DIRECTION_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\[?(?i:TX|RX|IN|OUT)\]?:?|<<|>>|<-|->)\s")
        .expect("static direction tag pattern")
});

static PREVIEW_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {4,}").expect("static preview gap pattern"));

/// True when the line contains a hex-dump byte run
pub fn has_hex_run(line: &str) -> bool {
    HEX_RUN_RE.is_match(strip_stamp(line))
}

fn strip_stamp(line: &str) -> &str {
    let line = match LEADING_STAMP_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    match DIRECTION_TAG_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Cut the ASCII preview column off a dump line
fn hex_section(line: &str) -> &str {
    let line = strip_stamp(line);
    let line = match line.find('|') {
        Some(idx) => &line[..idx],
        None => line,
    };
    // The first gap of 4+ spaces after some hex content starts the preview
    let trimmed_start = line.len() - line.trim_start().len();
    match PREVIEW_GAP_RE.find_at(line, trimmed_start) {
        Some(m) => &line[..m.start()],
        None => line,
    }
}

/// Decode the bytes of one hex-dump line
///
/// Returns `None` when the line carries no hex run (headers, blank lines).
pub fn decode_dump_line(line: &str) -> Option<Vec<u8>> {
    let section = hex_section(line);
    let mut output = Vec::new();

    for run in HEX_RUN_RE.find_iter(section) {
        for token in run.as_str().split([' ', ':']).filter(|t| !t.is_empty()) {
            // Tokens are exactly two hex digits by construction
            output.push(u8::from_str_radix(token, 16).ok()?);
        }
    }

    if output.is_empty() {
        None
    } else {
        Some(output)
    }
}

/// Shortest line width accepted for hex text that has no `A-F` digit
const MIN_DECIMAL_ONLY_WIDTH: usize = 16;

/// True when the text is an even-length run of hex digits laid out as one
/// line or wrapped at a fixed width
///
/// Spaces inside a line are ignored. Short lines of decimal digits only are
/// plain-text readings, not hex.
pub fn is_contiguous_hex(text: &str) -> bool {
    let mut widths = Vec::new();
    let mut has_letter = false;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut digits = 0usize;
        for c in line.chars().filter(|c| !c.is_whitespace()) {
            if !c.is_ascii_hexdigit() {
                return false;
            }
            has_letter |= c.is_ascii_alphabetic();
            digits += 1;
        }
        widths.push(digits);
    }

    let Some((&last, wrapped)) = widths.split_last() else {
        return false;
    };
    let width = wrapped.first().copied().unwrap_or(last);
    let total: usize = widths.iter().sum();
    let fixed_wrap = wrapped.iter().all(|&w| w == width) && last <= width;

    total >= 2
        && total % 2 == 0
        && fixed_wrap
        && (has_letter || width >= MIN_DECIMAL_ONLY_WIDTH)
}

/// Decode contiguous hex digits, ignoring whitespace and line breaks
pub fn decode_contiguous(text: &str) -> Result<Vec<u8>, CodecError> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return Err(CodecError::InvalidFormat(
            "Hex string must have even number of digits".to_string(),
        ));
    }
    Ok(::hex::decode(cleaned)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_line_with_preview() {
        let line = "46 20 31 32 2E 33 0D 0A     F 12.3..";
        assert_eq!(decode_dump_line(line).unwrap(), b"F 12.3\r\n");
    }

    #[test]
    fn test_dump_line_with_pipe_preview_and_offset() {
        let line = "00000000  48 65 6c 6c 6f 0d 0a  |Hello..|";
        assert_eq!(decode_dump_line(line).unwrap(), b"Hello\r\n");
    }

    #[test]
    fn test_dump_line_colon_separated() {
        assert_eq!(decode_dump_line("02:41:42:43:03").unwrap(), vec![0x02, 0x41, 0x42, 0x43, 0x03]);
    }

    #[test]
    fn test_timestamp_is_not_hex() {
        assert!(!has_hex_run("17:19:38 Weight 12.3 kg"));
        let line = "17:19:38 02 46 20 30 03";
        assert_eq!(decode_dump_line(line).unwrap(), vec![0x02, 0x46, 0x20, 0x30, 0x03]);
    }

    #[test]
    fn test_direction_tags_stripped() {
        let line = "[17:19:38.120] RX: 02 46 20 30 03";
        assert_eq!(decode_dump_line(line).unwrap(), vec![0x02, 0x46, 0x20, 0x30, 0x03]);
        assert_eq!(decode_dump_line("<< 41 42 43 0D 0A").unwrap(), b"ABC\r\n");
    }

    #[test]
    fn test_short_run_rejected() {
        assert!(decode_dump_line("AB CD EF").is_none());
        assert!(decode_dump_line("Capture started").is_none());
    }

    #[test]
    fn test_contiguous() {
        assert!(is_contiguous_hex("48656C6C6F0D0A\n48690D0A"));
        assert!(!is_contiguous_hex("48656"));
        assert!(!is_contiguous_hex("hello"));
        assert!(is_contiguous_hex("0246203132303334\n0D0A"));
        assert_eq!(decode_contiguous("4869\n0D0A").unwrap(), b"Hi\r\n");
    }

    #[test]
    fn test_decimal_readings_are_not_hex() {
        assert!(!is_contiguous_hex("0012\r\n0034\r\n0056\r\n"));
        assert!(!is_contiguous_hex("1234"));
        assert!(!is_contiguous_hex("48656C\n48\n48656C"));
    }
}
