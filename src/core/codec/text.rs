//! Escaped text display for terminators, markers and sample frames

use super::CodecError;

/// Render bytes with escape sequences (e.g. `\r\n` instead of actual newlines)
pub fn escape(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 2);

    for &byte in data {
        match byte {
            b'\r' => output.push_str("\\r"),
            b'\n' => output.push_str("\\n"),
            b'\t' => output.push_str("\\t"),
            b'\0' => output.push_str("\\0"),
            b'\\' => output.push_str("\\\\"),
            0x1b => output.push_str("\\e"),
            b if b.is_ascii_graphic() || b == b' ' => output.push(b as char),
            b => output.push_str(&format!("\\x{:02x}", b)),
        }
    }

    output
}

/// Escape a string that may carry control characters
pub fn escape_str(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            output.push_str(&escape(&[c as u8]));
        } else {
            output.push(c);
        }
    }
    output
}

/// Parse an escaped display string back into bytes
pub fn unescape(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            output.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            Some('r') => output.push(b'\r'),
            Some('n') => output.push(b'\n'),
            Some('t') => output.push(b'\t'),
            Some('0') => output.push(0),
            Some('e') => output.push(0x1b),
            Some('\\') => output.push(b'\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if hex.len() != 2 {
                    return Err(CodecError::InvalidFormat(
                        "Incomplete hex sequence".to_string(),
                    ));
                }
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                    CodecError::InvalidFormat(format!("Invalid hex sequence: \\x{}", hex))
                })?;
                output.push(byte);
            }
            Some(other) => {
                output.push(b'\\');
                let mut buf = [0u8; 4];
                output.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => output.push(b'\\'),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_line_endings() {
        assert_eq!(escape(b"\r\n"), "\\r\\n");
        assert_eq!(escape(b"\n"), "\\n");
        assert_eq!(escape(b"\r"), "\\r");
    }

    #[test]
    fn test_escape_control() {
        assert_eq!(escape(&[0x02, b'A', 0x03]), "\\x02A\\x03");
        assert_eq!(escape_str("\u{2}STX"), "\\x02STX");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("\\r\\n").unwrap(), b"\r\n");
        assert_eq!(unescape("\\x03").unwrap(), vec![0x03]);
        assert_eq!(unescape("ETX").unwrap(), b"ETX");
        assert!(unescape("\\x0").is_err());
    }

    #[test]
    fn test_escape_unescape_inverse() {
        let raw = [0x02, b'F', b' ', b'1', b'\\', 0x03, b'\r', b'\n'];
        assert_eq!(unescape(&escape(&raw)).unwrap(), raw.to_vec());
    }
}
