//! Text encoding detection from BOM or byte patterns

use serde::{Deserialize, Serialize};

/// Byte-order marks, longest first so UTF-32 LE wins over UTF-16 LE
const BOMS: &[(&[u8], &str)] = &[
    (&[0xEF, 0xBB, 0xBF], "UTF-8"),
    (&[0xFF, 0xFE, 0x00, 0x00], "UTF-32LE"),
    (&[0x00, 0x00, 0xFE, 0xFF], "UTF-32BE"),
    (&[0xFF, 0xFE], "UTF-16LE"),
    (&[0xFE, 0xFF], "UTF-16BE"),
];

/// Share of odd or even bytes that must be zero to suggest UTF-16
const UTF16_ZERO_SHARE: f64 = 0.4;

/// Detected encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingInfo {
    /// Encoding name (`ASCII`, `UTF-8`, `UTF-16LE`, ...)
    pub name: String,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Buffer starts with a byte-order mark
    pub has_bom: bool,
}

impl EncodingInfo {
    fn new(name: &str, confidence: f64) -> Self {
        Self { name: name.to_string(), confidence, has_bom: false }
    }
}

/// Encoding detector
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingDetector;

impl EncodingDetector {
    /// Create detector
    pub fn new() -> Self {
        Self
    }

    /// Inspect a raw capture buffer
    pub fn detect(&self, data: &[u8]) -> EncodingInfo {
        let info = Self::classify(data);
        tracing::debug!(encoding = %info.name, confidence = info.confidence, bom = info.has_bom, "Encoding detected");
        info
    }

    fn classify(data: &[u8]) -> EncodingInfo {
        if data.is_empty() {
            return EncodingInfo::new("ASCII", 0.0);
        }

        if let Some((_, name)) = BOMS.iter().find(|(bom, _)| data.starts_with(bom)) {
            return EncodingInfo { has_bom: true, ..EncodingInfo::new(name, 1.0) };
        }

        if data.len() >= 4 {
            let zero_share = |parity: usize| {
                let slots = data.iter().skip(parity).step_by(2);
                let total = slots.clone().count();
                slots.filter(|&&b| b == 0).count() as f64 / total as f64
            };
            let (even, odd) = (zero_share(0), zero_share(1));
            if odd >= UTF16_ZERO_SHARE && even < 0.1 {
                return EncodingInfo::new("UTF-16LE", 0.8);
            }
            if even >= UTF16_ZERO_SHARE && odd < 0.1 {
                return EncodingInfo::new("UTF-16BE", 0.8);
            }
        }

        if data.is_ascii() {
            return EncodingInfo::new("ASCII", 0.9);
        }
        if std::str::from_utf8(data).is_ok() {
            return EncodingInfo::new("UTF-8", 0.9);
        }
        EncodingInfo::new("Windows-1252", 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(data: &[u8]) -> EncodingInfo {
        EncodingDetector::new().detect(data)
    }

    #[test]
    fn test_bom() {
        let info = detect(b"\xEF\xBB\xBFF 12.3\r\n");
        assert_eq!(info.name, "UTF-8");
        assert_eq!(info.confidence, 1.0);
        assert!(info.has_bom);
        assert_eq!(detect(b"\xFF\xFEA\x00").name, "UTF-16LE");
        assert_eq!(detect(b"\xFF\xFE\x00\x00A\x00\x00\x00").name, "UTF-32LE");
    }

    #[test]
    fn test_utf16_without_bom() {
        let le: Vec<u8> = "F 12.3\r\n".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let be: Vec<u8> = "F 12.3\r\n".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(detect(&le).name, "UTF-16LE");
        assert_eq!(detect(&be).name, "UTF-16BE");
    }

    #[test]
    fn test_ascii_utf8_fallback() {
        let ascii = detect(b"F 12.3\r\n");
        assert_eq!(ascii.name, "ASCII");
        assert!(!ascii.has_bom);
        assert_eq!(detect("T 21.5 °C\r\n".as_bytes()).name, "UTF-8");
        assert_eq!(detect(b"T 21.5 \xB0C\r\n").name, "Windows-1252");
    }

    #[test]
    fn test_empty() {
        let info = detect(b"");
        assert_eq!(info.confidence, 0.0);
    }
}
