//! End-to-end analysis of captures loaded from disk

use std::io::Write;

use protoscope_core::core::codec;
use protoscope_core::core::detect::{ParsingStrategy, ProtocolType};
use protoscope_core::core::splitter::DEFAULT_CANDIDATES;
use protoscope_core::{loader, AnalysisError, Analyzer, DefinitionGenerator, LogData, SourceFormat};
use tempfile::NamedTempFile;

fn scale_lines() -> Vec<String> {
    [0.0, 12.3, 45.6, 45.7, 45.8, 3.1]
        .iter()
        .map(|w| format!("F {w:>4.1}\r\n"))
        .collect()
}

fn package_lines(cycles: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for i in 0..cycles {
        lines.push(format!("STX {:02}\r\n", i));
        lines.push(format!("W {}.5 kg\r\n", 10 + i));
        lines.push(format!("T {}.1 C\r\n", 20 + i % 3));
        lines.push(format!("S {} ETX\r\n", i % 2));
    }
    lines
}

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn analyze_file(file: &NamedTempFile) -> (LogData, protoscope_core::AnalysisResult) {
    let log = loader::load_file(file.path())
        .unwrap()
        .into_log_data(DEFAULT_CANDIDATES);
    let result = Analyzer::default().analyze(&log);
    (log, result)
}

#[test]
fn test_plain_text_scale_capture() {
    let file = write_temp(&scale_lines().concat());
    let (log, result) = analyze_file(&file);

    assert_eq!(log.source_format(), SourceFormat::PlainText);
    assert_eq!(result.message_count, 6);
    assert_eq!(result.terminator.hex, "0D 0A");
    assert_eq!(result.delimiter, Some(' '));
    assert_eq!(result.fields.len(), 2);
    assert_eq!(result.fields[0].constant_value(), Some("F"));
    assert!(result.fields[1].field_type.is_numeric());
    assert_eq!(result.fields[1].min, Some(0.0));
    assert_eq!(result.fields[1].max, Some(45.8));
    assert_eq!(result.protocol_type, ProtocolType::SingleSegment);
    assert_eq!(result.strategy, ParsingStrategy::DelimiterBased);
    assert!(!result.package.is_package_based);
}

#[test]
fn test_hex_dump_matches_plain_text() {
    let dump: String = scale_lines()
        .iter()
        .map(|line| {
            let preview: String = line
                .bytes()
                .map(|b| if codec::is_control_byte(b) { '.' } else { b as char })
                .collect();
            format!("{}     {}\n", codec::hex_string(line.as_bytes()), preview)
        })
        .collect();

    let dump_file = write_temp(&dump);
    let text_file = write_temp(&scale_lines().concat());
    let (dump_log, from_dump) = analyze_file(&dump_file);
    let (_, from_text) = analyze_file(&text_file);

    assert_eq!(dump_log.source_format(), SourceFormat::HexDump);
    assert_eq!(dump_log.messages(), analyze_file(&text_file).0.messages());
    assert_eq!(from_dump, from_text);
}

#[test]
fn test_multi_line_package_capture() {
    let file = write_temp(&package_lines(6).concat());
    let (log, result) = analyze_file(&file);

    assert_eq!(result.message_count, 24);
    assert!(result.package.is_package_based);
    assert_eq!(result.package.package_size, 4);
    assert_eq!(result.package.start_marker.as_deref(), Some("STX"));
    assert_eq!(result.package.end_marker.as_deref(), Some("ETX"));
    assert_eq!(result.protocol_type, ProtocolType::MultiSegment);
    assert_eq!(result.strategy, ParsingStrategy::FixedFrame);
    assert_eq!(result.segments.len(), 4);
    assert_eq!(result.segments[1].fields[1].unit.as_deref(), Some("kg"));

    let definition = DefinitionGenerator::default().generate(&result, &log).unwrap();
    assert_eq!(definition.protocol.package_size, Some(4));
    assert_eq!(definition.protocol.start_marker.as_deref(), Some("STX"));
    assert!(definition.protocol.fields.is_empty());
    assert_eq!(definition.protocol.segments.len(), 4);
}

#[test]
fn test_control_framed_capture() {
    let raw: Vec<u8> = (0..5u8)
        .flat_map(|i| {
            let mut frame = vec![0x02];
            frame.extend_from_slice(format!("W,{}.5", 10 + i).as_bytes());
            frame.push(0x03);
            frame
        })
        .collect();

    let log = loader::load_bytes(&raw).unwrap().into_log_data(DEFAULT_CANDIDATES);
    assert_eq!(log.message_count(), 5);
    let result = Analyzer::default().analyze(&log);
    assert_eq!(result.terminator.hex, "03");
    assert_eq!(result.protocol_type, ProtocolType::BinaryControl);
    assert_eq!(result.strategy, ParsingStrategy::StateMachine);
}

#[test]
fn test_missing_capture() {
    let dir = tempfile::tempdir().unwrap();
    let err = loader::load_file(dir.path().join("absent.log")).unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound(_)));
}

#[test]
fn test_empty_capture_file() {
    let file = write_temp("");
    let err = loader::load_file(file.path()).unwrap_err();
    assert!(matches!(err, AnalysisError::FormatError(_)));
}
