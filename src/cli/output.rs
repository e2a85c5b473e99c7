//! Result rendering for the command-line shell
//!
//! Text output is meant for people; JSON output is stable for scripting.

use std::fmt::Write as _;

use bytes::Bytes;
use clap::ValueEnum;

use crate::core::analysis::AnalysisResult;
use crate::core::codec;
use crate::core::detect::FieldInfo;
use crate::core::definition::ProtocolDefinition;
use crate::core::error::Result;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

/// Render an analysis summary
pub fn render_analysis(result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }

    let mut out = String::new();
    writeln!(out, "Messages:     {} (avg {:.1} bytes)", result.message_count, result.average_length)?;
    if result.terminator.detected {
        writeln!(
            out,
            "Terminator:   {} [{}] {} in {:.0}% of messages (confidence {:.0})",
            result.terminator.kind.name(),
            result.terminator.hex,
            result.terminator.display(),
            result.terminator.percentage,
            result.terminator.confidence
        )?;
    } else {
        writeln!(out, "Terminator:   none")?;
    }
    match result.best_delimiter() {
        Some(d) => writeln!(
            out,
            "Delimiter:    {} ({} fields, confidence {:.2})",
            d.label, d.field_count, d.confidence
        )?,
        None => writeln!(out, "Delimiter:    none")?,
    }
    writeln!(out, "Encoding:     {} ({:.2})", result.encoding, result.encoding_confidence)?;
    writeln!(
        out,
        "Protocol:     {} / {} (confidence {:.2})",
        result.protocol_type.name(),
        result.strategy.name(),
        result.confidence
    )?;

    let package = &result.package;
    if package.is_package_based {
        writeln!(
            out,
            "Package:      {} lines, {} packages, start {}, end {}",
            package.package_size,
            package.package_count,
            package.start_marker.as_deref().map_or_else(|| "-".to_string(), codec::escape_str),
            package.end_marker.as_deref().map_or_else(|| "-".to_string(), codec::escape_str)
        )?;
        for segment in &result.segments {
            writeln!(out, "  Line {}:", segment.index + 1)?;
            write_fields(&mut out, &segment.fields, "    ")?;
        }
    } else {
        if package.inconsistent {
            writeln!(out, "Package:      irregular stride near {} lines", package.package_size)?;
        }
        writeln!(out, "Fields:")?;
        write_fields(&mut out, &result.fields, "  ")?;
    }

    if !result.relationships.is_empty() {
        writeln!(out, "Relationships:")?;
        for relation in &result.relationships {
            writeln!(out, "  {:<20} {}", relation.kind.name(), relation.description)?;
        }
    }
    if !result.reasons.is_empty() {
        writeln!(out, "Reasons:")?;
        for reason in &result.reasons {
            writeln!(out, "  - {reason}")?;
        }
    }
    Ok(out)
}

fn write_fields(out: &mut String, fields: &[FieldInfo], indent: &str) -> std::fmt::Result {
    for field in fields {
        let mut line = format!(
            "{indent}[{}] {:<14} {:<10}",
            field.position,
            field.name,
            field.field_type.name()
        );
        if let Some(unit) = &field.unit {
            write!(line, " unit={unit}")?;
        }
        if let (Some(min), Some(max)) = (field.min, field.max) {
            write!(line, " range={min}..{max}")?;
        }
        if let Some(value) = field.constant_value() {
            write!(line, " constant={value:?}")?;
        } else if !field.unique_values.is_empty() && field.unique_values.len() <= 8 {
            write!(line, " values={:?}", field.unique_values)?;
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Render framed messages
pub fn render_frames(frames: &[Bytes], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let items: Vec<serde_json::Value> = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                serde_json::json!({
                    "index": index,
                    "length": frame.len(),
                    "hex": codec::hex_string(frame),
                    "text": codec::escape(frame),
                })
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&items)?);
    }

    let mut out = String::new();
    for (index, frame) in frames.iter().enumerate() {
        writeln!(out, "{:>5}  {:>4}  {}", index, frame.len(), codec::escape(frame))?;
    }
    Ok(out)
}

/// Render a saved definition
pub fn render_definition(definition: &ProtocolDefinition, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return definition.to_json();
    }

    let protocol = &definition.protocol;
    let mut out = String::new();
    writeln!(out, "{} (v{}, {})", definition.device.name, definition.version, definition.last_updated)?;
    writeln!(
        out,
        "Serial:     {} baud, {} data bits, parity {}, stop bits {}",
        definition.communication.baud_rate,
        definition.communication.data_bits,
        definition.communication.parity,
        definition.communication.stop_bits
    )?;
    writeln!(out, "Protocol:   {} ({})", protocol.protocol_type.name(), protocol.format)?;
    writeln!(out, "Terminator: {}", if protocol.terminator.is_empty() { "-" } else { &protocol.terminator })?;
    writeln!(out, "Strategy:   {}", definition.parsing.strategy.name())?;
    if let Some(size) = protocol.package_size {
        writeln!(out, "Package:    {size} lines")?;
    }
    for field in &protocol.fields {
        writeln!(out, "  [{}] {} {}", field.position, field.name, field.field_type.name())?;
    }
    for segment in &protocol.segments {
        writeln!(out, "  Line {}: {} fields", segment.index + 1, segment.fields.len())?;
    }
    Ok(out)
}
