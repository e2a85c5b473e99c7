//! Binary-safe message splitting
//!
//! Splits operate on raw bytes only, so embedded control bytes (STX, ETX,
//! NUL, ...) survive untouched. Segments are zero-copy slices of the input
//! buffer.

use bytes::Bytes;

/// Carriage return + line feed
pub const CRLF: &[u8] = b"\r\n";
/// Line feed
pub const LF: &[u8] = b"\n";
/// Carriage return
pub const CR: &[u8] = b"\r";
/// End of text (0x03)
pub const ETX: &[u8] = &[0x03];

/// Default candidate terminators, in tie-break order
pub const DEFAULT_CANDIDATES: &[&[u8]] = &[CRLF, LF, CR, ETX];

/// Handling of the empty segment produced by a buffer that ends on a terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyEntries {
    /// Drop the trailing empty segment
    #[default]
    Skip,
    /// Emit the trailing empty segment
    Keep,
}

/// Start/end offsets of each terminator match, scanning left to right
fn match_positions(data: &[u8], terminator: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    if terminator.is_empty() || data.len() < terminator.len() {
        return positions;
    }

    let mut i = 0;
    while i + terminator.len() <= data.len() {
        if &data[i..i + terminator.len()] == terminator {
            positions.push(i);
            i += terminator.len();
        } else {
            i += 1;
        }
    }
    positions
}

/// Split a buffer on an exact terminator byte sequence
///
/// The terminator bytes are excluded from the segments. Empty segments
/// between two adjacent terminators are always kept; only the trailing empty
/// segment after a final terminator depends on `empty`.
pub fn split(data: &Bytes, terminator: &[u8], empty: EmptyEntries) -> Vec<Bytes> {
    if terminator.len() == 1 {
        return split_byte(data, terminator[0], empty);
    }

    let mut segments = Vec::new();
    let mut start = 0;
    for pos in match_positions(data, terminator) {
        segments.push(data.slice(start..pos));
        start = pos + terminator.len();
    }
    push_tail(data, start, empty, &mut segments);
    segments
}

/// Single-byte fast path of [`split`]
pub fn split_byte(data: &Bytes, delimiter: u8, empty: EmptyEntries) -> Vec<Bytes> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (pos, _) in data.iter().enumerate().filter(|&(_, &b)| b == delimiter) {
        segments.push(data.slice(start..pos));
        start = pos + 1;
    }
    push_tail(data, start, empty, &mut segments);
    segments
}

fn push_tail(data: &Bytes, start: usize, empty: EmptyEntries, segments: &mut Vec<Bytes>) {
    if start < data.len() || empty == EmptyEntries::Keep {
        segments.push(data.slice(start..));
    }
}

/// Split with every candidate and keep the one producing the most segments
///
/// Only terminated segments count; an unterminated remainder at the end of
/// the buffer is not evidence for a candidate. Ties go to the earliest
/// candidate. Returns the winning candidate index (`None` when no candidate
/// occurs at all) together with its segments.
pub fn split_best(
    data: &Bytes,
    candidates: &[&[u8]],
    empty: EmptyEntries,
) -> (Option<usize>, Vec<Bytes>) {
    match best_candidate(data, candidates) {
        Some(idx) => (Some(idx), split(data, candidates[idx], empty)),
        None if data.is_empty() && empty == EmptyEntries::Skip => (None, Vec::new()),
        None => (None, vec![data.clone()]),
    }
}

fn best_candidate(data: &[u8], candidates: &[&[u8]]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let count = match_positions(data, candidate).len();
        if count == 0 {
            continue;
        }
        if best.map_or(true, |(_, current)| count > current) {
            best = Some((idx, count));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Cut a buffer into frames that keep their terminator bytes attached
///
/// Uses the candidate that explains the most frames. A trailing remainder
/// without terminator becomes the last frame.
pub fn frames(data: &Bytes, candidates: &[&[u8]]) -> (Option<usize>, Vec<Bytes>) {
    let Some(idx) = best_candidate(data, candidates) else {
        return (None, if data.is_empty() { Vec::new() } else { vec![data.clone()] });
    };

    let terminator = candidates[idx];
    let mut output = Vec::new();
    let mut start = 0;
    for pos in match_positions(data, terminator) {
        let end = pos + terminator.len();
        output.push(data.slice(start..end));
        start = end;
    }
    if start < data.len() {
        output.push(data.slice(start..));
    }
    (Some(idx), output)
}

/// Join segments with a terminator; the inverse of [`split`] with a trailing terminator
pub fn join(segments: &[Bytes], terminator: &[u8]) -> Bytes {
    let total = segments.iter().map(|s| s.len() + terminator.len()).sum();
    let mut output = Vec::with_capacity(total);
    for segment in segments {
        output.extend_from_slice(segment);
        output.extend_from_slice(terminator);
    }
    Bytes::from(output)
}
