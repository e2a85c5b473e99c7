//! Field analysis
//!
//! Tokens are grouped by position and each token is run through a fixed
//! list of parsers (decimal, integer, date/time, unit-suffixed number, text).
//! A position takes the type that covers nearly all of its tokens; anything
//! else is an enumeration when few values occur, free text otherwise.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tokenize;
use crate::config::FieldConfig;

/// Share of tokens the dominant kind must cover to type a field
const TYPE_DOMINANCE: f64 = 0.9;
/// Share of numeric rows under a non-numeric first row to call it a header
const HEADER_NUMERIC_SHARE: f64 = 0.8;

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?(?:\d+\.\d*|\.\d+)$").expect("static decimal pattern"));
static DECIMAL_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+,\d+$").expect("static decimal comma pattern"));
static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+$").expect("static integer pattern"));
static UNIT_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+]?\d*[.,]?\d+)([A-Za-z%°µΩ][A-Za-z0-9%°µΩ/²³]*)$").expect("static unit pattern")
});

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%y", "%d/%m/%y",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%d.%m.%Y %H:%M:%S"];

/// Units recognized as a separate token following a number
pub const UNIT_VOCABULARY: &[&str] = &[
    "g", "kg", "mg", "t", "lb", "lbs", "oz", "ct", "N", "kN", "%", "C", "°C", "°F", "K", "V", "mV",
    "kV", "A", "mA", "W", "kW", "Wh", "kWh", "Hz", "kHz", "Pa", "kPa", "MPa", "bar", "mbar", "psi",
    "mm", "cm", "m", "km", "s", "ms", "min", "h", "L", "l", "mL", "ml", "ppm", "pH", "rpm", "dB",
];

/// Quantity name suggested by a unit
pub fn unit_quantity(unit: &str) -> Option<&'static str> {
    let name = match unit {
        "g" | "kg" | "mg" | "t" | "lb" | "lbs" | "oz" | "ct" => "Weight",
        "N" | "kN" => "Force",
        "%" => "Percent",
        "C" | "°C" | "°F" | "K" => "Temperature",
        "V" | "mV" | "kV" => "Voltage",
        "A" | "mA" => "Current",
        "W" | "kW" => "Power",
        "Wh" | "kWh" => "Energy",
        "Hz" | "kHz" | "rpm" => "Frequency",
        "Pa" | "kPa" | "MPa" | "bar" | "mbar" | "psi" => "Pressure",
        "mm" | "cm" | "m" | "km" => "Length",
        "s" | "ms" | "min" | "h" => "Duration",
        "L" | "l" | "mL" | "ml" => "Volume",
        "ppm" => "Concentration",
        "pH" => "Acidity",
        "dB" => "Level",
        _ => return None,
    };
    Some(name)
}

/// Inferred field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Whole number
    Integer,
    /// Fixed-point number
    Decimal,
    /// Number with an attached unit suffix (`12.5kg`)
    UnitValue,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time in one token
    DateTime,
    /// Small closed set of values (including a single constant)
    Enum,
    /// Free text
    String,
    /// Position never carried a value
    Empty,
}

impl FieldType {
    /// Type tag
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::Decimal => "Decimal",
            FieldType::UnitValue => "UnitValue",
            FieldType::Date => "Date",
            FieldType::Time => "Time",
            FieldType::DateTime => "DateTime",
            FieldType::Enum => "Enum",
            FieldType::String => "String",
            FieldType::Empty => "Empty",
        }
    }

    /// Numeric types carry a value range
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal | FieldType::UnitValue)
    }
}

/// Result of running one token through the parsers
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Fixed-point number
    Decimal {
        /// Parsed value
        value: f64,
        /// Digits after the decimal separator
        decimals: u32,
    },
    /// Whole number
    Integer(i64),
    /// Date and time
    DateTime(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Number with attached unit
    UnitValue {
        /// Parsed value
        value: f64,
        /// Digits after the decimal separator
        decimals: u32,
        /// Unit suffix
        unit: String,
    },
    /// Anything else
    Text,
}

impl TokenValue {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TokenValue::Decimal { value, .. } | TokenValue::UnitValue { value, .. } => Some(*value),
            TokenValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn decimals(&self) -> u32 {
        match self {
            TokenValue::Decimal { decimals, .. } | TokenValue::UnitValue { decimals, .. } => *decimals,
            _ => 0,
        }
    }
}

fn parse_decimal(token: &str, decimal_comma: bool) -> Option<TokenValue> {
    let normalized = if DECIMAL_RE.is_match(token) {
        token.to_string()
    } else if decimal_comma && DECIMAL_COMMA_RE.is_match(token) {
        token.replace(',', ".")
    } else {
        return None;
    };
    let value: f64 = normalized.parse().ok()?;
    let decimals = normalized.split('.').nth(1).map_or(0, |f| f.len() as u32);
    Some(TokenValue::Decimal { value, decimals })
}

fn parse_integer(token: &str) -> Option<TokenValue> {
    if !INTEGER_RE.is_match(token) {
        return None;
    }
    token.parse().ok().map(TokenValue::Integer)
}

fn parse_datetime(token: &str) -> Option<TokenValue> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(token, f).ok())
        .map(TokenValue::DateTime)
}

fn parse_date(token: &str) -> Option<TokenValue> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(token, f).ok())
        .map(TokenValue::Date)
}

fn parse_time(token: &str) -> Option<TokenValue> {
    if !token.contains(':') {
        return None;
    }
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(token, f).ok())
        .map(TokenValue::Time)
}

fn parse_unit_value(token: &str, decimal_comma: bool) -> Option<TokenValue> {
    let caps = UNIT_VALUE_RE.captures(token)?;
    let number = &caps[1];
    if number.contains(',') && !decimal_comma {
        return None;
    }
    let number = number.replace(',', ".");
    let value: f64 = number.parse().ok()?;
    let decimals = number.split('.').nth(1).map_or(0, |f| f.len() as u32);
    Some(TokenValue::UnitValue { value, decimals, unit: caps[2].to_string() })
}

/// Parse a trimmed token, trying each parser in priority order
pub fn parse_token(token: &str, decimal_comma: bool) -> TokenValue {
    parse_decimal(token, decimal_comma)
        .or_else(|| parse_integer(token))
        .or_else(|| parse_datetime(token))
        .or_else(|| parse_date(token))
        .or_else(|| parse_time(token))
        .or_else(|| parse_unit_value(token, decimal_comma))
        .unwrap_or(TokenValue::Text)
}

/// Numeric value of a token, stripping an attached unit
pub fn numeric_value(token: &str, decimal_comma: bool) -> Option<f64> {
    parse_token(token.trim(), decimal_comma).as_f64()
}

/// Per-position field description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// 0-based position
    pub position: usize,
    /// Inferred type
    pub field_type: FieldType,
    /// Suggested name
    pub name: String,
    /// Unit, when one was found
    pub unit: Option<String>,
    /// Unit touches the value (`12kg`) rather than following it (`12 kg`)
    pub unit_attached: bool,
    /// Smallest value (numeric fields whose values vary)
    pub min: Option<f64>,
    /// Largest value (numeric fields whose values vary)
    pub max: Option<f64>,
    /// Distinct values in first-seen order; empty once the field is continuous
    pub unique_values: Vec<String>,
    /// Exactly one distinct value across all samples
    pub is_constant: bool,
    /// Digits after the decimal separator (fixed-point fields)
    pub decimals: Option<u32>,
    /// Messages that carried a value at this position
    pub samples: usize,
    /// First observed value
    pub example: Option<String>,
    /// Share of samples (0-1) matching the inferred type
    pub confidence: f64,
}

impl FieldInfo {
    /// Constant value, when the field never changes
    pub fn constant_value(&self) -> Option<&str> {
        if self.is_constant {
            self.unique_values.first().map(String::as_str)
        } else {
            None
        }
    }
}

/// Kind used to vote on a field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    Number,
    Unit(String),
    Date,
    Time,
    DateTime,
    Text,
}

impl Kind {
    fn of(value: &TokenValue) -> Self {
        match value {
            TokenValue::Decimal { .. } | TokenValue::Integer(_) => Kind::Number,
            TokenValue::UnitValue { unit, .. } => Kind::Unit(unit.clone()),
            TokenValue::Date(_) => Kind::Date,
            TokenValue::Time(_) => Kind::Time,
            TokenValue::DateTime(_) => Kind::DateTime,
            TokenValue::Text => Kind::Text,
        }
    }
}

/// Field analyzer
#[derive(Debug, Clone)]
pub struct FieldAnalyzer {
    max_unique: usize,
    detect_header: bool,
}

impl Default for FieldAnalyzer {
    fn default() -> Self {
        Self::new(&FieldConfig::default())
    }
}

impl FieldAnalyzer {
    /// Create from config
    pub fn new(config: &FieldConfig) -> Self {
        Self {
            max_unique: config.max_unique_values,
            detect_header: config.detect_header,
        }
    }

    /// Disable header-row detection (used for package line groups)
    #[must_use]
    pub fn without_header(mut self) -> Self {
        self.detect_header = false;
        self
    }

    /// Analyze terminator-free message bodies split by `delimiter`
    ///
    /// Short messages simply do not contribute to the positions they lack.
    pub fn analyze<S: AsRef<str>>(&self, bodies: &[S], delimiter: Option<char>) -> Vec<FieldInfo> {
        let decimal_comma = delimiter != Some(',');
        let rows: Vec<Vec<&str>> = bodies
            .iter()
            .map(|b| tokenize(b.as_ref(), delimiter).into_iter().map(str::trim).collect())
            .collect();

        let header = if self.detect_header { detect_header(&rows, decimal_comma) } else { None };
        let data_rows = if header.is_some() { &rows[1..] } else { &rows[..] };

        let width = data_rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut fields: Vec<FieldInfo> = (0..width)
            .map(|p| {
                let tokens: Vec<&str> = data_rows
                    .iter()
                    .filter_map(|r| r.get(p).copied())
                    .filter(|t| !t.is_empty())
                    .collect();
                self.analyze_position(p, &tokens, decimal_comma)
            })
            .collect();

        attach_separate_units(&mut fields);
        assign_names(&mut fields, header.as_deref());

        tracing::debug!(
            fields = fields.len(),
            header = header.is_some(),
            delimiter = ?delimiter,
            "Fields analyzed"
        );
        fields
    }

    fn analyze_position(&self, position: usize, tokens: &[&str], decimal_comma: bool) -> FieldInfo {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut unique_values: Vec<String> = Vec::new();
        let mut overflow = false;
        for &token in tokens {
            if seen.contains(token) {
                continue;
            }
            if seen.len() >= self.max_unique {
                overflow = true;
                break;
            }
            seen.insert(token);
            unique_values.push(token.to_string());
        }
        let distinct_known = !overflow;
        let is_constant = distinct_known && unique_values.len() == 1;

        let mut info = FieldInfo {
            position,
            field_type: FieldType::Empty,
            name: String::new(),
            unit: None,
            unit_attached: false,
            min: None,
            max: None,
            unique_values: if distinct_known { unique_values } else { Vec::new() },
            is_constant,
            decimals: None,
            samples: tokens.len(),
            example: tokens.first().map(|t| t.to_string()),
            confidence: 0.0,
        };
        if tokens.is_empty() {
            return info;
        }

        let values: Vec<TokenValue> = tokens.iter().map(|t| parse_token(t, decimal_comma)).collect();
        let mut votes: HashMap<Kind, usize> = HashMap::new();
        for value in &values {
            *votes.entry(Kind::of(value)).or_insert(0) += 1;
        }
        let (kind, count) = winning_kind(votes);
        let share = count as f64 / values.len() as f64;

        if kind == Kind::Text || share < TYPE_DOMINANCE {
            info.field_type = if distinct_known { FieldType::Enum } else { FieldType::String };
            info.confidence = 1.0;
            return info;
        }

        let matching: Vec<&TokenValue> = values.iter().filter(|v| Kind::of(v) == kind).collect();
        info.confidence = share;
        info.field_type = match &kind {
            Kind::Number if matching.iter().all(|v| matches!(v, TokenValue::Integer(_))) => {
                FieldType::Integer
            }
            Kind::Number => FieldType::Decimal,
            Kind::Unit(unit) => {
                info.unit = Some(unit.clone());
                info.unit_attached = true;
                FieldType::UnitValue
            }
            Kind::Date => FieldType::Date,
            Kind::Time => FieldType::Time,
            Kind::DateTime => FieldType::DateTime,
            Kind::Text => FieldType::String,
        };

        if info.field_type.is_numeric() {
            if info.field_type != FieldType::Integer {
                info.decimals = matching.iter().map(|v| v.decimals()).max();
            }
            if !info.is_constant {
                let numbers = matching.iter().filter_map(|v| v.as_f64());
                info.min = numbers.clone().reduce(f64::min);
                info.max = numbers.reduce(f64::max);
            }
        }

        info
    }
}

/// Highest count wins; ties go to the kind's fixed order, then the unit text
fn winning_kind(votes: HashMap<Kind, usize>) -> (Kind, usize) {
    votes
        .into_iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| kind_order(&b.0).cmp(&kind_order(&a.0)))
                .then_with(|| unit_of(&b.0).cmp(&unit_of(&a.0)))
        })
        .unwrap_or((Kind::Text, 0))
}

fn unit_of(kind: &Kind) -> Option<&str> {
    match kind {
        Kind::Unit(unit) => Some(unit),
        _ => None,
    }
}

fn kind_order(kind: &Kind) -> u8 {
    match kind {
        Kind::Number => 0,
        Kind::Unit(_) => 1,
        Kind::DateTime => 2,
        Kind::Date => 3,
        Kind::Time => 4,
        Kind::Text => 5,
    }
}

/// First row is a header when it is all text and some position below it is numeric
fn detect_header(rows: &[Vec<&str>], decimal_comma: bool) -> Option<Vec<String>> {
    let (first, rest) = rows.split_first()?;
    if rest.len() < 2 || first.is_empty() {
        return None;
    }
    let all_text = first
        .iter()
        .all(|t| !t.is_empty() && parse_token(t, decimal_comma) == TokenValue::Text);
    if !all_text {
        return None;
    }

    let numeric_below = (0..first.len()).any(|p| {
        let numeric = rest
            .iter()
            .filter(|r| r.get(p).is_some_and(|t| numeric_value(t, decimal_comma).is_some()))
            .count();
        numeric as f64 / rest.len() as f64 >= HEADER_NUMERIC_SHARE
    });
    numeric_below.then(|| first.iter().map(|t| t.to_string()).collect())
}

/// A numeric field followed by a constant unit token gets that unit
fn attach_separate_units(fields: &mut [FieldInfo]) {
    for p in 0..fields.len().saturating_sub(1) {
        let unit = match fields[p + 1].constant_value() {
            Some(u) if UNIT_VOCABULARY.contains(&u) => u.to_string(),
            _ => continue,
        };
        let field = &mut fields[p];
        if matches!(field.field_type, FieldType::Integer | FieldType::Decimal) && field.unit.is_none() {
            field.unit = Some(unit);
            field.unit_attached = false;
        }
    }
}

/// Header text first, then unit-derived quantity names, then `FieldN`
fn assign_names(fields: &mut [FieldInfo], header: Option<&[String]>) {
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut unit_owner: HashMap<usize, String> = HashMap::new();

    for idx in 0..fields.len() {
        let field = &fields[idx];
        let base = header
            .and_then(|h| h.get(field.position))
            .cloned()
            .or_else(|| field.unit.as_deref().and_then(unit_quantity).map(str::to_string))
            .or_else(|| unit_owner.get(&field.position).map(|owner| format!("{owner}Unit")))
            .unwrap_or_else(|| format!("Field{}", field.position + 1));

        let n = used.entry(base.clone()).or_insert(0);
        *n += 1;
        let name = if *n == 1 { base } else { format!("{base}{n}") };

        if field.unit.is_some() && !field.unit_attached {
            unit_owner.insert(field.position + 1, name.clone());
        }
        fields[idx].name = name;
    }
}
