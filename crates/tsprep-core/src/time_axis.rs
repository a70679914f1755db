//! Time-axis resolution: turns a time column plus a [`TimeSpec`] into x-axis values.
//!
//! Resolution never fails as a whole. Each row is resolved independently and a row
//! that cannot be read under the declared kind degrades to its raw text, so a chart
//! with a partly malformed time column still renders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TsprepError};
use crate::models::{scalar_as_f64, scalar_as_text, Record, TabularSample, TimeKind, TimeSpec};

/// One position on a chart's x-axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisValue {
    /// 0-based row position.
    Index(u64),
    /// Any other numeric position, such as a fractional duration delta.
    Number(f64),
    /// A point in time, normalised to UTC.
    Time(DateTime<Utc>),
    /// Opaque display text; no temporal ordering.
    Label(String),
}

impl AxisValue {
    pub fn as_index(&self) -> Option<u64> {
        match self {
            AxisValue::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AxisValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Read a server-supplied axis position (bounds, explicit forecast x).
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_u64() {
                    return AxisValue::Index(i);
                }
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                        AxisValue::Index(f as u64)
                    }
                    Some(f) => AxisValue::Number(f),
                    None => AxisValue::Label(n.to_string()),
                }
            }
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => AxisValue::Time(dt.with_timezone(&Utc)),
                Err(_) => AxisValue::Label(s.clone()),
            },
            other => AxisValue::Label(scalar_as_text(other)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AxisValue::Index(i) => Value::from(*i),
            AxisValue::Number(f) => Value::from(*f),
            AxisValue::Time(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            AxisValue::Label(s) => Value::String(s.clone()),
        }
    }
}

impl From<u64> for AxisValue {
    fn from(i: u64) -> Self {
        AxisValue::Index(i)
    }
}

impl From<DateTime<Utc>> for AxisValue {
    fn from(t: DateTime<Utc>) -> Self {
        AxisValue::Time(t)
    }
}

impl std::fmt::Display for AxisValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisValue::Index(i) => write!(f, "{i}"),
            AxisValue::Number(n) => write!(f, "{n}"),
            AxisValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            AxisValue::Label(s) => f.write_str(s),
        }
    }
}

impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AxisValue::Index(i) => serializer.serialize_u64(*i),
            AxisValue::Number(f) => serializer.serialize_f64(*f),
            AxisValue::Time(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            AxisValue::Label(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for AxisValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(AxisValue::from_json(&value))
    }
}

/// A compiled strftime-like pattern supporting `%Y %m %d %H %M %S`.
#[derive(Debug, Clone)]
pub struct TimePattern {
    source: String,
    regex: Regex,
}

impl TimePattern {
    /// Pattern used by `datetime_format` when no format is given.
    pub const COMPACT: &'static str = "%Y%m%dT%H%M";

    pub fn compile(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' {
                if let Some(group) = chars.peek().and_then(|t| token_group(*t)) {
                    expr.push_str(group);
                    chars.next();
                    continue;
                }
            }
            let mut buf = [0u8; 4];
            expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| TsprepError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parse `input` against the pattern. `None` is a parse failure for this input only.
    pub fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        let caps = self.regex.captures(input)?;
        let field = |name: &str, default: u32| -> Option<u32> {
            match caps.name(name) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(default),
            }
        };
        let year: i32 = match caps.name("Y") {
            Some(m) => m.as_str().parse().ok()?,
            None => 1970,
        };
        let month = field("m", 1)?.max(1);
        let day = field("d", 1)?.max(1);
        let hour = field("H", 0)?;
        let minute = field("M", 0)?;
        let second = field("S", 0)?;
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, minute, second)
            .map(|dt| dt.and_utc())
    }
}

fn token_group(token: char) -> Option<&'static str> {
    match token {
        'Y' => Some("(?P<Y>[0-9]{4})"),
        'm' => Some("(?P<m>[0-9]{2})"),
        'd' => Some("(?P<d>[0-9]{2})"),
        'H' => Some("(?P<H>[0-9]{2})"),
        'M' => Some("(?P<M>[0-9]{2})"),
        'S' => Some("(?P<S>[0-9]{2})"),
        _ => None,
    }
}

/// Resolve the x-axis for a whole sample.
///
/// Falls back to the row index when the spec names no column or a column the
/// sample does not carry.
pub fn resolve(sample: &TabularSample, spec: &TimeSpec) -> Vec<AxisValue> {
    match spec.column.as_deref() {
        Some(col) if sample.has_column(col) => resolve_records(&sample.records, spec),
        _ => index_axis(sample.records.len()),
    }
}

/// Resolve the x-axis for `records` without checking the column list.
pub fn resolve_records(records: &[Record], spec: &TimeSpec) -> Vec<AxisValue> {
    let column = match (spec.kind, spec.column.as_deref()) {
        (TimeKind::Index, _) | (_, None) => return index_axis(records.len()),
        (_, Some(col)) => col,
    };

    let pattern = match spec.kind {
        TimeKind::DatetimeFormat => {
            let source = spec.pattern().unwrap_or(TimePattern::COMPACT);
            match TimePattern::compile(source) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("{}; every row keeps its raw value", e);
                    None
                }
            }
        }
        _ => None,
    };

    let axis: Vec<AxisValue> = records
        .iter()
        .map(|r| resolve_value(r.get(column), spec.kind, pattern.as_ref()))
        .collect();

    if tracing::enabled!(tracing::Level::DEBUG) {
        let fallbacks = axis
            .iter()
            .filter(|v| matches!(v, AxisValue::Label(_)))
            .count();
        debug!(
            column,
            kind = %spec.kind,
            rows = axis.len(),
            fallbacks,
            "time axis resolved"
        );
    }
    axis
}

/// `[0, 1, …, len-1]`.
pub fn index_axis(len: usize) -> Vec<AxisValue> {
    (0..len as u64).map(AxisValue::Index).collect()
}

/// Continue an index axis: `[start, start+1, …]` of `len` entries.
pub fn index_axis_from(start: usize, len: usize) -> Vec<AxisValue> {
    (start as u64..(start + len) as u64)
        .map(AxisValue::Index)
        .collect()
}

/// Resolve a single raw cell. `pattern` is only consulted for `datetime_format`;
/// when it is `None` there the row keeps its raw value.
pub fn resolve_value(raw: Option<&Value>, kind: TimeKind, pattern: Option<&TimePattern>) -> AxisValue {
    static NULL: Value = Value::Null;
    let raw = raw.unwrap_or(&NULL);
    let parsed = match kind {
        TimeKind::Index => None,
        TimeKind::TimestampSec => scalar_as_f64(raw).and_then(|s| from_millis(s * 1000.0)),
        TimeKind::TimestampMs => scalar_as_f64(raw).and_then(from_millis),
        TimeKind::DatetimeFormat => pattern.and_then(|p| p.parse(&scalar_as_text(raw))),
        TimeKind::IsoDate => parse_iso(&scalar_as_text(raw)),
        TimeKind::Rfc2822 => DateTime::parse_from_rfc2822(scalar_as_text(raw).trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        TimeKind::HumanReadable => None,
    };
    match parsed {
        Some(t) => AxisValue::Time(t),
        None => AxisValue::Label(scalar_as_text(raw)),
    }
}

fn from_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms.round() as i64)
}

/// ISO 8601 in the shapes CSV exports actually use. Values without an offset are read as UTC.
pub fn parse_iso(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn records(column: &str, values: &[Value]) -> Vec<Record> {
        values
            .iter()
            .map(|v| {
                let mut r = Record::new();
                r.insert(column.to_string(), v.clone());
                r
            })
            .collect()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> AxisValue {
        AxisValue::Time(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn index_kind_ignores_column() {
        let recs = records("ts", &[json!("a"), json!("b"), json!("c")]);
        let spec = TimeSpec::new("ts", TimeKind::Index);
        assert_eq!(
            resolve_records(&recs, &spec),
            vec![AxisValue::Index(0), AxisValue::Index(1), AxisValue::Index(2)]
        );
    }

    #[test]
    fn unknown_column_falls_back_to_index() {
        let sample = TabularSample::new(vec!["v".into()], records("v", &[json!(1), json!(2)]));
        let spec = TimeSpec::new("ts", TimeKind::TimestampSec);
        assert_eq!(resolve(&sample, &spec), index_axis(2));
    }

    #[test]
    fn unix_seconds_and_millis() {
        let recs = records("ts", &[json!(1_700_000_000), json!("1700000060")]);
        let secs = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::TimestampSec));
        assert_eq!(secs[0], utc(2023, 11, 14, 22, 13, 20));
        assert_eq!(secs[1], utc(2023, 11, 14, 22, 14, 20));

        let recs = records("ts", &[json!(1_700_000_000_000i64)]);
        let ms = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::TimestampMs));
        assert_eq!(ms[0], utc(2023, 11, 14, 22, 13, 20));
    }

    #[test]
    fn compact_fallback_matches_explicit_pattern() {
        let recs = records("ts", &[json!("20240315T0930"), json!("19991231T2359")]);
        let implicit = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::DatetimeFormat));
        let explicit = resolve_records(
            &recs,
            &TimeSpec::new("ts", TimeKind::DatetimeFormat).with_format("%Y%m%dT%H%M"),
        );
        assert_eq!(implicit, explicit);
        assert_eq!(implicit[0], utc(2024, 3, 15, 9, 30, 0));
    }

    #[test]
    fn bad_row_keeps_raw_value_without_affecting_siblings() {
        let recs = records(
            "ts",
            &[json!("2024-01-02 03:04:05"), json!("garbage"), json!("2024-01-02 03:04:06")],
        );
        let spec = TimeSpec::new("ts", TimeKind::DatetimeFormat).with_format("%Y-%m-%d %H:%M:%S");
        let axis = resolve_records(&recs, &spec);
        assert_eq!(axis[0], utc(2024, 1, 2, 3, 4, 5));
        assert_eq!(axis[1], AxisValue::Label("garbage".into()));
        assert_eq!(axis[2], utc(2024, 1, 2, 3, 4, 6));
    }

    #[test]
    fn pattern_defaults_and_literals() {
        let p = TimePattern::compile("%d.%m.%Y").unwrap();
        assert_eq!(p.parse("05.06.2023"), utc(2023, 6, 5, 0, 0, 0).as_time());
        // `.` is literal, not "any character"
        assert_eq!(p.parse("05x06x2023"), None);

        let year_only = TimePattern::compile("FY%Y").unwrap();
        assert_eq!(year_only.parse("FY2020"), utc(2020, 1, 1, 0, 0, 0).as_time());

        let no_year = TimePattern::compile("%H:%M").unwrap();
        assert_eq!(no_year.parse("12:30"), utc(1970, 1, 1, 12, 30, 0).as_time());
    }

    #[test]
    fn impossible_dates_are_row_failures() {
        let p = TimePattern::compile("%Y-%m-%d").unwrap();
        assert_eq!(p.parse("2023-02-30"), None);
        assert_eq!(p.parse("2023-1-05"), None);
    }

    #[test]
    fn duplicate_tokens_degrade_to_labels() {
        assert!(TimePattern::compile("%Y-%Y").is_err());
        let recs = records("ts", &[json!("2020-2020")]);
        let spec = TimeSpec::new("ts", TimeKind::DatetimeFormat).with_format("%Y-%Y");
        assert_eq!(
            resolve_records(&recs, &spec),
            vec![AxisValue::Label("2020-2020".into())]
        );
    }

    #[test]
    fn iso_and_rfc2822() {
        let recs = records(
            "ts",
            &[json!("2024-05-01T10:00:00+02:00"), json!("2024-05-01"), json!("not a date")],
        );
        let axis = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::IsoDate));
        assert_eq!(axis[0], utc(2024, 5, 1, 8, 0, 0));
        assert_eq!(axis[1], utc(2024, 5, 1, 0, 0, 0));
        assert_eq!(axis[2], AxisValue::Label("not a date".into()));

        let recs = records("ts", &[json!("Wed, 01 May 2024 10:00:00 +0000")]);
        let axis = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::Rfc2822));
        assert_eq!(axis[0], utc(2024, 5, 1, 10, 0, 0));
    }

    #[test]
    fn human_readable_is_untouched() {
        let recs = records("ts", &[json!("early March 2024"), Value::Null]);
        let axis = resolve_records(&recs, &TimeSpec::new("ts", TimeKind::HumanReadable));
        assert_eq!(
            axis,
            vec![AxisValue::Label("early March 2024".into()), AxisValue::Label(String::new())]
        );
    }

    #[test]
    fn axis_value_json_forms() {
        assert_eq!(AxisValue::from_json(&json!(7)), AxisValue::Index(7));
        assert_eq!(AxisValue::from_json(&json!(7.0)), AxisValue::Index(7));
        assert_eq!(AxisValue::from_json(&json!(-1)), AxisValue::Number(-1.0));
        assert_eq!(AxisValue::from_json(&json!(0.5)), AxisValue::Number(0.5));
        assert_eq!(
            AxisValue::from_json(&json!("2024-01-01T00:00:00Z")),
            utc(2024, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            serde_json::to_value(utc(2024, 1, 1, 0, 0, 0)).unwrap(),
            json!("2024-01-01T00:00:00.000Z")
        );
        let back: AxisValue = serde_json::from_value(json!("2024-01-01T00:00:00.000Z")).unwrap();
        assert_eq!(back, utc(2024, 1, 1, 0, 0, 0));
    }
}
