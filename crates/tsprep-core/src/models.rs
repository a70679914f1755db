//! Data models shared by the resolver, the projector and the snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time_axis::AxisValue;

/// One row of a sample: column name → scalar value.
pub type Record = serde_json::Map<String, Value>;

/// An ordered table sample as the server returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularSample {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub records: Vec<Record>,
    /// Record count reported by the server; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl TabularSample {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            columns,
            records,
            size: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Raw values of `column` in record order; `None` where a record lacks the key.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| r.get(column))
    }

    /// The first `n` records, for bounded table previews.
    pub fn head(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }
}

/// How the values of the time column should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKind {
    #[default]
    Index,
    TimestampSec,
    TimestampMs,
    DatetimeFormat,
    IsoDate,
    #[serde(rename = "rfc_2822")]
    Rfc2822,
    HumanReadable,
}

impl TimeKind {
    pub const ALL: [TimeKind; 7] = [
        TimeKind::Index,
        TimeKind::TimestampSec,
        TimeKind::TimestampMs,
        TimeKind::DatetimeFormat,
        TimeKind::IsoDate,
        TimeKind::Rfc2822,
        TimeKind::HumanReadable,
    ];

    /// Wire name, also used as the `<option>` value of the kind dropdown.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeKind::Index => "index",
            TimeKind::TimestampSec => "timestamp_sec",
            TimeKind::TimestampMs => "timestamp_ms",
            TimeKind::DatetimeFormat => "datetime_format",
            TimeKind::IsoDate => "iso_date",
            TimeKind::Rfc2822 => "rfc_2822",
            TimeKind::HumanReadable => "human_readable",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeKind::Index => "Row index",
            TimeKind::TimestampSec => "Unix seconds",
            TimeKind::TimestampMs => "Unix milliseconds",
            TimeKind::DatetimeFormat => "Custom format",
            TimeKind::IsoDate => "ISO 8601",
            TimeKind::Rfc2822 => "RFC 2822",
            TimeKind::HumanReadable => "Text label",
        }
    }
}

impl std::fmt::Display for TimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TimeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown time kind: {s}"))
    }
}

/// Which column carries time, and how to read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSpec {
    /// `None` means "plot against the row index".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub kind: TimeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl TimeSpec {
    pub fn index() -> Self {
        Self::default()
    }

    pub fn new(column: impl Into<String>, kind: TimeKind) -> Self {
        Self {
            column: Some(column.into()),
            kind,
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The explicit pattern, if one was given and is non-empty.
    pub fn pattern(&self) -> Option<&str> {
        self.format.as_deref().filter(|f| !f.is_empty())
    }
}

/// Target and feature columns picked by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(default)]
    pub target: Option<String>,
    /// Display order is selection order.
    #[serde(default)]
    pub features: Vec<String>,
}

impl SelectionState {
    pub fn new(target: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            target: Some(target.into()),
            features,
        }
    }

    /// The target column, ignoring an empty selection.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.is_empty())
    }
}

/// Upload summary: first rows plus column metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewState {
    #[serde(default)]
    pub head: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<PreviewInfo>,
}

impl PreviewState {
    pub fn column_names(&self) -> Option<&[String]> {
        self.info.as_ref().map(|i| i.column_names.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewInfo {
    pub column_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub dtypes: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub na_counts: serde_json::Map<String, Value>,
}

/// The duration-delta curve computed by preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    #[serde(default)]
    pub x: Vec<f64>,
    #[serde(default)]
    pub y: Vec<f64>,
}

/// Result of the preprocessing step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<TabularSample>,
    #[serde(default)]
    pub bounds: Vec<AxisValue>,
    #[serde(default)]
    pub curve: Curve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<AxisValue>>,
}

/// Hyper-parameters the model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub model: String,
    pub window: u32,
    pub horizon: u32,
    pub epochs: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_val_split")]
    pub val_split: f64,
}

fn default_batch_size() -> u32 {
    32
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_val_split() -> f64 {
    0.2
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            model: "mlp".to_string(),
            window: 32,
            horizon: 12,
            epochs: 5,
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            val_split: default_val_split(),
        }
    }
}

/// Result of training and, later, forecasting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_mae: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continued: Option<bool>,
    #[serde(default)]
    pub prediction: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<AxisValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_curve: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss_curve: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<TrainParams>,
}

impl TrainState {
    /// One-line summary shown under the training controls.
    pub fn summary(&self) -> Option<String> {
        let loss = self.loss?;
        let mut line = format!("Loss: {loss:.6}");
        if let Some(v) = self.val_loss {
            line.push_str(&format!(" | val_loss: {v:.6}"));
        }
        if let Some(v) = self.val_mae {
            line.push_str(&format!(" | val_mae: {v:.6}"));
        }
        Some(line)
    }
}

/// Numeric reading of a scalar cell: numbers as-is, numeric strings parsed.
pub fn scalar_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Display text of a scalar cell; null renders as empty.
pub fn scalar_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
