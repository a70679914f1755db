//! Chart projection: tabular samples → named (x, y) series for the renderer.
//!
//! Everything here is pure. Drawing happens behind [`crate::surface::Surface`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{scalar_as_f64, Curve, TabularSample, TimeSpec};
use crate::time_axis::{self, AxisValue};

/// Name of the appended forecast trace.
pub const FORECAST_SERIES: &str = "Forecast";
/// Name of the duration-delta trace on the secondary preprocessing chart.
pub const CURVE_SERIES: &str = "Δ% duration";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceMode {
    #[default]
    #[serde(rename = "lines")]
    Lines,
    #[serde(rename = "lines+markers")]
    LinesMarkers,
}

/// One trace: `x` and `y` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub x: Vec<AxisValue>,
    /// `None` marks a gap (missing or non-numeric cell).
    pub y: Vec<Option<f64>>,
    #[serde(default)]
    pub mode: TraceMode,
}

impl Series {
    pub fn new(name: impl Into<String>, x: Vec<AxisValue>, y: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self {
            name: name.into(),
            x,
            y,
            mode: TraceMode::Lines,
        }
    }

    pub fn with_mode(mut self, mode: TraceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(min, max)` over the non-gap y values.
    pub fn y_range(&self) -> Option<(f64, f64)> {
        y_range(std::slice::from_ref(self))
    }
}

/// A vertical reference line spanning `[y0, y1]` at `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub x: AxisValue,
    pub y0: f64,
    pub y1: f64,
    pub color: String,
    pub dash: String,
}

impl Marker {
    pub fn boundary(x: AxisValue, y0: f64, y1: f64) -> Self {
        Self {
            x,
            y0,
            y1,
            color: "#ef4444".to_string(),
            dash: "dot".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartStyle {
    pub paper_bgcolor: String,
    pub plot_bgcolor: String,
    pub font_color: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            paper_bgcolor: "#111418".to_string(),
            plot_bgcolor: "#111418".to_string(),
            font_color: "#e6e6e6".to_string(),
        }
    }
}

/// Everything one `draw_chart` call needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub style: ChartStyle,
}

impl Chart {
    pub fn new(series: Vec<Series>) -> Self {
        Self {
            series,
            ..Default::default()
        }
    }

    pub fn with_markers(mut self, markers: Vec<Marker>) -> Self {
        self.markers = markers;
        self
    }

    pub fn series_names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }
}

fn column_y(sample: &TabularSample, column: &str) -> Vec<Option<f64>> {
    sample
        .column_values(column)
        .map(|v| v.and_then(scalar_as_f64))
        .collect()
}

fn y_range(series: &[Series]) -> Option<(f64, f64)> {
    series
        .iter()
        .flat_map(|s| s.y.iter().flatten().copied())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Project `sample` into one series for the target and one per known feature.
///
/// All series share a single x-axis resolved from `spec`. Unknown feature
/// columns are skipped.
pub fn project(
    sample: &TabularSample,
    target: Option<&str>,
    features: &[String],
    spec: &TimeSpec,
) -> Vec<Series> {
    let x = time_axis::resolve(sample, spec);
    project_on_axis(sample, target, features, x)
}

fn project_on_axis(
    sample: &TabularSample,
    target: Option<&str>,
    features: &[String],
    x: Vec<AxisValue>,
) -> Vec<Series> {
    let target = target.filter(|t| !t.is_empty() && sample.has_column(t));
    let columns = target
        .into_iter()
        .chain(features.iter().map(String::as_str).filter(|f| sample.has_column(f)));

    columns
        .map(|col| Series::new(col, x.clone(), column_y(sample, col)))
        .collect()
}

/// The preprocessing segment plot: target series plus dotted boundary markers.
///
/// `explicit_x` is used instead of resolving `spec` when its length matches the segment.
pub fn project_preprocess(
    segment: &TabularSample,
    target: Option<&str>,
    spec: &TimeSpec,
    bounds: &[AxisValue],
    explicit_x: Option<&[AxisValue]>,
) -> Chart {
    let x = match explicit_x {
        Some(x) if x.len() == segment.len() => x.to_vec(),
        _ => time_axis::resolve(segment, spec),
    };
    let series = project_on_axis(segment, target, &[], x);

    let markers = match y_range(&series) {
        Some((lo, hi)) => bounds
            .iter()
            .map(|b| Marker::boundary(b.clone(), lo, hi))
            .collect(),
        None => Vec::new(),
    };
    Chart::new(series).with_markers(markers)
}

/// The secondary duration-delta chart, drawn with markers and lines.
pub fn project_curve(curve: &Curve) -> Chart {
    let n = curve.x.len().min(curve.y.len());
    let x = curve.x[..n]
        .iter()
        .map(|v| AxisValue::from_json(&serde_json::Value::from(*v)))
        .collect();
    let y = curve.y[..n].iter().map(|v| Some(*v)).collect();
    Chart::new(vec![
        Series::new(CURVE_SERIES, x, y).with_mode(TraceMode::LinesMarkers)
    ])
}

/// Continue `historical` with `prediction` on one chart.
///
/// The future x-axis is `future_x` when it matches the prediction length,
/// otherwise it is synthesized as `len(historical), len(historical)+1, …`.
pub fn project_forecast(
    historical: Option<&Series>,
    target: &str,
    prediction: &[f64],
    future_x: Option<&[AxisValue]>,
) -> Chart {
    let history = match historical {
        Some(s) => Series::new(target, s.x.clone(), s.y.clone()),
        None => Series::new(target, Vec::new(), Vec::new()),
    };

    let start = history.len();
    let x = match future_x {
        Some(x) if x.len() == prediction.len() => x.to_vec(),
        Some(x) => {
            warn!(
                expected = prediction.len(),
                got = x.len(),
                "forecast x-axis length mismatch; continuing the index instead"
            );
            time_axis::index_axis_from(start, prediction.len())
        }
        None => time_axis::index_axis_from(start, prediction.len()),
    };
    let forecast = Series::new(
        FORECAST_SERIES,
        x,
        prediction.iter().map(|v| Some(*v)).collect(),
    );
    Chart::new(vec![history, forecast])
}
