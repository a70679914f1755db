//! Remote API boundary: request bodies, response shapes and the tagged outcome type.
//!
//! Responses are parsed exactly once, here. Everything past this module works with
//! [`ApiOutcome`] and typed payloads instead of probing raw JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TsprepError};
use crate::models::{PreviewState, SelectionState, TabularSample, TimeSpec, TrainParams};
use crate::time_axis::AxisValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Upload,
    Select,
    Preprocess,
    Train,
    Forecast,
}

impl Endpoint {
    /// Last path segment under `/project/{id}/`.
    pub fn action(self) -> &'static str {
        match self {
            Endpoint::Upload => "upload",
            Endpoint::Select => "select",
            Endpoint::Preprocess => "preprocess",
            Endpoint::Train => "train",
            Endpoint::Forecast => "forecast",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action())
    }
}

/// Result of one API call after boundary parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Ok(T),
    Err { message: String },
}

impl<T: DeserializeOwned> ApiOutcome<T> {
    /// Parse a response body. `ok: false`, an `error` field, invalid JSON and an
    /// unexpected shape all become [`ApiOutcome::Err`].
    pub fn parse(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => {
                return ApiOutcome::Err {
                    message: format!("invalid response: {e}"),
                }
            }
        };
        if let Some(message) = failure_message(&value) {
            return ApiOutcome::Err { message };
        }
        match serde_json::from_value(value) {
            Ok(payload) => ApiOutcome::Ok(payload),
            Err(e) => ApiOutcome::Err {
                message: format!("unexpected response: {e}"),
            },
        }
    }
}

impl<T> ApiOutcome<T> {
    pub fn into_result(self, endpoint: Endpoint) -> Result<T> {
        match self {
            ApiOutcome::Ok(payload) => Ok(payload),
            ApiOutcome::Err { message } => Err(TsprepError::Api {
                endpoint: endpoint.to_string(),
                message,
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ApiOutcome::Ok(_))
    }
}

fn failure_message(value: &Value) -> Option<String> {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string);
    match value.get("ok").and_then(Value::as_bool) {
        Some(false) => Some(error.unwrap_or_else(|| "request failed".to_string())),
        Some(true) => None,
        None => error,
    }
}

/// Sends JSON to the server. Implemented over `fetch` in the browser and by
/// scripted fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// POST `body` to `url` and return the raw response text.
    async fn post_json(&self, url: &str, body: &Value) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectRequest {
    pub target: String,
    pub features: Vec<String>,
    pub time: TimeSpec,
}

impl SelectRequest {
    pub fn selection(&self) -> SelectionState {
        SelectionState::new(self.target.clone(), self.features.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessRequest {
    pub target: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainRequest {
    pub target: String,
    #[serde(flatten)]
    pub params: TrainParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRequest {
    pub target: String,
    pub steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub preview: Option<PreviewState>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SelectResponse {
    #[serde(default)]
    pub data: TabularSample,
    #[serde(default)]
    pub time: Option<TimeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub prediction: Vec<f64>,
    #[serde(default)]
    pub x: Option<Vec<AxisValue>>,
}
