//! The session snapshot and its single-owner store.
//!
//! A snapshot accretes one top-level key per workflow stage. Updates are shallow:
//! a key present in a partial update replaces the stored value wholesale.

use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{
    PreprocessState, PreviewState, SelectionState, TabularSample, TimeSpec, TrainState,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<TabularSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<PreprocessState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train: Option<TrainState>,
    /// Keys this client does not know about; carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value, dropping (and logging) any sub-state that does not parse.
    pub fn from_value(value: Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Self::default(),
            other => {
                warn!("snapshot is not an object ({}); starting empty", kind_of(&other));
                return Self::default();
            }
        };

        let mut snap = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "preview" => snap.preview = sub_state(&key, value),
                "selection" => snap.selection = sub_state(&key, value),
                "time" => snap.time = sub_state(&key, value),
                "sample" => snap.sample = sub_state(&key, value),
                "preprocess" => snap.preprocess = sub_state(&key, value),
                "train" => snap.train = sub_state(&key, value),
                _ => {
                    snap.extra.insert(key, value);
                }
            }
        }
        snap
    }

    /// Parse the serialized form. Only malformed JSON is an error; see [`Self::from_value`].
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Shallow merge: every key present in `partial` replaces the current value.
    pub fn merge(mut self, partial: SessionSnapshot) -> Self {
        if partial.preview.is_some() {
            self.preview = partial.preview;
        }
        if partial.selection.is_some() {
            self.selection = partial.selection;
        }
        if partial.time.is_some() {
            self.time = partial.time;
        }
        if partial.sample.is_some() {
            self.sample = partial.sample;
        }
        if partial.preprocess.is_some() {
            self.preprocess = partial.preprocess;
        }
        if partial.train.is_some() {
            self.train = partial.train;
        }
        self.extra.extend(partial.extra);
        self
    }

    /// Top-level keys present in this snapshot, in wire order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if self.preview.is_some() {
            keys.push("preview");
        }
        if self.selection.is_some() {
            keys.push("selection");
        }
        if self.time.is_some() {
            keys.push("time");
        }
        if self.sample.is_some() {
            keys.push("sample");
        }
        if self.preprocess.is_some() {
            keys.push("preprocess");
        }
        if self.train.is_some() {
            keys.push("train");
        }
        keys.extend(self.extra.keys().map(String::as_str));
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// The selected target column, if any.
    pub fn target(&self) -> Option<&str> {
        self.selection.as_ref().and_then(|s| s.target())
    }

    /// The current time spec, or the row index when none was chosen.
    pub fn time_spec(&self) -> TimeSpec {
        self.time.clone().unwrap_or_default()
    }

    pub fn features(&self) -> &[String] {
        self.selection
            .as_ref()
            .map(|s| s.features.as_slice())
            .unwrap_or(&[])
    }
}

impl<'de> Deserialize<'de> for SessionSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

fn sub_state<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, "dropping malformed snapshot entry: {}", e);
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: SessionSnapshot,
    revision: u64,
}

/// Owner of the live snapshot for one page view.
///
/// Clones share the same snapshot. [`SessionStore::merge`] is the only way to change it,
/// and it always applies to the value current at call time, so a response merged after
/// an `.await` never overwrites keys merged by another action in the meantime.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl SessionStore {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                snapshot: initial,
                revision: 0,
            })),
        }
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.borrow().snapshot.clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionSnapshot) -> R) -> R {
        f(&self.inner.borrow().snapshot)
    }

    /// Number of merges applied so far.
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    /// Merge `partial` into the current snapshot and return the result.
    pub fn merge(&self, partial: SessionSnapshot) -> SessionSnapshot {
        let mut inner = self.inner.borrow_mut();
        let keys: Vec<String> = partial.keys().into_iter().map(str::to_string).collect();
        let current = std::mem::take(&mut inner.snapshot);
        inner.snapshot = current.merge(partial);
        inner.revision += 1;
        info!(revision = inner.revision, ?keys, "snapshot merged");
        inner.snapshot.clone()
    }
}
