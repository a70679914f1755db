//! Client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TrainParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for every API path, e.g. `http://127.0.0.1:5000`. Empty = same origin.
    pub api_base: String,
    /// Id of the element holding the server-embedded snapshot.
    pub snapshot_element: String,
    /// Rows shown in the selected-sample preview table.
    pub preview_rows: usize,
    /// Preprocessing method sent when the user has not picked one.
    pub preprocess_method: String,
    pub train: TrainParams,
    pub forecast_steps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            snapshot_element: "snapshot-data".to_string(),
            preview_rows: 5,
            preprocess_method: "cusum".to_string(),
            train: TrainParams::default(),
            forecast_steps: 12,
        }
    }
}

impl ClientConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a YAML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// `{api_base}/project/{project_id}/{action}`.
    pub fn endpoint(&self, project_id: &str, action: &str) -> String {
        format!(
            "{}/project/{}/{}",
            self.api_base.trim_end_matches('/'),
            project_id,
            action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = ClientConfig::from_yaml("preview_rows: 10\ntrain:\n  model: lstm\n  window: 64\n  horizon: 6\n  epochs: 20\n").unwrap();
        assert_eq!(cfg.preview_rows, 10);
        assert_eq!(cfg.train.model, "lstm");
        assert_eq!(cfg.train.batch_size, 32);
        assert_eq!(cfg.snapshot_element, "snapshot-data");
        assert_eq!(cfg.forecast_steps, 12);
    }

    #[test]
    fn endpoint_joins_base() {
        let cfg = ClientConfig {
            api_base: "http://localhost:5000/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.endpoint("p1", "train"),
            "http://localhost:5000/project/p1/train"
        );
        assert_eq!(ClientConfig::default().endpoint("p1", "select"), "/project/p1/select");
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = ClientConfig::load(Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }
}
