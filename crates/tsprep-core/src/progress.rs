//! Workflow progress derived from a snapshot.

use serde::Serialize;

use crate::snapshot::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Upload,
    DataInfo,
    Preprocess,
    ModelSelection,
    TrainForecast,
    Export,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 6] = [
        WorkflowStep::Upload,
        WorkflowStep::DataInfo,
        WorkflowStep::Preprocess,
        WorkflowStep::ModelSelection,
        WorkflowStep::TrainForecast,
        WorkflowStep::Export,
    ];

    pub fn label(self) -> &'static str {
        match self {
            WorkflowStep::Upload => "Upload data",
            WorkflowStep::DataInfo => "Data info",
            WorkflowStep::Preprocess => "Preprocessing",
            WorkflowStep::ModelSelection => "Model selection",
            WorkflowStep::TrainForecast => "Training & forecast",
            WorkflowStep::Export => "Export PDF",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkflowProgress {
    pub step_done: [bool; 6],
    /// First step not yet done.
    pub active_step: Option<usize>,
}

impl WorkflowProgress {
    /// Recompute progress from scratch. Nothing is cached between calls.
    pub fn derive(snapshot: &SessionSnapshot) -> Self {
        let uploaded = snapshot
            .preview
            .as_ref()
            .is_some_and(|p| p.info.is_some());
        let data_info = uploaded
            || snapshot
                .sample
                .as_ref()
                .is_some_and(|s| !s.columns.is_empty());
        let preprocessed = snapshot
            .preprocess
            .as_ref()
            .is_some_and(|p| p.segment.is_some());
        let trained = snapshot.train.as_ref().is_some_and(|t| t.loss.is_some());
        let model_selection = data_info || preprocessed || trained;

        let step_done = [
            uploaded,
            data_info,
            preprocessed,
            model_selection,
            trained,
            // export is a one-shot print action with nothing persisted
            false,
        ];
        let active_step = step_done.iter().position(|done| !done);
        Self {
            step_done,
            active_step,
        }
    }

    pub fn is_done(&self, step: WorkflowStep) -> bool {
        self.step_done[step.index()]
    }

    pub fn active(&self) -> Option<WorkflowStep> {
        self.active_step.map(|i| WorkflowStep::ALL[i])
    }

    pub fn completed(&self) -> usize {
        self.step_done.iter().filter(|d| **d).count()
    }
}
