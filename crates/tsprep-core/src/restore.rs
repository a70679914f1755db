//! Page restoration from a serialized snapshot.
//!
//! Stages run in dependency order. Each one is skipped when its input is absent and
//! fails on its own when a render target is missing; a failed stage never stops the
//! stages after it.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chart::{self, Chart, Series};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::progress::WorkflowProgress;
use crate::snapshot::SessionSnapshot;
use crate::surface::{ids, SelectorControls, Surface, TableView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStage {
    Preview,
    Selection,
    Preprocess,
    Train,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Rendered,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestoreReport {
    pub stages: Vec<(RestoreStage, StageOutcome)>,
}

impl RestoreReport {
    pub fn outcome(&self, stage: RestoreStage) -> Option<&StageOutcome> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, o)| o)
    }

    pub fn failures(&self) -> usize {
        self.stages
            .iter()
            .filter(|(_, o)| matches!(o, StageOutcome::Failed(_)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct RestoreController {
    preview_rows: usize,
}

impl Default for RestoreController {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl RestoreController {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            preview_rows: config.preview_rows,
        }
    }

    /// Parse `serialized` and rebuild the page from it. Returns the parsed snapshot,
    /// which seeds the live store. Unparsable input restores an empty page.
    pub fn restore<S: Surface>(&self, surface: &mut S, serialized: &str) -> SessionSnapshot {
        let snapshot = SessionSnapshot::from_json(serialized).unwrap_or_else(|e| {
            warn!("embedded snapshot unreadable, starting empty: {}", e);
            SessionSnapshot::default()
        });
        let report = self.restore_snapshot(surface, &snapshot);
        info!(
            keys = ?snapshot.keys(),
            failures = report.failures(),
            "page restored"
        );
        snapshot
    }

    /// Run every stage against `snapshot`. Calling it twice yields the same page.
    pub fn restore_snapshot<S: Surface>(
        &self,
        surface: &mut S,
        snapshot: &SessionSnapshot,
    ) -> RestoreReport {
        let stages = [
            RestoreStage::Preview,
            RestoreStage::Selection,
            RestoreStage::Preprocess,
            RestoreStage::Train,
            RestoreStage::Progress,
        ];
        let stages = stages
            .into_iter()
            .map(|stage| (stage, self.run_stage(stage, surface, snapshot)))
            .collect();
        RestoreReport { stages }
    }

    /// Run a single stage, logging a failure instead of returning it.
    pub fn run_stage<S: Surface>(
        &self,
        stage: RestoreStage,
        surface: &mut S,
        snapshot: &SessionSnapshot,
    ) -> StageOutcome {
        let result = match stage {
            RestoreStage::Preview => self.render_preview(surface, snapshot),
            RestoreStage::Selection => self.render_selection(surface, snapshot),
            RestoreStage::Preprocess => self.render_preprocess(surface, snapshot),
            RestoreStage::Train => self.render_train(surface, snapshot),
            RestoreStage::Progress => self.render_progress(surface, snapshot),
        };
        match result {
            Ok(true) => StageOutcome::Rendered,
            Ok(false) => StageOutcome::Skipped,
            Err(e) => {
                warn!(?stage, "restore stage failed: {}", e);
                StageOutcome::Failed(e.to_string())
            }
        }
    }

    /// Head-rows table and the column-selection controls.
    pub fn render_preview<S: Surface>(&self, surface: &mut S, snap: &SessionSnapshot) -> Result<bool> {
        let Some(preview) = snap.preview.as_ref() else {
            return Ok(false);
        };
        let Some(columns) = preview.column_names() else {
            return Ok(false);
        };
        surface.render_table(
            ids::PREVIEW_TABLE,
            &TableView::from_records(columns, &preview.head),
        )?;
        surface.render_selectors(&SelectorControls::for_columns(columns))?;
        Ok(true)
    }

    /// Bounded sample table, the main plot, then whichever selection controls are on the page.
    pub fn render_selection<S: Surface>(
        &self,
        surface: &mut S,
        snap: &SessionSnapshot,
    ) -> Result<bool> {
        let Some(sample) = snap.sample.as_ref() else {
            return Ok(false);
        };
        let selection = snap.selection.clone().unwrap_or_default();
        surface.render_table(
            ids::SELECTED_TABLE,
            &TableView::from_records(&sample.columns, sample.head(self.preview_rows)),
        )?;
        let series = chart::project(
            sample,
            selection.target(),
            &selection.features,
            &snap.time_spec(),
        );
        debug!(series = series.len(), rows = sample.len(), "main plot projected");
        surface.draw_chart(ids::MAIN_PLOT, &Chart::new(series))?;

        surface.apply_selection(&selection, snap.time.as_ref())?;
        Ok(true)
    }

    /// Segment plot against the current selection, then the duration-delta curve.
    pub fn render_preprocess<S: Surface>(
        &self,
        surface: &mut S,
        snap: &SessionSnapshot,
    ) -> Result<bool> {
        let Some(pp) = snap.preprocess.as_ref() else {
            return Ok(false);
        };
        if let Some(segment) = pp.segment.as_ref() {
            let chart = chart::project_preprocess(
                segment,
                snap.target(),
                &snap.time_spec(),
                &pp.bounds,
                pp.x.as_deref(),
            );
            surface.draw_chart(ids::PREPROCESS_PLOT, &chart)?;
        }
        surface.draw_chart(ids::PREPROCESS_CURVE, &chart::project_curve(&pp.curve))?;
        Ok(true)
    }

    /// Loss line and, with a target selected, the forecast continuation.
    pub fn render_train<S: Surface>(&self, surface: &mut S, snap: &SessionSnapshot) -> Result<bool> {
        let Some(train) = snap.train.as_ref() else {
            return Ok(false);
        };
        if let Some(line) = train.summary() {
            surface.set_text(ids::TRAIN_INFO, &line)?;
        }
        let Some(target) = snap.target() else {
            return Ok(true);
        };
        let history = historical_series(surface, target);
        let chart = chart::project_forecast(
            history.as_ref(),
            target,
            &train.prediction,
            train.x.as_deref(),
        );
        surface.draw_chart(ids::FORECAST_PLOT, &chart)?;
        Ok(true)
    }

    pub fn render_progress<S: Surface>(
        &self,
        surface: &mut S,
        snap: &SessionSnapshot,
    ) -> Result<bool> {
        surface.show_progress(&WorkflowProgress::derive(snap))?;
        Ok(true)
    }
}

/// The target trace already on the page: the preprocessing plot first, then the main plot.
fn historical_series<S: Surface>(surface: &S, target: &str) -> Option<Series> {
    [ids::PREPROCESS_PLOT, ids::MAIN_PLOT]
        .into_iter()
        .filter_map(|id| surface.drawn_chart(id))
        .find_map(|c| c.series.iter().find(|s| s.name == target))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use serde_json::json;

    fn full_snapshot() -> SessionSnapshot {
        SessionSnapshot::from_value(json!({
            "preview": {
                "head": [{"t": 0, "v": 1}],
                "info": {"column_names": ["t", "v"]}
            },
            "selection": {"target": "v", "features": []},
            "time": {"kind": "index"},
            "sample": {
                "columns": ["t", "v"],
                "records": [{"t": 0, "v": 1}, {"t": 1, "v": 2}, {"t": 2, "v": 3}]
            },
            "preprocess": {
                "segment": {"columns": ["v"], "records": [{"v": 2}, {"v": 3}]},
                "bounds": [1],
                "curve": {"x": [1], "y": [1]}
            },
            "train": {"loss": 0.125, "prediction": [4.0, 5.0]}
        }))
    }

    #[test]
    fn forecast_continues_preprocessing_plot() {
        let mut surface = HeadlessSurface::new();
        let report = RestoreController::default().restore_snapshot(&mut surface, &full_snapshot());
        assert_eq!(report.failures(), 0);

        let forecast = &surface.charts[ids::FORECAST_PLOT];
        assert_eq!(forecast.series_names(), vec!["v", "Forecast"]);
        assert_eq!(forecast.series[0].y, vec![Some(2.0), Some(3.0)]);
        let future: Vec<u64> = forecast.series[1].x.iter().filter_map(|x| x.as_index()).collect();
        assert_eq!(future, vec![2, 3]);
        assert_eq!(surface.texts[ids::TRAIN_INFO], "Loss: 0.125000");
    }

    #[test]
    fn forecast_falls_back_to_main_plot() {
        let mut snap = full_snapshot();
        snap.preprocess = None;
        let mut surface = HeadlessSurface::new();
        RestoreController::default().restore_snapshot(&mut surface, &snap);
        let forecast = &surface.charts[ids::FORECAST_PLOT];
        assert_eq!(forecast.series[0].len(), 3);
    }

    #[test]
    fn missing_target_fails_only_its_stage() {
        let mut surface = HeadlessSurface::new().without(ids::PREVIEW_TABLE);
        let report = RestoreController::default().restore_snapshot(&mut surface, &full_snapshot());
        assert!(matches!(
            report.outcome(RestoreStage::Preview),
            Some(StageOutcome::Failed(_))
        ));
        assert_eq!(report.outcome(RestoreStage::Train), Some(&StageOutcome::Rendered));
        assert!(surface.charts.contains_key(ids::MAIN_PLOT));
        assert!(surface.progress.is_some());
    }

    #[test]
    fn empty_page_only_shows_progress() {
        let mut surface = HeadlessSurface::new();
        let snap = RestoreController::default().restore(&mut surface, "not json at all");
        assert!(snap.is_empty());
        assert!(surface.charts.is_empty());
        assert_eq!(surface.progress.and_then(|p| p.active_step), Some(0));
    }

    #[test]
    fn restore_is_idempotent() {
        let controller = RestoreController::default();
        let mut once = HeadlessSurface::new();
        controller.restore_snapshot(&mut once, &full_snapshot());
        let mut twice = once.clone();
        controller.restore_snapshot(&mut twice, &full_snapshot());
        assert_eq!(once.charts, twice.charts);
        assert_eq!(once.tables, twice.tables);
    }

    fn snapshot_without_preview() -> SessionSnapshot {
        let mut snap = full_snapshot();
        snap.preview = None;
        snap.preprocess = None;
        snap
    }

    /// Selection controls exist only after the selectors were built.
    struct ControlsOnDemand(HeadlessSurface);

    impl Surface for ControlsOnDemand {
        fn render_table(&mut self, element_id: &str, table: &TableView) -> Result<()> {
            self.0.render_table(element_id, table)
        }
        fn render_selectors(&mut self, controls: &SelectorControls) -> Result<()> {
            self.0.render_selectors(controls)
        }
        fn apply_selection(
            &mut self,
            selection: &crate::models::SelectionState,
            time: Option<&crate::models::TimeSpec>,
        ) -> Result<()> {
            if self.0.selectors.is_none() {
                return Err(crate::error::TsprepError::MissingTarget("target".into()));
            }
            self.0.apply_selection(selection, time)
        }
        fn draw_chart(&mut self, element_id: &str, chart: &Chart) -> Result<()> {
            self.0.draw_chart(element_id, chart)
        }
        fn drawn_chart(&self, element_id: &str) -> Option<&Chart> {
            self.0.drawn_chart(element_id)
        }
        fn set_text(&mut self, element_id: &str, text: &str) -> Result<()> {
            self.0.set_text(element_id, text)
        }
        fn append_log(&mut self, line: &str) -> Result<()> {
            self.0.append_log(line)
        }
        fn notify(&mut self, message: &str) {
            self.0.notify(message)
        }
        fn show_progress(&mut self, progress: &WorkflowProgress) -> Result<()> {
            self.0.show_progress(progress)
        }
    }

    #[test]
    fn main_plot_drawn_before_controls_are_restored() {
        let mut surface = ControlsOnDemand(HeadlessSurface::new());
        let report =
            RestoreController::default().restore_snapshot(&mut surface, &snapshot_without_preview());
        assert_eq!(report.outcome(RestoreStage::Preview), Some(&StageOutcome::Skipped));
        assert!(surface.0.charts.contains_key(ids::MAIN_PLOT));

        let forecast = &surface.0.charts[ids::FORECAST_PLOT];
        assert_eq!(forecast.series_names(), vec!["v", "Forecast"]);
        assert_eq!(forecast.series[0].len(), 3);
    }

    #[test]
    fn page_without_selectors_still_restores_selection_stage() {
        let mut surface = HeadlessSurface::new().without(ids::SELECTORS);
        let report =
            RestoreController::default().restore_snapshot(&mut surface, &snapshot_without_preview());
        assert_eq!(report.outcome(RestoreStage::Selection), Some(&StageOutcome::Rendered));
        assert_eq!(report.failures(), 0);
        assert!(surface.selection.is_none());
        assert_eq!(surface.charts[ids::MAIN_PLOT].series_names(), vec!["v"]);
        assert_eq!(surface.charts[ids::FORECAST_PLOT].series[0].len(), 3);
    }

    #[test]
    fn selected_table_is_bounded() {
        let records: Vec<serde_json::Value> = (0..20).map(|i| json!({"v": i})).collect();
        let snap = SessionSnapshot::from_value(json!({
            "sample": {"columns": ["v"], "records": records}
        }));
        let mut surface = HeadlessSurface::new();
        RestoreController::default().restore_snapshot(&mut surface, &snap);
        assert_eq!(surface.tables[ids::SELECTED_TABLE].rows.len(), 5);
        assert_eq!(surface.charts[ids::MAIN_PLOT].series.len(), 0);
    }
}
