//! The render boundary: every widget the workflow touches, behind one trait.
//!
//! A browser implementation maps each method onto DOM elements and the charting
//! library; [`HeadlessSurface`] records the calls instead, which is what the CLI
//! and the tests use.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::chart::Chart;
use crate::error::{Result, TsprepError};
use crate::models::{scalar_as_text, Record, SelectionState, TimeKind, TimeSpec};
use crate::progress::WorkflowProgress;

/// Element ids of the project page.
pub mod ids {
    pub const PREVIEW_TABLE: &str = "preview-table";
    pub const SELECTORS: &str = "selectors";
    pub const SELECTED_TABLE: &str = "selected-table";
    pub const MAIN_PLOT: &str = "plot";
    pub const PREPROCESS_PLOT: &str = "pp_plot";
    pub const PREPROCESS_CURVE: &str = "pp_curve";
    pub const FORECAST_PLOT: &str = "forecast_plot";
    pub const TRAIN_INFO: &str = "train_info";
    pub const TRAIN_LOG: &str = "train_log";
    pub const STEPS: &str = "steps";
}

/// A table ready for display: header plus text cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    /// Render `records` against `columns`; a missing key renders as an empty cell.
    pub fn from_records(columns: &[String], records: &[Record]) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).map(scalar_as_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self {
            columns: columns.to_vec(),
            rows,
        }
    }
}

/// Options for the column-selection controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorControls {
    /// Offered as target, time column and feature checkboxes.
    pub columns: Vec<String>,
    pub time_kinds: Vec<TimeKind>,
}

impl SelectorControls {
    pub fn for_columns(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            time_kinds: TimeKind::ALL.to_vec(),
        }
    }
}

pub trait Surface {
    fn render_table(&mut self, element_id: &str, table: &TableView) -> Result<()>;

    /// (Re)build target, time-column, time-kind and feature controls.
    fn render_selectors(&mut self, controls: &SelectorControls) -> Result<()>;

    /// Set the controls to a stored selection: target, checked features, time fields.
    /// Controls not on the page are left alone.
    fn apply_selection(&mut self, selection: &SelectionState, time: Option<&TimeSpec>)
        -> Result<()>;

    /// Replace whatever chart is bound to `element_id`.
    fn draw_chart(&mut self, element_id: &str, chart: &Chart) -> Result<()>;

    /// The chart currently drawn on `element_id`, if any.
    fn drawn_chart(&self, element_id: &str) -> Option<&Chart>;

    fn set_text(&mut self, element_id: &str, text: &str) -> Result<()>;

    fn append_log(&mut self, line: &str) -> Result<()>;

    /// Blocking user notification.
    fn notify(&mut self, message: &str);

    fn show_progress(&mut self, progress: &WorkflowProgress) -> Result<()>;
}

/// Records every call; elements can be marked missing to simulate a partial page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeadlessSurface {
    pub tables: BTreeMap<String, TableView>,
    pub selectors: Option<SelectorControls>,
    pub selection: Option<SelectionState>,
    pub time: Option<TimeSpec>,
    pub charts: BTreeMap<String, Chart>,
    pub texts: BTreeMap<String, String>,
    pub log: Vec<String>,
    pub notifications: Vec<String>,
    pub progress: Option<WorkflowProgress>,
    #[serde(skip)]
    missing: HashSet<String>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `element_id` as absent from the page.
    pub fn without(mut self, element_id: &str) -> Self {
        self.missing.insert(element_id.to_string());
        self
    }

    fn check(&self, element_id: &str) -> Result<()> {
        if self.missing.contains(element_id) {
            return Err(TsprepError::MissingTarget(element_id.to_string()));
        }
        Ok(())
    }
}

impl Surface for HeadlessSurface {
    fn render_table(&mut self, element_id: &str, table: &TableView) -> Result<()> {
        self.check(element_id)?;
        self.tables.insert(element_id.to_string(), table.clone());
        Ok(())
    }

    fn render_selectors(&mut self, controls: &SelectorControls) -> Result<()> {
        self.check(ids::SELECTORS)?;
        self.selectors = Some(controls.clone());
        self.selection = None;
        self.time = None;
        Ok(())
    }

    fn apply_selection(
        &mut self,
        selection: &SelectionState,
        time: Option<&TimeSpec>,
    ) -> Result<()> {
        if self.missing.contains(ids::SELECTORS) {
            return Ok(());
        }
        self.selection = Some(selection.clone());
        if let Some(t) = time {
            self.time = Some(t.clone());
        }
        Ok(())
    }

    fn draw_chart(&mut self, element_id: &str, chart: &Chart) -> Result<()> {
        self.check(element_id)?;
        self.charts.insert(element_id.to_string(), chart.clone());
        Ok(())
    }

    fn drawn_chart(&self, element_id: &str) -> Option<&Chart> {
        self.charts.get(element_id)
    }

    fn set_text(&mut self, element_id: &str, text: &str) -> Result<()> {
        self.check(element_id)?;
        self.texts.insert(element_id.to_string(), text.to_string());
        Ok(())
    }

    fn append_log(&mut self, line: &str) -> Result<()> {
        self.check(ids::TRAIN_LOG)?;
        self.log.push(line.to_string());
        Ok(())
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }

    fn show_progress(&mut self, progress: &WorkflowProgress) -> Result<()> {
        self.check(ids::STEPS)?;
        self.progress = Some(*progress);
        Ok(())
    }
}
