//! DOM-backed [`Surface`] for the project page.

use std::collections::HashMap;

use leptos::prelude::{RwSignal, Set};
use tsprep_core::chart::Chart;
use tsprep_core::models::{SelectionState, TimeKind, TimeSpec, TrainParams};
use tsprep_core::surface::{ids, SelectorControls, Surface, TableView};
use tsprep_core::{Result, TsprepError, WorkflowProgress};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlInputElement, HtmlSelectElement};

use crate::plot;

/// Control ids created by [`DomSurface::render_selectors`] or shipped with the page.
pub mod controls {
    pub const TARGET: &str = "target";
    pub const TIME_COLUMN: &str = "time_col";
    pub const TIME_KIND: &str = "time_kind";
    pub const TIME_FORMAT: &str = "time_fmt";
    pub const FEATURE_NAME: &str = "feat";
    pub const APPLY: &str = "apply_sel";
    pub const PP_METHOD: &str = "pp_method";
    pub const MODEL: &str = "mdl";
    pub const WINDOW: &str = "win";
    pub const HORIZON: &str = "hor";
    pub const EPOCHS: &str = "ep";
    pub const FORECAST_STEPS: &str = "fc_steps";
}

fn js_err(e: JsValue) -> TsprepError {
    TsprepError::Other(format!("{e:?}"))
}

pub struct DomSurface {
    document: Document,
    charts: HashMap<String, Chart>,
    progress: RwSignal<WorkflowProgress>,
}

impl DomSurface {
    pub fn new(document: Document, progress: RwSignal<WorkflowProgress>) -> Self {
        Self {
            document,
            charts: HashMap::new(),
            progress,
        }
    }

    fn element(&self, id: &str) -> Result<Element> {
        self.document
            .get_element_by_id(id)
            .ok_or_else(|| TsprepError::MissingTarget(id.to_string()))
    }

    fn create(&self, tag: &str) -> Result<Element> {
        self.document.create_element(tag).map_err(js_err)
    }

    fn text_node(&self, tag: &str, text: &str) -> Result<Element> {
        let el = self.create(tag)?;
        el.set_text_content(Some(text));
        Ok(el)
    }

    fn select(&self, id: &str, options: &[(String, String)]) -> Result<Element> {
        let select = self.create("select")?;
        select.set_id(id);
        for (value, label) in options {
            let option = self.text_node("option", label)?;
            option.set_attribute("value", value).map_err(js_err)?;
            select.append_child(&option).map_err(js_err)?;
        }
        Ok(select)
    }

    fn labelled(&self, title: &str, control: &Element) -> Result<Element> {
        let wrap = self.create("div")?;
        let heading = self.text_node("div", title)?;
        heading.set_class_name("control-title");
        wrap.append_child(&heading).map_err(js_err)?;
        wrap.append_child(control).map_err(js_err)?;
        Ok(wrap)
    }
}

impl Surface for DomSurface {
    fn render_table(&mut self, element_id: &str, table: &TableView) -> Result<()> {
        let host = self.element(element_id)?;
        host.set_inner_html("");

        let el = self.create("table")?;
        let head = self.create("tr")?;
        for c in &table.columns {
            head.append_child(&self.text_node("th", c)?).map_err(js_err)?;
        }
        let thead = self.create("thead")?;
        thead.append_child(&head).map_err(js_err)?;
        el.append_child(&thead).map_err(js_err)?;

        let tbody = self.create("tbody")?;
        for row in &table.rows {
            let tr = self.create("tr")?;
            for cell in row {
                tr.append_child(&self.text_node("td", cell)?).map_err(js_err)?;
            }
            tbody.append_child(&tr).map_err(js_err)?;
        }
        el.append_child(&tbody).map_err(js_err)?;
        host.append_child(&el).map_err(js_err)?;
        Ok(())
    }

    fn render_selectors(&mut self, selectors: &SelectorControls) -> Result<()> {
        let host = self.element(ids::SELECTORS)?;
        host.set_inner_html("");

        let columns: Vec<(String, String)> = selectors
            .columns
            .iter()
            .map(|c| (c.clone(), c.clone()))
            .collect();
        let target = self.select(controls::TARGET, &columns)?;
        host.append_child(&self.labelled("Target", &target)?)
            .map_err(js_err)?;

        let mut time_columns = vec![(String::new(), "Row index".to_string())];
        time_columns.extend(columns.iter().cloned());
        let time_column = self.select(controls::TIME_COLUMN, &time_columns)?;
        host.append_child(&self.labelled("Time column", &time_column)?)
            .map_err(js_err)?;

        let kinds: Vec<(String, String)> = selectors
            .time_kinds
            .iter()
            .map(|k| (k.as_str().to_string(), k.label().to_string()))
            .collect();
        let kind = self.select(controls::TIME_KIND, &kinds)?;
        host.append_child(&self.labelled("Time kind", &kind)?)
            .map_err(js_err)?;

        let format = self.create("input")?;
        format.set_id(controls::TIME_FORMAT);
        format
            .set_attribute("placeholder", "%Y-%m-%d %H:%M")
            .map_err(js_err)?;
        host.append_child(&self.labelled("Time format", &format)?)
            .map_err(js_err)?;

        let features = self.create("div")?;
        for c in &selectors.columns {
            let label = self.create("label")?;
            let checkbox = self.create("input")?;
            checkbox.set_attribute("type", "checkbox").map_err(js_err)?;
            checkbox
                .set_attribute("name", controls::FEATURE_NAME)
                .map_err(js_err)?;
            checkbox.set_attribute("value", c).map_err(js_err)?;
            label.append_child(&checkbox).map_err(js_err)?;
            label
                .append_with_str_1(&format!(" {c}"))
                .map_err(js_err)?;
            features.append_child(&label).map_err(js_err)?;
        }
        host.append_child(&self.labelled("Features", &features)?)
            .map_err(js_err)?;

        let apply = self.text_node("button", "Apply")?;
        apply.set_id(controls::APPLY);
        apply.set_class_name("btn primary");
        apply.set_attribute("type", "button").map_err(js_err)?;
        host.append_child(&apply).map_err(js_err)?;
        Ok(())
    }

    fn apply_selection(&mut self, selection: &SelectionState, time: Option<&TimeSpec>) -> Result<()> {
        let control = |id: &str| self.document.get_element_by_id(id);
        if let (Some(target), Some(el)) = (selection.target(), control(controls::TARGET)) {
            set_value(&el, target);
        }
        let boxes = self
            .document
            .get_elements_by_name(controls::FEATURE_NAME);
        for i in 0..boxes.length() {
            if let Some(input) = boxes.item(i).and_then(|n| n.dyn_into::<HtmlInputElement>().ok()) {
                input.set_checked(selection.features.contains(&input.value()));
            }
        }
        if let Some(time) = time {
            if let Some(el) = control(controls::TIME_COLUMN) {
                set_value(&el, time.column.as_deref().unwrap_or(""));
            }
            if let Some(el) = control(controls::TIME_KIND) {
                set_value(&el, time.kind.as_str());
            }
            if let Some(el) = control(controls::TIME_FORMAT) {
                set_value(&el, time.format.as_deref().unwrap_or(""));
            }
        }
        Ok(())
    }

    fn draw_chart(&mut self, element_id: &str, chart: &Chart) -> Result<()> {
        let root = self.element(element_id)?;
        plot::draw(&root, chart).map_err(TsprepError::Other)?;
        self.charts.insert(element_id.to_string(), chart.clone());
        Ok(())
    }

    fn drawn_chart(&self, element_id: &str) -> Option<&Chart> {
        self.charts.get(element_id)
    }

    fn set_text(&mut self, element_id: &str, text: &str) -> Result<()> {
        self.element(element_id)?.set_text_content(Some(text));
        Ok(())
    }

    fn append_log(&mut self, line: &str) -> Result<()> {
        let host = self.element(ids::TRAIN_LOG)?;
        let entry = self.text_node("div", line)?;
        host.append_child(&entry).map_err(js_err)?;
        Ok(())
    }

    fn notify(&mut self, message: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }

    fn show_progress(&mut self, progress: &WorkflowProgress) -> Result<()> {
        self.element(ids::STEPS)?;
        self.progress.set(*progress);
        Ok(())
    }
}

fn set_value(el: &Element, value: &str) {
    if let Some(select) = el.dyn_ref::<HtmlSelectElement>() {
        select.set_value(value);
    } else if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
        input.set_value(value);
    }
}

fn value_of(document: &Document, id: &str) -> Option<String> {
    let el = document.get_element_by_id(id)?;
    if let Some(select) = el.dyn_ref::<HtmlSelectElement>() {
        return Some(select.value());
    }
    el.dyn_ref::<HtmlInputElement>().map(|i| i.value())
}

fn number_of(document: &Document, id: &str, default: u32) -> u32 {
    value_of(document, id)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ─── Reading controls ─────────────────────────────────────────────────────────

/// Target, checked features (in page order) and the time spec from the selection controls.
pub fn read_selection(document: &Document) -> (String, Vec<String>, TimeSpec) {
    let target = value_of(document, controls::TARGET).unwrap_or_default();

    let boxes = document.get_elements_by_name(controls::FEATURE_NAME);
    let features = (0..boxes.length())
        .filter_map(|i| boxes.item(i))
        .filter_map(|n| n.dyn_into::<HtmlInputElement>().ok())
        .filter(|i| i.checked())
        .map(|i| i.value())
        .collect();

    let column = value_of(document, controls::TIME_COLUMN).filter(|c| !c.is_empty());
    let kind = value_of(document, controls::TIME_KIND)
        .and_then(|k| k.parse::<TimeKind>().ok())
        .unwrap_or_default();
    let format = value_of(document, controls::TIME_FORMAT).filter(|f| !f.is_empty());
    (target, features, TimeSpec { column, kind, format })
}

pub fn read_method(document: &Document, default: &str) -> String {
    value_of(document, controls::PP_METHOD)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Training form values; blank or invalid fields fall back to `defaults`.
pub fn read_train_params(document: &Document, defaults: &TrainParams) -> TrainParams {
    TrainParams {
        model: value_of(document, controls::MODEL)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| defaults.model.clone()),
        window: number_of(document, controls::WINDOW, defaults.window),
        horizon: number_of(document, controls::HORIZON, defaults.horizon),
        epochs: number_of(document, controls::EPOCHS, defaults.epochs),
        ..defaults.clone()
    }
}

pub fn read_forecast_steps(document: &Document, default: u32) -> u32 {
    number_of(document, controls::FORECAST_STEPS, default)
}
