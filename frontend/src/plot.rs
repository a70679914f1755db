use plotly::common::{Font, Mode};
use plotly::{Layout, Plot, Scatter};
use serde_json::{json, Value};
use tsprep_core::chart::{Chart, Marker, TraceMode};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Plotly, js_name = newPlot)]
    fn new_plot(root: &JsValue, data: &JsValue, layout: &JsValue, config: &JsValue);

    #[wasm_bindgen(js_namespace = Plotly, js_name = purge)]
    fn purge(root: &JsValue);
}

fn to_plot(chart: &Chart) -> Plot {
    let mut p = Plot::new();
    p.set_layout(
        Layout::new()
            .paper_background_color(chart.style.paper_bgcolor.clone())
            .plot_background_color(chart.style.plot_bgcolor.clone())
            .font(Font::new().color(chart.style.font_color.clone())),
    );
    for s in &chart.series {
        let mode = match s.mode {
            TraceMode::Lines => Mode::Lines,
            TraceMode::LinesMarkers => Mode::LinesMarkers,
        };
        p.add_trace(
            Scatter::new(s.x.clone(), s.y.clone())
                .name(s.name.as_str())
                .mode(mode),
        );
    }
    p
}

fn shape(m: &Marker) -> Value {
    json!({
        "type": "line",
        "x0": m.x.to_json(),
        "x1": m.x.to_json(),
        "y0": m.y0,
        "y1": m.y1,
        "line": {"color": m.color, "dash": m.dash},
    })
}

/// Plot payload with boundary markers attached as layout shapes.
fn to_document(chart: &Chart) -> Result<Value, String> {
    let mut doc: Value = serde_json::from_str(&to_plot(chart).to_json()).map_err(|e| e.to_string())?;
    if !chart.markers.is_empty() {
        let shapes = Value::Array(chart.markers.iter().map(shape).collect());
        match doc.get_mut("layout").and_then(Value::as_object_mut) {
            Some(layout) => {
                layout.insert("shapes".to_string(), shapes);
            }
            None => return Err("plot payload has no layout".to_string()),
        }
    }
    Ok(doc)
}

/// Replace whatever Plotly chart is bound to `root` with `chart`.
pub fn draw(root: &web_sys::Element, chart: &Chart) -> Result<(), String> {
    let doc = to_document(chart)?;
    let js_value = js_sys::JSON::parse(&doc.to_string()).map_err(|_| "Failed to parse Plotly JSON".to_string())?;
    let data = js_sys::Reflect::get(&js_value, &"data".into()).unwrap_or(JsValue::UNDEFINED);
    let layout = js_sys::Reflect::get(&js_value, &"layout".into()).unwrap_or(JsValue::UNDEFINED);
    let config = js_sys::Reflect::get(&js_value, &"config".into()).unwrap_or(JsValue::UNDEFINED);

    let root: &JsValue = root.as_ref();
    purge(root);
    new_plot(root, &data, &layout, &config);
    Ok(())
}
