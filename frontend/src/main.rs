//! Browser entry point for the tsprep project page.
//!
//! The server renders the page with an embedded snapshot; this client restores it,
//! mounts the step indicator and binds the workflow buttons.

#[cfg(target_arch = "wasm32")]
mod bind;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod plot;
#[cfg(target_arch = "wasm32")]
mod steps;
#[cfg(target_arch = "wasm32")]
mod transport;

#[cfg(target_arch = "wasm32")]
fn main() {
    use std::rc::Rc;

    use leptos::prelude::*;
    use tsprep_core::{ClientConfig, SessionSnapshot, Workflow, WorkflowProgress};
    use wasm_bindgen::JsCast;

    let debug_enabled = web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|s| s.get_item("debug_enabled").ok().flatten())
        .as_deref()
        == Some("true");
    let level = if debug_enabled {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    let _ = console_log::init_with_level(level);
    console_error_panic_hook::set_once();

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        log::error!("no document to attach to");
        return;
    };

    // optional page-level overrides: <script id="tsprep-config" type="application/yaml">
    let config = document
        .get_element_by_id("tsprep-config")
        .and_then(|el| el.text_content())
        .map(|text| {
            ClientConfig::from_yaml(&text).unwrap_or_else(|e| {
                log::warn!("ignoring page config: {e}");
                ClientConfig::default()
            })
        })
        .unwrap_or_default();
    let project_id = document
        .get_element_by_id("app-root")
        .and_then(|el| el.get_attribute("data-project-id"))
        .unwrap_or_default();
    let serialized = document
        .get_element_by_id(&config.snapshot_element)
        .and_then(|el| el.text_content())
        .unwrap_or_default();

    let progress = RwSignal::new(WorkflowProgress::derive(&SessionSnapshot::default()));
    if let Some(host) = document
        .get_element_by_id(tsprep_core::surface::ids::STEPS)
        .and_then(|el| el.dyn_into::<web_sys::HtmlElement>().ok())
    {
        host.set_inner_html("");
        leptos::mount::mount_to(host, move || view! { <steps::StepList progress=progress /> })
            .forget();
    }

    let surface = dom::DomSurface::new(document.clone(), progress);
    let app = Rc::new(Workflow::boot(
        config,
        project_id,
        transport::GlooTransport,
        surface,
        &serialized,
    ));
    bind::bind_all(&document, app);
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("tsprep-frontend runs in the browser; build it for wasm32-unknown-unknown (e.g. with trunk)");
}
