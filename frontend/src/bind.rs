//! Page event wiring. Every handler spawns the matching workflow action.

use std::rc::Rc;

use leptos::task::spawn_local;
use tsprep_core::Workflow;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, DragEvent, Event, FormData, HtmlFormElement, HtmlInputElement};

use crate::dom::{self, controls, DomSurface};
use crate::transport::GlooTransport;

pub type App = Rc<Workflow<GlooTransport, DomSurface>>;

fn on(document: &Document, id: &str, event: &str, handler: impl FnMut(Event) + 'static) {
    let Some(el) = document.get_element_by_id(id) else {
        log::debug!("#{id} not on page, {event} not bound");
        return;
    };
    let callback = Closure::<dyn FnMut(Event)>::new(handler);
    if el
        .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
        .is_err()
    {
        log::warn!("failed to bind {event} on #{id}");
    }
    // listeners live as long as the page
    callback.forget();
}

pub fn bind_all(document: &Document, app: App) {
    bind_upload(document, app.clone());

    // the apply button is recreated with the selectors, so listen on the container
    let (doc, a) = (document.clone(), app.clone());
    on(document, tsprep_core::surface::ids::SELECTORS, "click", move |ev| {
        let is_apply = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .is_some_and(|el| el.id() == controls::APPLY);
        if !is_apply {
            return;
        }
        let (target, features, time) = dom::read_selection(&doc);
        let app = a.clone();
        spawn_local(async move {
            let _ = app.apply_selection(&target, features, time).await;
        });
    });

    let (doc, a) = (document.clone(), app.clone());
    on(document, "pp_run", "click", move |_| {
        let method = dom::read_method(&doc, &a.config().preprocess_method);
        let app = a.clone();
        spawn_local(async move {
            let _ = app.run_preprocess(&method).await;
        });
    });

    let (doc, a) = (document.clone(), app.clone());
    on(document, "train_run", "click", move |_| {
        let params = dom::read_train_params(&doc, &a.config().train);
        let app = a.clone();
        spawn_local(async move {
            let _ = app.run_train(params).await;
        });
    });

    let (doc, a) = (document.clone(), app);
    on(document, "forecast_run", "click", move |_| {
        let steps = dom::read_forecast_steps(&doc, a.config().forecast_steps);
        let app = a.clone();
        spawn_local(async move {
            let _ = app.run_forecast(steps, None).await;
        });
    });

    on(document, "export_pdf", "click", |_| {
        if let Some(window) = web_sys::window() {
            let _ = window.print();
        }
    });
}

fn bind_upload(document: &Document, app: App) {
    on(document, "upload-form", "submit", move |ev| {
        ev.prevent_default();
        let Some(form) = ev.target().and_then(|t| t.dyn_into::<HtmlFormElement>().ok()) else {
            return;
        };
        let data = match FormData::new_with_form(&form) {
            Ok(d) => d,
            Err(e) => {
                log::error!("cannot read upload form: {e:?}");
                return;
            }
        };
        let action = form.action();
        let app = app.clone();
        spawn_local(async move {
            match GlooTransport.post_form(&action, data).await {
                Ok(body) => {
                    let _ = app.record_upload(&body);
                }
                Err(e) => app.report(&e),
            }
        });
    });

    let doc = document.clone();
    on(document, "dropzone", "drop", move |ev| {
        ev.prevent_default();
        let files = ev
            .dyn_ref::<DragEvent>()
            .and_then(|d| d.data_transfer())
            .and_then(|dt| dt.files());
        let input = doc
            .get_element_by_id("file")
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
        if let (Some(files), Some(input)) = (files, input) {
            input.set_files(Some(&files));
        }
    });
    on(document, "dropzone", "dragover", |ev| ev.prevent_default());
}
