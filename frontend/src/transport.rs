use gloo_net::http::Request;
use serde_json::Value;
use tsprep_core::{Result, Transport, TsprepError};
use web_sys::FormData;

fn transport_err(e: gloo_net::Error) -> TsprepError {
    TsprepError::Transport(e.to_string())
}

/// `fetch`-backed transport. Non-2xx bodies are returned as-is so the API
/// boundary can read their `error` field.
pub struct GlooTransport;

impl GlooTransport {
    /// Submit the upload form and return the raw response body.
    pub async fn post_form(&self, url: &str, form: FormData) -> Result<String> {
        let resp = Request::post(url)
            .body(form)
            .map_err(transport_err)?
            .send()
            .await
            .map_err(transport_err)?;
        if !resp.ok() {
            log::warn!("upload returned {}", resp.status());
        }
        resp.text().await.map_err(transport_err)
    }
}

impl Transport for GlooTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<String> {
        let resp = Request::post(url)
            .json(body)
            .map_err(transport_err)?
            .send()
            .await
            .map_err(transport_err)?;
        if !resp.ok() {
            log::debug!("{} returned {}", url, resp.status());
        }
        resp.text().await.map_err(transport_err)
    }
}
