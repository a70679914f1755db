//! The five user actions, driven end to end.
//!
//! Each action posts to the API through a [`Transport`], merges the parsed response
//! into the [`SessionStore`] and redraws the matching restore stage. The surface is
//! only borrowed between awaits, never across one.

use std::cell::{Ref, RefCell};

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{
    ApiOutcome, Endpoint, ForecastRequest, ForecastResponse, PreprocessRequest, SelectRequest,
    SelectResponse, Transport, TrainRequest, UploadResponse,
};
use crate::config::ClientConfig;
use crate::error::{Result, TsprepError};
use crate::models::{PreprocessState, TimeSpec, TrainParams, TrainState};
use crate::restore::{RestoreController, RestoreStage};
use crate::snapshot::{SessionSnapshot, SessionStore};
use crate::surface::Surface;

pub struct Workflow<T, S> {
    config: ClientConfig,
    project_id: String,
    store: SessionStore,
    surface: RefCell<S>,
    transport: T,
    restorer: RestoreController,
}

impl<T: Transport, S: Surface> Workflow<T, S> {
    /// A workflow over an empty session.
    pub fn new(config: ClientConfig, project_id: impl Into<String>, transport: T, surface: S) -> Self {
        let restorer = RestoreController::new(&config);
        Self {
            config,
            project_id: project_id.into(),
            store: SessionStore::default(),
            surface: RefCell::new(surface),
            transport,
            restorer,
        }
    }

    /// Restore the page from the embedded snapshot and seed the store with it.
    pub fn boot(
        config: ClientConfig,
        project_id: impl Into<String>,
        transport: T,
        mut surface: S,
        serialized: &str,
    ) -> Self {
        let restorer = RestoreController::new(&config);
        let snapshot = restorer.restore(&mut surface, serialized);
        Self {
            config,
            project_id: project_id.into(),
            store: SessionStore::new(snapshot),
            surface: RefCell::new(surface),
            transport,
            restorer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    pub fn into_surface(self) -> S {
        self.surface.into_inner()
    }

    // ─── Actions ─────────────────────────────────────────────────────────────

    /// Record the body the upload form got back.
    pub fn record_upload(&self, body: &str) -> Result<SessionSnapshot> {
        let response = ApiOutcome::<UploadResponse>::parse(body).into_result(Endpoint::Upload);
        let response = self.settle(response)?;
        let snapshot = self.store.merge(SessionSnapshot {
            preview: response.preview,
            ..Default::default()
        });
        self.redraw(RestoreStage::Preview, &snapshot);
        Ok(snapshot)
    }

    pub async fn apply_selection(
        &self,
        target: &str,
        features: Vec<String>,
        time: TimeSpec,
    ) -> Result<SessionSnapshot> {
        if target.is_empty() {
            return self.settle(Err(TsprepError::NoTarget));
        }
        let request = SelectRequest {
            target: target.to_string(),
            features,
            time,
        };
        let response: SelectResponse = self.call(Endpoint::Select, &request).await?;
        let snapshot = self.store.merge(SessionSnapshot {
            selection: Some(request.selection()),
            time: Some(response.time.unwrap_or(request.time)),
            sample: Some(response.data),
            ..Default::default()
        });
        self.redraw(RestoreStage::Selection, &snapshot);
        Ok(snapshot)
    }

    pub async fn run_preprocess(&self, method: &str) -> Result<SessionSnapshot> {
        let target = self.require_target()?;
        let request = PreprocessRequest {
            target,
            method: method.to_string(),
        };
        let state: PreprocessState = self.call(Endpoint::Preprocess, &request).await?;
        let snapshot = self.store.merge(SessionSnapshot {
            preprocess: Some(state),
            ..Default::default()
        });
        self.redraw(RestoreStage::Preprocess, &snapshot);
        Ok(snapshot)
    }

    pub async fn run_train(&self, params: TrainParams) -> Result<SessionSnapshot> {
        let target = self.require_target()?;
        let request = TrainRequest { target, params };
        let mut state: TrainState = self.call(Endpoint::Train, &request).await?;
        if state.cfg.is_none() {
            state.cfg = Some(request.params);
        }
        let summary = state.summary();
        let snapshot = self.store.merge(SessionSnapshot {
            train: Some(state),
            ..Default::default()
        });
        self.redraw(RestoreStage::Train, &snapshot);
        if let Some(line) = summary {
            self.log(&format!("training finished. {line}"));
        }
        Ok(snapshot)
    }

    /// Extend the trained model's prediction. The stored loss and config survive.
    pub async fn run_forecast(&self, steps: u32, context: Option<u32>) -> Result<SessionSnapshot> {
        let target = self.require_target()?;
        let request = ForecastRequest {
            target,
            steps,
            context,
        };
        let response: ForecastResponse = self.call(Endpoint::Forecast, &request).await?;
        let points = response.prediction.len();

        // read after the await: a train merged meanwhile must not be lost
        let current = self.store.read(|s| s.train.clone()).unwrap_or_default();
        let snapshot = self.store.merge(SessionSnapshot {
            train: Some(TrainState {
                prediction: response.prediction,
                x: response.x,
                ..current
            }),
            ..Default::default()
        });
        self.redraw(RestoreStage::Train, &snapshot);
        self.log(&format!("forecast: {points} steps"));
        Ok(snapshot)
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    async fn call<B: Serialize, R: DeserializeOwned>(&self, endpoint: Endpoint, body: &B) -> Result<R> {
        let url = self.config.endpoint(&self.project_id, endpoint.action());
        let body = serde_json::to_value(body)?;
        info!(%endpoint, %url, "request sent");
        let result = match self.transport.post_json(&url, &body).await {
            Ok(text) => ApiOutcome::<R>::parse(&text).into_result(endpoint),
            Err(e) => Err(e),
        };
        self.settle(result)
    }

    fn require_target(&self) -> Result<String> {
        match self.store.read(|s| s.target().map(str::to_string)) {
            Some(target) => Ok(target),
            None => self.settle(Err(TsprepError::NoTarget)),
        }
    }

    /// Surface a failure to the user before handing it back.
    fn settle<R>(&self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// Notify the user of `error` and append it to the workflow log.
    pub fn report(&self, error: &TsprepError) {
        warn!("action failed: {}", error);
        let message = error.to_string();
        self.surface.borrow_mut().notify(&message);
        self.log(&message);
    }

    fn log(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        if let Err(e) = self.surface.borrow_mut().append_log(&line) {
            warn!("workflow log unavailable: {}", e);
        }
    }

    /// Redraw `stage` and the progress indicator from the freshly merged snapshot.
    fn redraw(&self, stage: RestoreStage, snapshot: &SessionSnapshot) {
        let mut surface = self.surface.borrow_mut();
        self.restorer.run_stage(stage, &mut *surface, snapshot);
        self.restorer
            .run_stage(RestoreStage::Progress, &mut *surface, snapshot);
    }
}
