//! Integration tests for tsprep-core.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tsprep_core::models::TrainState;
use tsprep_core::surface::ids;
use tsprep_core::{
    storage, ClientConfig, HeadlessSurface, RestoreController, Result, SessionSnapshot, TimeKind,
    TimeSpec, TrainParams, Transport, TsprepError, Workflow, WorkflowStep,
};

// ─── Scripted transport ──────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    responses: RefCell<VecDeque<Result<String>>>,
    calls: RefCell<Vec<(String, Value)>>,
    /// Runs once while the next request is in flight.
    in_flight: RefCell<Option<Box<dyn FnOnce()>>>,
}

#[derive(Clone, Default)]
struct FakeTransport {
    script: Rc<Script>,
}

impl FakeTransport {
    fn respond(&self, body: Value) -> &Self {
        self.script
            .responses
            .borrow_mut()
            .push_back(Ok(body.to_string()));
        self
    }

    fn fail(&self, error: TsprepError) -> &Self {
        self.script.responses.borrow_mut().push_back(Err(error));
        self
    }

    fn while_in_flight(&self, f: impl FnOnce() + 'static) {
        *self.script.in_flight.borrow_mut() = Some(Box::new(f));
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.script.calls.borrow().clone()
    }
}

impl Transport for FakeTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<String> {
        self.script
            .calls
            .borrow_mut()
            .push((url.to_string(), body.clone()));
        let hook = self.script.in_flight.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
        self.script
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TsprepError::Transport("no scripted response".into())))
    }
}

fn workflow(transport: &FakeTransport, snapshot: Value) -> Workflow<FakeTransport, HeadlessSurface> {
    Workflow::boot(
        ClientConfig::default(),
        "p1",
        transport.clone(),
        HeadlessSurface::new(),
        &snapshot.to_string(),
    )
}

fn selected() -> Value {
    json!({
        "selection": {"target": "v", "features": []},
        "time": {"kind": "index"},
        "sample": {"columns": ["t", "v"], "records": [{"t": 0, "v": 1}, {"t": 1, "v": 2}]}
    })
}

// ─── Restore ─────────────────────────────────────────────────────────────────

#[test]
fn test_restore_draws_selected_sample() {
    let mut surface = HeadlessSurface::new();
    RestoreController::default().restore(&mut surface, &selected().to_string());

    let plot = &surface.charts[ids::MAIN_PLOT];
    assert_eq!(plot.series_names(), vec!["v"]);
    let x: Vec<u64> = plot.series[0].x.iter().filter_map(|v| v.as_index()).collect();
    assert_eq!(x, vec![0, 1]);
    assert_eq!(plot.series[0].y, vec![Some(1.0), Some(2.0)]);
    assert_eq!(surface.selection.as_ref().and_then(|s| s.target()), Some("v"));
}

#[test]
fn test_missing_plot_element_does_not_stop_later_stages() {
    let snapshot = selected()
        .as_object()
        .cloned()
        .map(|mut m| {
            m.insert("train".into(), json!({"loss": 0.5, "prediction": [3.0]}));
            Value::Object(m)
        })
        .unwrap();
    let mut surface = HeadlessSurface::new().without(ids::MAIN_PLOT);
    RestoreController::default().restore(&mut surface, &snapshot.to_string());

    assert!(!surface.charts.contains_key(ids::MAIN_PLOT));
    assert_eq!(surface.texts[ids::TRAIN_INFO], "Loss: 0.500000");
    // no history on the page, so the forecast starts at zero
    let forecast = &surface.charts[ids::FORECAST_PLOT];
    assert_eq!(forecast.series[1].x[0].as_index(), Some(0));
    assert!(surface.progress.is_some());
}

// ─── Workflow ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_workflow() {
    let transport = FakeTransport::default();
    let wf = workflow(&transport, json!({}));

    wf.record_upload(
        &json!({"preview": {"head": [{"t": 0, "v": 1}], "info": {"column_names": ["t", "v"], "rows": 3}}})
            .to_string(),
    )
    .unwrap();
    assert!(wf.surface().selectors.is_some());
    assert_eq!(
        wf.surface().progress.and_then(|p| p.active()),
        Some(WorkflowStep::Preprocess)
    );

    transport
        .respond(json!({"data": {
            "columns": ["t", "v"],
            "records": [{"t": 0, "v": 1}, {"t": 1, "v": 2}, {"t": 2, "v": 3}]
        }}))
        .respond(json!({
            "ok": true,
            "segment": {"columns": ["v"], "records": [{"v": 2}, {"v": 3}]},
            "bounds": [1],
            "curve": {"x": [1], "y": [0.5]}
        }))
        .respond(json!({"ok": true, "loss": 0.0123, "prediction": [4.0, 5.0]}))
        .respond(json!({"ok": true, "prediction": [6.0, 7.0, 8.0], "x": [2, 3, 4]}));

    wf.apply_selection("v", vec![], TimeSpec::index()).await.unwrap();
    assert_eq!(wf.surface().charts[ids::MAIN_PLOT].series[0].len(), 3);

    wf.run_preprocess("cusum").await.unwrap();
    assert_eq!(wf.surface().charts[ids::PREPROCESS_PLOT].markers.len(), 1);
    assert!(wf.surface().charts.contains_key(ids::PREPROCESS_CURVE));

    wf.run_train(TrainParams::default()).await.unwrap();
    {
        let surface = wf.surface();
        assert_eq!(surface.texts[ids::TRAIN_INFO], "Loss: 0.012300");
        assert_eq!(
            surface.charts[ids::FORECAST_PLOT].series_names(),
            vec!["v", "Forecast"]
        );
        assert!(surface.log.last().unwrap().ends_with("training finished. Loss: 0.012300"));
        assert_eq!(
            surface.progress.unwrap().step_done,
            [true, true, true, true, true, false]
        );
    }

    let snapshot = wf.run_forecast(3, None).await.unwrap();
    let train = snapshot.train.unwrap();
    assert_eq!(train.loss, Some(0.0123));
    assert_eq!(train.prediction, vec![6.0, 7.0, 8.0]);
    assert_eq!(train.cfg, Some(TrainParams::default()));

    let calls = transport.calls();
    let urls: Vec<&str> = calls.iter().map(|(u, _)| u.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "/project/p1/select",
            "/project/p1/preprocess",
            "/project/p1/train",
            "/project/p1/forecast"
        ]
    );
    assert_eq!(calls[1].1, json!({"target": "v", "method": "cusum"}));
    assert_eq!(calls[2].1["window"], 32);
    assert_eq!(calls[3].1, json!({"target": "v", "steps": 3}));
}

#[tokio::test]
async fn test_server_time_spec_wins() {
    let transport = FakeTransport::default();
    let wf = workflow(&transport, json!({}));
    transport.respond(json!({
        "data": {"columns": ["t", "v"], "records": [{"t": 0, "v": 1}, {"t": 1, "v": 2}]},
        "time": {"column": "t", "kind": "timestamp_sec"}
    }));

    let snapshot = wf
        .apply_selection("v", vec![], TimeSpec::index())
        .await
        .unwrap();
    assert_eq!(snapshot.time_spec().kind, TimeKind::TimestampSec);
    let surface = wf.surface();
    let x = &surface.charts[ids::MAIN_PLOT].series[0].x;
    assert_eq!(x[1].as_time().map(|t| t.timestamp()), Some(1));
}

#[tokio::test]
async fn test_action_without_target_sends_nothing() {
    let transport = FakeTransport::default();
    let wf = workflow(&transport, json!({}));

    let err = wf.run_preprocess("cusum").await.unwrap_err();
    assert!(matches!(err, TsprepError::NoTarget));
    assert!(transport.calls().is_empty());
    assert_eq!(wf.surface().notifications, vec!["select a target first"]);
}

#[tokio::test]
async fn test_failed_train_is_not_merged() {
    let transport = FakeTransport::default();
    let wf = workflow(&transport, selected());
    transport.respond(json!({"ok": false, "error": "out of memory"}));

    let err = wf.run_train(TrainParams::default()).await.unwrap_err();
    assert!(matches!(err, TsprepError::Api { .. }));
    assert_eq!(wf.store().revision(), 0);
    assert!(wf.store().snapshot().train.is_none());

    let surface = wf.surface();
    assert_eq!(surface.notifications, vec!["train failed: out of memory"]);
    let line = &surface.log[0];
    assert_eq!(&line[0..1], "[");
    assert_eq!(&line[9..], "] train failed: out of memory");
}

#[tokio::test]
async fn test_transport_error_is_reported() {
    let transport = FakeTransport::default();
    let wf = workflow(&transport, selected());
    transport.fail(TsprepError::Transport("connection refused".into()));

    assert!(wf.run_forecast(12, Some(64)).await.is_err());
    assert_eq!(
        wf.surface().notifications,
        vec!["Transport error: connection refused"]
    );
    assert_eq!(transport.calls()[0].1["context"], 64);
}

#[tokio::test]
async fn test_forecast_merges_onto_latest_train() {
    let transport = FakeTransport::default();
    let mut snapshot = selected();
    snapshot["train"] = json!({"loss": 0.5, "prediction": [1.0]});
    let wf = workflow(&transport, snapshot);

    // a retrain lands while the forecast request is outstanding
    let store = wf.store().clone();
    transport.while_in_flight(move || {
        store.merge(SessionSnapshot {
            train: Some(TrainState {
                loss: Some(0.25),
                prediction: vec![9.0],
                ..Default::default()
            }),
            ..Default::default()
        });
    });
    transport.respond(json!({"ok": true, "prediction": [2.0, 3.0], "x": [2, 3]}));

    let merged = wf.run_forecast(2, None).await.unwrap();
    let train = merged.train.unwrap();
    assert_eq!(train.loss, Some(0.25));
    assert_eq!(train.prediction, vec![2.0, 3.0]);
    assert_eq!(wf.store().revision(), 2);
}

// ─── Storage ─────────────────────────────────────────────────────────────────

#[test]
fn test_snapshot_storage_round_trip() {
    let tmp = TempDir::new().unwrap();
    let snapshot = SessionSnapshot::from_value(selected());

    let path = storage::save_snapshot(tmp.path(), "alpha", &snapshot).unwrap();
    assert!(path.ends_with("alpha/snapshot.json"));
    storage::save_snapshot(tmp.path(), "beta", &SessionSnapshot::default()).unwrap();

    let loaded = storage::load_snapshot(tmp.path(), "alpha").unwrap();
    assert_eq!(loaded, snapshot);
    assert_eq!(storage::list_projects(tmp.path()).unwrap(), vec!["alpha", "beta"]);

    let err = storage::load_snapshot(tmp.path(), "gamma").unwrap_err();
    assert!(matches!(err, TsprepError::SnapshotNotFound(id) if id == "gamma"));
}
