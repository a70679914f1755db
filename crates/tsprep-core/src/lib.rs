//! tsprep-core: client-side session model for the tsprep time-series workflow.
//!
//! The server hands the page one JSON snapshot. This crate parses it, resolves
//! time axes, projects chart series, derives workflow progress and replays all of
//! that onto a [`surface::Surface`]. Nothing in here touches the DOM directly.

pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod restore;
pub mod snapshot;
pub mod storage;
pub mod surface;
pub mod time_axis;
pub mod workflow;

pub use api::{ApiOutcome, Endpoint, Transport};
pub use chart::{Chart, Series};
pub use config::ClientConfig;
pub use error::{Result, TsprepError};
pub use models::{SelectionState, TabularSample, TimeKind, TimeSpec, TrainParams};
pub use progress::{WorkflowProgress, WorkflowStep};
pub use restore::{RestoreController, RestoreReport, RestoreStage, StageOutcome};
pub use snapshot::{SessionSnapshot, SessionStore};
pub use surface::{HeadlessSurface, Surface};
pub use time_axis::AxisValue;
pub use workflow::Workflow;
