//! Snapshot files on disk: `<base>/<project_id>/snapshot.json`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TsprepError};
use crate::snapshot::SessionSnapshot;

pub const SNAPSHOT_FILE: &str = "snapshot.json";

pub fn snapshot_path(base_dir: &Path, project_id: &str) -> PathBuf {
    base_dir.join(project_id).join(SNAPSHOT_FILE)
}

pub fn save_snapshot(base_dir: &Path, project_id: &str, snapshot: &SessionSnapshot) -> Result<PathBuf> {
    let path = snapshot_path(base_dir, project_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, snapshot.to_json_pretty()?)?;
    debug!(path = %path.display(), "snapshot saved");
    Ok(path)
}

pub fn load_snapshot(base_dir: &Path, project_id: &str) -> Result<SessionSnapshot> {
    let path = snapshot_path(base_dir, project_id);
    if !path.exists() {
        return Err(TsprepError::SnapshotNotFound(project_id.to_string()));
    }
    let text = fs::read_to_string(&path)?;
    SessionSnapshot::from_json(&text)
}

/// Project ids under `base_dir`, sorted. Directories without a snapshot are included.
pub fn list_projects(base_dir: &Path) -> Result<Vec<String>> {
    if !base_dir.exists() {
        return Ok(vec![]);
    }
    let mut names = vec![];
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
