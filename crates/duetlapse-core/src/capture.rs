// Snapshot capture on layer change.
//
// One fetch per trigger, never retried: the next layer change triggers
// again on its own. File names are UTC timestamps with milliseconds; a
// collision gets a zero-padded `_NNN` suffix, which still sorts after the
// bare name, so the encoder's glob order is capture order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use duetlapse_api::SnapshotClient;

use crate::config::WebcamConfig;
use crate::error::CoreError;
use crate::run::ActiveRun;

const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// Extension of every snapshot file; the video assembler globs for it.
pub const SNAPSHOT_EXTENSION: &str = "jpg";

/// Stores webcam snapshots into the active run's directory.
#[derive(Debug, Clone)]
pub struct CaptureTrigger {
    client: SnapshotClient,
}

impl CaptureTrigger {
    pub fn new(client: SnapshotClient) -> Self {
        Self { client }
    }

    pub fn from_config(webcam: &WebcamConfig) -> Result<Self, CoreError> {
        let client = SnapshotClient::new(webcam.url.clone(), webcam.auth.clone(), &webcam.transport())?;
        Ok(Self::new(client))
    }

    /// Fetch one snapshot into `<run.snapshot_dir>/<UTC timestamp>.jpg`.
    pub async fn capture(&self, run: &ActiveRun) -> Result<PathBuf, CoreError> {
        let dest = snapshot_path(&run.snapshot_dir, Utc::now());

        self.client
            .download(&dest)
            .await
            .map_err(|e| CoreError::SnapshotFetchFailed {
                reason: e.to_string(),
            })?;

        info!(run_id = %run.id, path = %dest.display(), "picture taken");
        Ok(dest)
    }
}

/// First free `<stamp>[_NNN].jpg` name in `dir`.
fn snapshot_path(dir: &Path, at: DateTime<Utc>) -> PathBuf {
    let stamp = at.format(SNAPSHOT_TIME_FORMAT).to_string();

    let mut candidate = dir.join(format!("{stamp}.{SNAPSHOT_EXTENSION}"));
    let mut suffix = 1_u32;
    while candidate.exists() {
        candidate = dir.join(format!("{stamp}_{suffix:03}.{SNAPSHOT_EXTENSION}"));
        suffix += 1;
    }
    candidate
}
