//! One tracked print job and its place on disk.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<run-id>/<timestamp>.jpg   snapshots
//! <root>/<run-id>.mp4               assembled video
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::CoreError;

/// Timestamp prefix of a run identifier (minute resolution).
const RUN_ID_TIME_FORMAT: &str = "%Y-%m-%dT%H%M";

/// Stem used when the firmware reports a path with no usable base name.
const FALLBACK_STEM: &str = "print";

/// An in-progress (or just finished) print.
///
/// Owned by [`PrintLifecycle`](crate::PrintLifecycle); events hand out
/// clones, so a background job holding one never observes later runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRun {
    /// `<start-timestamp>-<file stem>`, e.g. `2026-10-19T1432-benchy`.
    pub id: String,
    /// The job's file as reported by the firmware.
    pub file_name: String,
    pub snapshot_dir: PathBuf,
    pub video_path: PathBuf,
    pub started_at: DateTime<Local>,
}

impl ActiveRun {
    /// Derive the run for `file_name` starting at `started_at` and create its
    /// snapshot directory. Creating a directory that already exists is fine.
    pub async fn create(
        root: &Path,
        file_name: &str,
        started_at: DateTime<Local>,
    ) -> Result<Self, CoreError> {
        let id = run_id(file_name, started_at);
        let snapshot_dir = root.join(&id);
        let video_path = root.join(format!("{id}.mp4"));

        tokio::fs::create_dir_all(&snapshot_dir)
            .await
            .map_err(|e| CoreError::io(&snapshot_dir, e))?;

        Ok(Self {
            id,
            file_name: file_name.to_owned(),
            snapshot_dir,
            video_path,
            started_at,
        })
    }
}

/// `<start-timestamp>-<sanitized stem of the file's base name>`.
///
/// Two jobs with the same file name started within the same minute get the
/// same identifier.
pub fn run_id(file_name: &str, started_at: DateTime<Local>) -> String {
    format!(
        "{}-{}",
        started_at.format(RUN_ID_TIME_FORMAT),
        sanitized_stem(file_name)
    )
}

/// Base name without its last extension, made safe as a path component.
///
/// Firmware paths always use `/` (`0:/gcodes/sub/part.gcode`). A leading dot
/// is part of the name, not an extension.
fn sanitized_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };

    let cleaned: String = stem
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == ".." || cleaned == "." {
        FALLBACK_STEM.to_owned()
    } else {
        cleaned.to_owned()
    }
}
