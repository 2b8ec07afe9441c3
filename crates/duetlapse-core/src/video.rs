// Timelapse video assembly through an external encoder (ffmpeg).
//
// Runs strictly after a print finished. On success the snapshot directory
// is removed unless snapshots are kept; on any failure it is left alone so
// no frames are lost.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tracing::{debug, info};

use crate::capture::SNAPSHOT_EXTENSION;
use crate::config::VideoConfig;
use crate::error::CoreError;
use crate::run::ActiveRun;

#[derive(Debug, Clone)]
pub struct VideoAssembler {
    config: VideoConfig,
}

impl VideoAssembler {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    /// Encoder arguments for rendering `snapshot_dir/*.jpg` into `output`.
    pub fn command_args(&self, snapshot_dir: &Path, output: &Path) -> Vec<OsString> {
        let pattern = snapshot_dir.join(format!("*.{SNAPSHOT_EXTENSION}"));

        vec![
            "-r".into(),
            self.config.frame_rate.to_string().into(),
            "-y".into(),
            "-pattern_type".into(),
            "glob".into(),
            "-i".into(),
            pattern.into_os_string(),
            "-vcodec".into(),
            self.config.codec.clone().into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Encode the run's snapshots into its video file, then drop the
    /// snapshot directory unless `keep_snapshots` is set.
    pub async fn assemble(&self, run: &ActiveRun) -> Result<(), CoreError> {
        let args = self.command_args(&run.snapshot_dir, &run.video_path);
        info!(run_id = %run.id, program = %self.config.program.display(), "creating video");
        debug!(?args, "encoder arguments");

        let output = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CoreError::VideoAssemblyFailed {
                reason: format!("failed to run {}: {e}", self.config.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or_default().trim().to_owned();
            return Err(CoreError::VideoAssemblyFailed {
                reason: format!("encoder exited with {}: {tail}", output.status),
            });
        }

        info!(run_id = %run.id, video = %run.video_path.display(), "video created");

        if !self.config.keep_snapshots {
            tokio::fs::remove_dir_all(&run.snapshot_dir)
                .await
                .map_err(|e| CoreError::io(&run.snapshot_dir, e))?;
            info!(run_id = %run.id, "snapshot files deleted");
        }
        Ok(())
    }
}
