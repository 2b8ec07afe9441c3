// ── Lifecycle event handling ──
//
// The supervisor hands every lifecycle event to a `LifecycleHandler`. The
// production handler captures a snapshot inline on each layer change and
// dispatches video assembly to a background task, so a long encode never
// stalls status polling.

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::capture::CaptureTrigger;
use crate::lifecycle::LifecycleEvent;
use crate::video::VideoAssembler;

/// Reacts to lifecycle events.
///
/// Called sequentially from the session loop; an implementation that blocks
/// delays the next poll.
pub trait LifecycleHandler: Send {
    fn handle(&mut self, event: &LifecycleEvent) -> impl Future<Output = ()> + Send;
}

/// Snapshots on layer change, video on print end.
#[derive(Debug)]
pub struct TimelapseHandler {
    capture: CaptureTrigger,
    assembler: Option<VideoAssembler>,
    jobs: TaskTracker,
}

impl TimelapseHandler {
    /// `assembler: None` keeps snapshots and skips the video.
    pub fn new(capture: CaptureTrigger, assembler: Option<VideoAssembler>) -> Self {
        Self {
            capture,
            assembler,
            jobs: TaskTracker::new(),
        }
    }

    /// Wait for every dispatched video job to finish.
    pub async fn shutdown(self) {
        self.jobs.close();
        if !self.jobs.is_empty() {
            info!(jobs = self.jobs.len(), "waiting for video jobs to finish");
        }
        self.jobs.wait().await;
    }
}

impl LifecycleHandler for TimelapseHandler {
    async fn handle(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::PrintStarted(_) => {}
            LifecycleEvent::LayerChanged(run) => {
                if let Err(e) = self.capture.capture(run).await {
                    warn!(run_id = %run.id, error = %e, "failed to get timelapse snapshot");
                }
            }
            LifecycleEvent::PrintFinished(run) => {
                let Some(assembler) = self.assembler.clone() else {
                    info!(run_id = %run.id, dir = %run.snapshot_dir.display(), "video disabled, snapshots kept");
                    return;
                };

                let run = run.clone();
                self.jobs.spawn(async move {
                    if let Err(e) = assembler.assemble(&run).await {
                        error!(
                            run_id = %run.id,
                            dir = %run.snapshot_dir.display(),
                            error = %e,
                            "failed creating video, snapshots kept"
                        );
                    }
                });
            }
        }
    }
}
