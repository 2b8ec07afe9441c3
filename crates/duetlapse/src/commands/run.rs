//! `duetlapse run`: the long-running monitor.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use duetlapse_core::{CaptureTrigger, SessionSupervisor, TimelapseHandler, VideoAssembler};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = config::build_monitor_config(global, &args)?;

    std::fs::create_dir_all(&monitor.output_root)
        .map_err(|e| CliError::file_access(&monitor.output_root, e))?;

    let capture = CaptureTrigger::from_config(&monitor.webcam)?;
    let assembler = monitor.video.clone().map(VideoAssembler::new);
    if assembler.is_none() {
        info!("video assembly disabled, snapshots are kept");
    }
    let handler = TimelapseHandler::new(capture, assembler);

    let cancel = CancellationToken::new();
    let supervisor = SessionSupervisor::new(
        monitor.printer.clone(),
        &monitor.output_root,
        handler,
        cancel.clone(),
    );

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C, stopping"),
        }
        interrupt.cancel();
    });

    info!(
        host = %monitor.printer.host,
        webcam = %monitor.webcam.url,
        folder = %monitor.output_root.display(),
        "duetlapse started"
    );

    let handler = supervisor.run().await;
    handler.shutdown().await;
    info!("duetlapse stopped");
    Ok(())
}
