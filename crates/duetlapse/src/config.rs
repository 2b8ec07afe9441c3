//! CLI layer over `duetlapse-config`: `--config` handling and `run` flag
//! overrides on top of the loaded file.

use std::path::PathBuf;

use duetlapse_config::{Config, config_path, load_config, to_monitor_config};
use duetlapse_core::{BasicAuth, MonitorConfig};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

/// The config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config(global.config.as_deref())?)
}

/// Apply `run` flags and positionals; flags only ever switch features on.
fn apply_overrides(cfg: &mut Config, args: &RunArgs) {
    if let Some(ref folder) = args.folder {
        cfg.output.folder = Some(folder.clone());
    }
    if let Some(ref host) = args.host {
        cfg.printer.host = Some(host.clone());
    }
    if let Some(ref url) = args.url {
        cfg.webcam.url = Some(url.clone());
    }
    if let Some(port) = args.port {
        cfg.printer.port = port;
    }
    if let Some(ref ffmpeg) = args.ffmpeg {
        cfg.output.ffmpeg.clone_from(ffmpeg);
    }
    if args.auth.is_some() {
        // Flag credentials replace the configured ones entirely.
        cfg.webcam.username = None;
    }
    cfg.webcam.insecure |= args.no_verify;
    cfg.output.run_ffmpeg |= args.run_ffmpeg;
    cfg.output.keep_snapshots |= args.keep_snapshots;
}

fn parse_auth(pair: &str) -> Result<BasicAuth, CliError> {
    BasicAuth::parse(pair).ok_or_else(|| CliError::Validation {
        field: "--auth".into(),
        reason: "expected user:password".into(),
    })
}

/// Build the monitor's runtime config from file, environment and flags.
pub fn build_monitor_config(global: &GlobalOpts, args: &RunArgs) -> Result<MonitorConfig, CliError> {
    let flag_auth = args.auth.as_deref().map(parse_auth).transpose()?;

    let mut cfg = load(global)?;
    apply_overrides(&mut cfg, args);

    let mut monitor = to_monitor_config(&cfg)?;
    if flag_auth.is_some() {
        monitor.webcam.auth = flag_auth;
    }
    Ok(monitor)
}
