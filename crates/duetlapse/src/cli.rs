//! Clap derive structures for the `duetlapse` CLI.
//!
//! Also compiled by `build.rs` for man pages and completions, so this file
//! depends on nothing but clap, clap_complete and std.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// duetlapse -- layer-synchronised timelapses for RepRapFirmware printers
#[derive(Debug, Parser)]
#[command(
    name = "duetlapse",
    version,
    about = "Record layer-synchronised timelapses of RepRapFirmware prints",
    long_about = "Watches a Duet / RepRapFirmware printer over its Telnet interface,\n\
        takes a webcam snapshot on every layer change, and assembles the\n\
        snapshots into a video once the print finishes.\n\n\
        Layer changes are announced by the G-code itself: run `duetlapse inject`\n\
        on sliced files, or add `M118 P4 S\"LAYER CHANGE\"` at each layer change\n\
        in your slicer.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config directory)
    #[arg(long, env = "DUETLAPSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Debug logging (same as -v)
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalOpts {
    /// Effective verbosity: `-v` count, with `--debug` counting as one.
    pub fn verbosity(&self) -> u8 {
        self.verbose.saturating_add(u8::from(self.debug))
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the printer and record timelapses until interrupted
    Run(RunArgs),

    /// Add layer-change notifications to a sliced G-code file
    Inject(InjectArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Folder for snapshots and videos (overrides output.folder)
    pub folder: Option<String>,

    /// Printer hostname or IP address (overrides printer.host)
    pub host: Option<String>,

    /// Webcam snapshot URL (overrides webcam.url)
    pub url: Option<String>,

    /// Telnet port
    #[arg(long)]
    pub port: Option<u16>,

    /// Webcam credentials as user:password
    #[arg(long, value_name = "USER:PASSWORD")]
    pub auth: Option<String>,

    /// Do not verify the webcam's TLS certificate
    #[arg(long, short = 'k')]
    pub no_verify: bool,

    /// Assemble a video with ffmpeg when a print finishes
    #[arg(long)]
    pub run_ffmpeg: bool,

    /// Keep snapshots after the video was created
    #[arg(long)]
    pub keep_snapshots: bool,

    /// ffmpeg executable
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,
}

// ── Inject ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InjectArgs {
    /// Sliced G-code file
    pub input: PathBuf,

    /// Write here instead of rewriting the input in place
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Pause after each notification, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub dwell: u32,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the effective configuration (file + environment)
    Show,

    /// Print the config file path
    Path,

    /// Store the webcam password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
