//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use duetlapse_config::ConfigError;
use duetlapse_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Webcam ───────────────────────────────────────────────────────

    #[error("Cannot set up the webcam client: {reason}")]
    #[diagnostic(
        code(duetlapse::webcam),
        help("Check the snapshot URL. Use --no-verify for self-signed certificates.")
    )]
    Webcam { reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(duetlapse::validation))]
    Validation { field: String, reason: String },

    #[error("{field} is not configured")]
    #[diagnostic(
        code(duetlapse::missing_setting),
        help(
            "Pass it on the command line: duetlapse run <folder> <host> <url>\n\
             or set it in {path} (create one with: duetlapse config init)"
        )
    )]
    MissingSetting { field: String, path: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(duetlapse::no_config),
        help("Create one with: duetlapse config init --config {path}")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(duetlapse::config))]
    Config(Box<figment::Error>),

    #[error("Keyring access failed: {reason}")]
    #[diagnostic(
        code(duetlapse::keyring),
        help("Set DUETLAPSE_WEBCAM_PASSWORD or webcam.password_env instead.")
    )]
    Keyring { reason: String },

    // ── IO ───────────────────────────────────────────────────────────

    #[error("Cannot access {}", path.display())]
    #[diagnostic(code(duetlapse::file_access))]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    // ── Monitor ──────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(duetlapse::monitor))]
    Monitor(Box<CoreError>),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::MissingSetting { .. } => exit_code::USAGE,
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }

    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────
//
// Session failures never reach the CLI: the supervisor recovers from them.
// What does arrive comes from setting up the webcam client.

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SnapshotFetchFailed { reason } => CliError::Webcam { reason },

            CoreError::Io { path, source } => CliError::FileAccess { path, source },

            CoreError::Config { message } => CliError::Validation {
                field: "webcam".into(),
                reason: message,
            },

            other => CliError::Monitor(Box::new(other)),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },

            ConfigError::Missing { field } => CliError::MissingSetting {
                field,
                path: duetlapse_config::config_path().display().to_string(),
            },

            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },

            ConfigError::Keyring { reason } => CliError::Keyring { reason },

            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },

            ConfigError::Figment(e) => CliError::Config(e),

            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
