// ── Core error types ──
//
// Domain-level errors from duetlapse-core. Consumers never see raw socket
// or HTTP errors; the `From<duetlapse_api::Error>` impl translates them into
// the session-loss / snapshot / assembly taxonomy the supervisor acts on.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors (recovered by reconnecting) ───────────────────
    #[error("Cannot connect to printer at {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("Printer closed the connection")]
    ConnectionClosed,

    #[error("Printer did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed status record: {message}")]
    MalformedRecord { message: String },

    // ── Reaction errors (logged, session continues) ──────────────────
    #[error("Snapshot fetch failed: {reason}")]
    SnapshotFetchFailed { reason: String },

    #[error("Video assembly failed: {reason}")]
    VideoAssemblyFailed { reason: String },

    // ── Filesystem ───────────────────────────────────────────────────
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the firmware session is unusable and must be
    /// re-established.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::MalformedRecord { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<duetlapse_api::Error> for CoreError {
    fn from(err: duetlapse_api::Error) -> Self {
        use duetlapse_api::Error as Api;

        match err {
            Api::ConnectionFailed { addr, reason } => CoreError::ConnectionFailed { addr, reason },
            Api::ConnectionClosed => CoreError::ConnectionClosed,
            Api::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            Api::Io(e) => CoreError::ConnectionFailed {
                addr: "(socket)".into(),
                reason: e.to_string(),
            },
            Api::MalformedRecord { message, line } => CoreError::MalformedRecord {
                message: format!("{message} in {line:?}"),
            },
            Api::SnapshotStatus { status } => CoreError::SnapshotFetchFailed {
                reason: format!("HTTP {status}"),
            },
            Api::Transport(e) => CoreError::SnapshotFetchFailed {
                reason: e.to_string(),
            },
            Api::Tls(message) => CoreError::Config { message },
        }
    }
}
