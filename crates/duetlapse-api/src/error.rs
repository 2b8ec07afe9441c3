use thiserror::Error;

/// Top-level error type for the `duetlapse-api` crate.
///
/// Covers every failure mode across both surfaces: the firmware Telnet
/// session and the webcam snapshot endpoint. `duetlapse-core` maps these
/// into domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Firmware connection ─────────────────────────────────────────
    /// The TCP connection to the firmware could not be established.
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// The peer closed the stream (zero-byte read).
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A connect or read did not complete in time.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Socket-level I/O failure unrelated to closure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Protocol ────────────────────────────────────────────────────
    /// The brace-delimited payload could not be decoded.
    #[error("Malformed record: {message}")]
    MalformedRecord { message: String, line: String },

    // ── Snapshot endpoint ───────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The snapshot endpoint answered with something other than 200.
    #[error("Snapshot request failed (HTTP {status})")]
    SnapshotStatus { status: u16 },
}
