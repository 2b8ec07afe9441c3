// ── Runtime monitor configuration ──
//
// These types describe *what* to watch and *where* to write. They carry
// credentials and timing, but never touch disk themselves. The CLI builds
// a `MonitorConfig` from its config file and flags and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use duetlapse_api::{BasicAuth, TELNET_PORT, TlsMode, TransportConfig};

/// Firmware connection and session timing.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Hostname or IP address of the printer.
    pub host: String,
    /// Telnet port (23 on RepRapFirmware).
    pub port: u16,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on each socket read while waiting for a reply.
    pub read_timeout: Duration,
    /// Pause after connecting; the firmware ignores input for ~4 s.
    pub settle_delay: Duration,
    /// Pause between two status polls.
    pub poll_interval: Duration,
    /// Pause after a failed session before reconnecting.
    pub backoff: Duration,
    /// Pause before the very first connection attempt.
    pub startup_delay: Duration,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: TELNET_PORT,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(4500),
            poll_interval: Duration::from_millis(500),
            backoff: Duration::from_secs(10),
            startup_delay: Duration::from_secs(15),
        }
    }
}

/// Webcam snapshot endpoint.
#[derive(Debug, Clone)]
pub struct WebcamConfig {
    /// URL returning one JPEG per GET.
    pub url: Url,
    /// Optional HTTP Basic credentials.
    pub auth: Option<BasicAuth>,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// Request timeout.
    pub timeout: Duration,
}

impl WebcamConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}

/// External encoder settings. Absent means no video is assembled.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Encoder executable.
    pub program: PathBuf,
    pub frame_rate: u32,
    /// Value passed to `-vcodec`.
    pub codec: String,
    /// Keep the snapshot directory after a successful encode.
    pub keep_snapshots: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            frame_rate: 20,
            codec: "libx264".into(),
            keep_snapshots: false,
        }
    }
}

/// Everything one monitor process needs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub printer: PrinterConfig,
    pub webcam: WebcamConfig,
    /// Root folder holding one directory and one video per run.
    pub output_root: PathBuf,
    pub video: Option<VideoConfig>,
}
