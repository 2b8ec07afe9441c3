// duetlapse-api: Async clients for RepRapFirmware Telnet status polling and webcam snapshots

pub mod auth;
pub mod error;
pub mod protocol;
pub mod snapshot;
pub mod transport;

pub use auth::BasicAuth;
pub use error::Error;
pub use protocol::{
    ACTIVE_FILE_COMMAND, FileInfo, FramedConnection, LAYER_CHANGE_MARKER, PrinterStatus,
    STATUS_COMMAND, StatusPoller, StatusReply, Structured, TELNET_PORT, is_layer_change,
};
pub use snapshot::SnapshotClient;
pub use transport::{DEFAULT_SNAPSHOT_TIMEOUT, TlsMode, TransportConfig};
