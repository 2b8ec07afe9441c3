//! RepRapFirmware Telnet protocol.
//!
//! The firmware answers commands with zero or more free-form text lines
//! followed by a single line carrying a JSON object. Unsolicited messages
//! (for example `M118` output from the running job) are interleaved with
//! those replies, so the reader hands back every line it skipped on the way
//! to the JSON record.

mod framed;
mod poller;
mod reply;

pub use framed::{FramedConnection, Structured};
pub use poller::StatusPoller;
pub use reply::{FileInfo, PrinterStatus, StatusReply};

/// Default Telnet port the firmware listens on.
pub const TELNET_PORT: u16 = 23;

/// Status query (`M408`: report JSON-style response).
pub const STATUS_COMMAND: &str = "M408";

/// Active job query (`M36` without a filename reports the file being printed).
pub const ACTIVE_FILE_COMMAND: &str = "M36";

/// Prefix of the message line a print job emits on every layer change.
pub const LAYER_CHANGE_MARKER: &str = "LAYER CHANGE";

/// Returns `true` if `line` is a layer-change marker.
///
/// Case-sensitive byte-prefix match; trailing content is allowed.
pub fn is_layer_change(line: &str) -> bool {
    line.as_bytes().starts_with(LAYER_CHANGE_MARKER.as_bytes())
}
