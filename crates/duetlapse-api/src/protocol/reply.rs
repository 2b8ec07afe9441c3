use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Machine status code reported by `M408`.
///
/// Only printing and idle drive the lifecycle; every other code (paused,
/// busy, halted, ...) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrinterStatus {
    /// `P`: a job is running.
    Printing,
    /// `I`: nothing is running.
    Idle,
    /// Any other code, verbatim.
    Other(String),
}

impl PrinterStatus {
    /// The single-letter code as sent by the firmware.
    pub fn code(&self) -> &str {
        match self {
            Self::Printing => "P",
            Self::Idle => "I",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for PrinterStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "P" => Self::Printing,
            "I" => Self::Idle,
            _ => Self::Other(code),
        }
    }
}

impl From<PrinterStatus> for String {
    fn from(status: PrinterStatus) -> Self {
        match status {
            PrinterStatus::Other(code) => code,
            known => known.code().to_owned(),
        }
    }
}

/// Decoded `M408` reply.
///
/// Uses `#[serde(flatten)]` to keep every field beyond `status` so debug
/// logging shows the full firmware report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: PrinterStatus,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decoded `M36` reply for the file currently being printed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path as reported by the firmware, e.g. `0:/gcodes/benchy.gcode`.
    #[serde(rename = "fileName")]
    pub file_name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
