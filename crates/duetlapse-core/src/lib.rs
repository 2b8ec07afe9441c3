// duetlapse-core: Print lifecycle tracking between the firmware protocol and the timelapse outputs.

pub mod capture;
pub mod config;
pub mod error;
pub mod gcode;
pub mod handler;
pub mod lifecycle;
pub mod run;
pub mod session;
pub mod video;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capture::CaptureTrigger;
pub use config::{MonitorConfig, PrinterConfig, VideoConfig, WebcamConfig};
pub use error::CoreError;
pub use handler::{LifecycleHandler, TimelapseHandler};
pub use lifecycle::{LifecycleEvent, LifecycleState, PollCycle, PrintLifecycle};
pub use run::ActiveRun;
pub use session::{SessionState, SessionSupervisor};
pub use video::VideoAssembler;

// Protocol types consumers need without depending on the api crate.
pub use duetlapse_api::{BasicAuth, PrinterStatus, TlsMode};
