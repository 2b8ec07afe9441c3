//! Print lifecycle state machine.
//!
//! Driven by one [`PollCycle`] at a time: the status code from `M408`, the
//! active file name when the caller had to ask for it, and every free-form
//! line received during the cycle.
//!
//! ```text
//!          status P + file name
//!   Idle ───────────────────────▶ Printing(run)   emits PrintStarted
//!     ▲                               │
//!     └───────────────────────────────┘           emits PrintFinished
//!                 status I
//! ```
//!
//! While printing, each `LAYER CHANGE` line emits `LayerChanged`. Any other
//! status code leaves the state untouched. A printing status that names a
//! different file than the tracked run does not start a new run: the firmware
//! always reports idle between jobs, and the tracked run stays current until
//! it does.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use duetlapse_api::{PrinterStatus, is_layer_change};

use crate::error::CoreError;
use crate::run::ActiveRun;

/// Input for one step of the state machine.
#[derive(Debug, Clone)]
pub struct PollCycle {
    pub status: PrinterStatus,
    /// File reported by `M36`, present only when [`PrintLifecycle::needs_file_name`]
    /// asked for it this cycle.
    pub active_file: Option<String>,
    /// Free-form lines received this cycle, in receipt order.
    pub auxiliary: Vec<String>,
}

impl PollCycle {
    pub fn new(status: PrinterStatus) -> Self {
        Self {
            status,
            active_file: None,
            auxiliary: Vec::new(),
        }
    }

    pub fn with_active_file(mut self, file_name: impl Into<String>) -> Self {
        self.active_file = Some(file_name.into());
        self
    }

    pub fn with_auxiliary<I, L>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.auxiliary.extend(lines.into_iter().map(Into::into));
        self
    }
}

/// Something the timelapse side has to react to.
///
/// Each event carries its own copy of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PrintStarted(ActiveRun),
    LayerChanged(ActiveRun),
    PrintFinished(ActiveRun),
}

impl LifecycleEvent {
    pub fn run(&self) -> &ActiveRun {
        match self {
            Self::PrintStarted(run) | Self::LayerChanged(run) | Self::PrintFinished(run) => run,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Idle,
    Printing(ActiveRun),
}

/// Tracks whether a print is running and which run it belongs to.
#[derive(Debug)]
pub struct PrintLifecycle {
    output_root: PathBuf,
    state: LifecycleState,
}

impl PrintLifecycle {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn active_run(&self) -> Option<&ActiveRun> {
        match &self.state {
            LifecycleState::Printing(run) => Some(run),
            LifecycleState::Idle => None,
        }
    }

    /// Whether a cycle with `status` will need the active file name.
    ///
    /// True only on a fresh Idle → Printing transition.
    pub fn needs_file_name(&self, status: &PrinterStatus) -> bool {
        matches!(
            (&self.state, status),
            (LifecycleState::Idle, PrinterStatus::Printing)
        )
    }

    /// Apply one poll cycle, stamping a new run with the current local time.
    pub async fn observe(&mut self, cycle: &PollCycle) -> Result<Vec<LifecycleEvent>, CoreError> {
        self.observe_at(cycle, Local::now()).await
    }

    /// Apply one poll cycle; `now` stamps a run started by this cycle.
    ///
    /// Fails only if a new run's snapshot directory cannot be created, in
    /// which case the state stays `Idle`.
    pub async fn observe_at(
        &mut self,
        cycle: &PollCycle,
        now: DateTime<Local>,
    ) -> Result<Vec<LifecycleEvent>, CoreError> {
        let mut events = Vec::new();

        match (&self.state, &cycle.status) {
            (LifecycleState::Idle, PrinterStatus::Printing) => {
                if let Some(file_name) = cycle.active_file.as_deref() {
                    let run = ActiveRun::create(&self.output_root, file_name, now).await?;
                    info!(
                        run_id = %run.id,
                        dir = %run.snapshot_dir.display(),
                        "print started, waiting for layer changes"
                    );
                    events.push(LifecycleEvent::PrintStarted(run.clone()));
                    self.state = LifecycleState::Printing(run);
                } else {
                    debug!("printing reported without an active file name, staying idle");
                }
            }
            (LifecycleState::Printing(_), PrinterStatus::Idle) => {
                if let LifecycleState::Printing(run) = std::mem::take(&mut self.state) {
                    info!(run_id = %run.id, "print finished");
                    events.push(LifecycleEvent::PrintFinished(run));
                }
            }
            (_, PrinterStatus::Other(code)) => {
                debug!(code = %code, "unrecognized status code, no transition");
            }
            _ => {}
        }

        if let LifecycleState::Printing(run) = &self.state {
            events.extend(
                cycle
                    .auxiliary
                    .iter()
                    .filter(|line| is_layer_change(line))
                    .map(|_| LifecycleEvent::LayerChanged(run.clone())),
            );
        }

        Ok(events)
    }

    /// Drop the tracked run without finishing it.
    ///
    /// Used when the session is lost: the run's directory stays on disk but
    /// no further events fire for it.
    pub fn abandon(&mut self) -> Option<ActiveRun> {
        match std::mem::take(&mut self.state) {
            LifecycleState::Printing(run) => Some(run),
            LifecycleState::Idle => None,
        }
    }
}
