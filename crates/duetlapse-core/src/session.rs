//! Firmware session supervisor with auto-reconnect.
//!
//! ```text
//! Connecting ──ok──▶ Active ──error──▶ Backoff ──sleep──▶ Connecting
//!      └──────────────error───────────────▲
//! ```
//!
//! Every failure below the supervisor (refused connection, closed socket,
//! read timeout, undecodable reply, unwritable run directory) ends the
//! session and drives it to `Backoff`. A run in progress is abandoned, not
//! finished: the next session starts from `Idle`. The loop only exits when
//! its [`CancellationToken`] fires.
//!
//! # Example
//!
//! ```rust,ignore
//! use duetlapse_core::{PrinterConfig, SessionSupervisor, TimelapseHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let supervisor = SessionSupervisor::new(printer, "/srv/timelapses", handler, cancel.clone());
//! let mut state = supervisor.subscribe();
//!
//! let handler = supervisor.run().await; // until `cancel.cancel()`
//! handler.shutdown().await;
//! ```

use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use duetlapse_api::{FramedConnection, StatusPoller};

use crate::config::PrinterConfig;
use crate::error::CoreError;
use crate::handler::LifecycleHandler;
use crate::lifecycle::{PollCycle, PrintLifecycle};

// ── SessionState ─────────────────────────────────────────────────────

/// Supervisor state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting out the startup delay.
    Starting,
    /// Opening the connection; `attempt` counts failures since the last
    /// session that reached `Active`.
    Connecting { attempt: u32 },
    /// Polling.
    Active,
    /// Sleeping before the next connection attempt.
    Backoff { attempt: u32 },
    /// Cancelled; the loop has exited.
    Stopped,
}

// ── SessionSupervisor ────────────────────────────────────────────────

pub struct SessionSupervisor<H> {
    printer: PrinterConfig,
    output_root: PathBuf,
    handler: H,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl<H: LifecycleHandler> SessionSupervisor<H> {
    pub fn new(
        printer: PrinterConfig,
        output_root: impl Into<PathBuf>,
        handler: H,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Starting);
        Self {
            printer,
            output_root: output_root.into(),
            handler,
            state,
            cancel,
        }
    }

    /// Receiver for state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the reconnect loop until cancelled, then hand the handler back
    /// so the caller can drain it.
    pub async fn run(mut self) -> H {
        info!(host = %self.printer.host, "sleeping for a bit to let everything initialize");
        if cancellable_sleep(&self.cancel, self.printer.startup_delay).await {
            let cancel = self.cancel.clone();
            let mut attempt: u32 = 0;

            loop {
                self.set_state(SessionState::Connecting { attempt });

                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = self.run_session() => result,
                };
                let Err(e) = result;

                if matches!(*self.state.borrow(), SessionState::Active) {
                    attempt = 0;
                }
                attempt += 1;

                if e.is_session_lost() {
                    warn!(error = %e, attempt, "printer session lost");
                } else {
                    error!(error = %e, attempt, "printer session failed");
                }
                self.set_state(SessionState::Backoff { attempt });
                info!(
                    delay_ms = u64::try_from(self.printer.backoff.as_millis()).unwrap_or(u64::MAX),
                    "sleeping for a bit before reconnecting"
                );
                if !cancellable_sleep(&self.cancel, self.printer.backoff).await {
                    break;
                }
            }
        }

        self.set_state(SessionState::Stopped);
        debug!("session supervisor exiting");
        self.handler
    }

    /// One connection lifecycle: connect, settle, poll until something fails.
    async fn run_session(&mut self) -> Result<Infallible, CoreError> {
        info!(host = %self.printer.host, port = self.printer.port, "connecting");
        let conn = FramedConnection::connect(
            &self.printer.host,
            self.printer.port,
            self.printer.connect_timeout,
        )
        .await?
        .with_read_timeout(self.printer.read_timeout);

        // The firmware discards input for a few seconds after connecting.
        tokio::time::sleep(self.printer.settle_delay).await;
        info!("connection established");
        self.set_state(SessionState::Active);

        let mut poller = StatusPoller::new(conn);
        let mut lifecycle = PrintLifecycle::new(&self.output_root);

        let Err(e) = self.poll_loop(&mut poller, &mut lifecycle).await;
        if let Some(run) = lifecycle.abandon() {
            warn!(run_id = %run.id, "connection lost mid-print, run abandoned");
        }
        Err(e)
    }

    async fn poll_loop<S>(
        &mut self,
        poller: &mut StatusPoller<S>,
        lifecycle: &mut PrintLifecycle,
    ) -> Result<Infallible, CoreError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        loop {
            let cycle = next_cycle(poller, lifecycle).await?;
            for event in lifecycle.observe(&cycle).await? {
                self.handler.handle(&event).await;
            }
            tokio::time::sleep(self.printer.poll_interval).await;
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "session state");
        self.state.send_replace(state);
    }
}

/// Sleep unless cancelled first; `false` means cancelled.
async fn cancellable_sleep(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Poll status and, on a fresh start, the active file.
async fn next_cycle<S>(
    poller: &mut StatusPoller<S>,
    lifecycle: &PrintLifecycle,
) -> Result<PollCycle, CoreError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let reply = poller.poll().await?;
    debug!(status = reply.record.status.code(), extra = ?reply.record.extra, "status");

    let mut cycle = PollCycle::new(reply.record.status).with_auxiliary(reply.auxiliary);

    if lifecycle.needs_file_name(&cycle.status) {
        let file = poller.query_active_file().await?;
        debug!(file = %file.record.file_name, "active file");
        cycle.auxiliary.extend(file.auxiliary);
        cycle.active_file = Some(file.record.file_name);
    }

    Ok(cycle)
}
