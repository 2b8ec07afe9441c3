#![allow(clippy::unwrap_used)]
// Session supervisor against a scripted firmware on a local socket.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use duetlapse_core::{
    CaptureTrigger, LifecycleEvent, LifecycleHandler, PrinterConfig, SessionState,
    SessionSupervisor, TimelapseHandler, TlsMode, VideoAssembler, VideoConfig, WebcamConfig,
};

const IDLE: &str = "{\"status\":\"I\"}\n";
const PRINTING: &str = "{\"status\":\"P\"}\n";
const LAYER: &str = "LAYER CHANGE\n{\"status\":\"P\"}\n";
const TRUNCATED: &str = "{\"status\":\n";
const WAIT: Duration = Duration::from_secs(5);

// ── Fake firmware ───────────────────────────────────────────────────

/// What a connection does once its scripted statuses run out.
#[derive(Clone, Copy)]
enum Tail {
    Close,
    Idle,
}

struct Script {
    statuses: Vec<&'static str>,
    file: &'static str,
    tail: Tail,
}

/// Serve one script per accepted connection. `tail_reached` fires the
/// first time a connection answers from its idle tail.
async fn serve(listener: TcpListener, scripts: Vec<Script>, tail_reached: Arc<Notify>) {
    for script in scripts {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut statuses = script.statuses.into_iter();

        while let Ok(Some(command)) = lines.next_line().await {
            let reply = match command.trim() {
                "M408" => match (statuses.next(), script.tail) {
                    (Some(status), _) => status.to_owned(),
                    (None, Tail::Close) => break,
                    (None, Tail::Idle) => {
                        tail_reached.notify_one();
                        IDLE.to_owned()
                    }
                },
                "M36" => format!("{{\"err\":0,\"fileName\":\"{}\"}}\n", script.file),
                other => panic!("unexpected command {other:?}"),
            };
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

async fn firmware(scripts: Vec<Script>) -> (u16, Arc<Notify>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let tail_reached = Arc::new(Notify::new());
    tokio::spawn(serve(listener, scripts, Arc::clone(&tail_reached)));
    (port, tail_reached)
}

fn printer(port: u16) -> PrinterConfig {
    PrinterConfig {
        host: "127.0.0.1".into(),
        port,
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(1),
        backoff: Duration::from_millis(20),
        startup_delay: Duration::ZERO,
    }
}

// ── Recording handler ───────────────────────────────────────────────

struct RecordingHandler {
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleHandler for RecordingHandler {
    async fn handle(&mut self, event: &LifecycleEvent) {
        let _ = self.events.send(event.clone());
    }
}

fn recorder() -> (RecordingHandler, mpsc::UnboundedReceiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordingHandler { events: tx }, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> LifecycleEvent {
    tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_print_produces_start_layers_and_finish() {
    let (port, _) = firmware(vec![Script {
        statuses: vec![IDLE, PRINTING, LAYER, LAYER, IDLE],
        file: "/gcodes/test.gcode",
        tail: Tail::Idle,
    }])
    .await;
    let root = tempfile::tempdir().unwrap();
    let (handler, mut rx) = recorder();
    let cancel = CancellationToken::new();

    let supervisor = SessionSupervisor::new(printer(port), root.path(), handler, cancel.clone());
    let task = tokio::spawn(supervisor.run());

    let started = next_event(&mut rx).await;
    let LifecycleEvent::PrintStarted(run) = &started else {
        panic!("expected PrintStarted, got {started:?}");
    };
    assert!(run.id.ends_with("-test"), "run id {}", run.id);
    assert_eq!(run.file_name, "/gcodes/test.gcode");
    assert!(run.snapshot_dir.is_dir());

    assert_eq!(next_event(&mut rx).await, LifecycleEvent::LayerChanged(run.clone()));
    assert_eq!(next_event(&mut rx).await, LifecycleEvent::LayerChanged(run.clone()));
    assert_eq!(next_event(&mut rx).await, LifecycleEvent::PrintFinished(run.clone()));

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn lost_connection_abandons_the_run_and_reconnects() {
    let (port, _) = firmware(vec![
        Script {
            statuses: vec![PRINTING],
            file: "/gcodes/first.gcode",
            tail: Tail::Close,
        },
        Script {
            statuses: vec![PRINTING],
            file: "/gcodes/second.gcode",
            tail: Tail::Idle,
        },
    ])
    .await;
    let root = tempfile::tempdir().unwrap();
    let (handler, mut rx) = recorder();
    let cancel = CancellationToken::new();

    let supervisor = SessionSupervisor::new(printer(port), root.path(), handler, cancel.clone());
    let task = tokio::spawn(supervisor.run());

    let first = next_event(&mut rx).await;
    assert!(matches!(&first, LifecycleEvent::PrintStarted(run) if run.id.ends_with("-first")));

    // No finish is synthesized for the first run; the next session starts fresh.
    let second = next_event(&mut rx).await;
    let LifecycleEvent::PrintStarted(run) = &second else {
        panic!("expected PrintStarted, got {second:?}");
    };
    assert!(run.id.ends_with("-second"));
    assert_eq!(next_event(&mut rx).await, LifecycleEvent::PrintFinished(run.clone()));

    // The abandoned run's directory stays on disk.
    assert!(first.run().snapshot_dir.is_dir());

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_reply_ends_the_session_and_the_next_starts_idle() {
    let (port, _) = firmware(vec![
        Script {
            statuses: vec![PRINTING, TRUNCATED],
            file: "/gcodes/first.gcode",
            tail: Tail::Idle,
        },
        Script {
            statuses: vec![IDLE, PRINTING],
            file: "/gcodes/second.gcode",
            tail: Tail::Idle,
        },
    ])
    .await;
    let root = tempfile::tempdir().unwrap();
    let (handler, mut rx) = recorder();
    let cancel = CancellationToken::new();

    let supervisor = SessionSupervisor::new(printer(port), root.path(), handler, cancel.clone());
    let task = tokio::spawn(supervisor.run());

    let first = next_event(&mut rx).await;
    assert!(matches!(&first, LifecycleEvent::PrintStarted(run) if run.id.ends_with("-first")));

    // The idle reply opening the second session finishes nothing: the
    // first run was dropped with its session.
    let second = next_event(&mut rx).await;
    assert!(
        matches!(&second, LifecycleEvent::PrintStarted(run) if run.id.ends_with("-second")),
        "expected the second run to start, got {second:?}"
    );

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn refused_connection_backs_off_until_cancelled() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let root = tempfile::tempdir().unwrap();
    let (handler, _rx) = recorder();
    let cancel = CancellationToken::new();

    let config = PrinterConfig {
        backoff: Duration::from_secs(3600),
        ..printer(port)
    };
    let supervisor = SessionSupervisor::new(config, root.path(), handler, cancel.clone());
    let mut state = supervisor.subscribe();
    let task = tokio::spawn(supervisor.run());

    let reached = tokio::time::timeout(
        WAIT,
        state.wait_for(|s| matches!(s, SessionState::Backoff { .. })),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(reached, SessionState::Backoff { attempt: 1 });

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(*state.borrow(), SessionState::Stopped);
}

#[tokio::test]
async fn cancel_during_startup_delay_stops_without_connecting() {
    let root = tempfile::tempdir().unwrap();
    let (handler, _rx) = recorder();
    let cancel = CancellationToken::new();

    let config = PrinterConfig {
        startup_delay: Duration::from_secs(3600),
        ..printer(1)
    };
    let supervisor = SessionSupervisor::new(config, root.path(), handler, cancel.clone());
    let state = supervisor.subscribe();
    let task = tokio::spawn(supervisor.run());

    cancel.cancel();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(*state.borrow(), SessionState::Stopped);
}

// ── Timelapse handler end to end ────────────────────────────────────

fn jpeg() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8jpeg".to_vec())
}

async fn jpeg_webcam() -> MockServer {
    let webcam = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/snapshot"))
        .respond_with(jpeg())
        .expect(2)
        .mount(&webcam)
        .await;
    webcam
}

/// One print with two layer changes against `webcam`, then shutdown.
async fn timelapse_print(root: &Path, webcam: &MockServer, keep_snapshots: bool) {
    let (port, tail_reached) = firmware(vec![Script {
        statuses: vec![PRINTING, LAYER, LAYER, IDLE],
        file: "/gcodes/test.gcode",
        tail: Tail::Idle,
    }])
    .await;

    let capture = CaptureTrigger::from_config(&WebcamConfig {
        url: Url::parse(&format!("{}/snapshot", webcam.uri())).unwrap(),
        auth: None,
        tls: TlsMode::System,
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let assembler = VideoAssembler::new(VideoConfig {
        program: "true".into(),
        keep_snapshots,
        ..VideoConfig::default()
    });
    let handler = TimelapseHandler::new(capture, Some(assembler));
    let cancel = CancellationToken::new();

    let supervisor = SessionSupervisor::new(printer(port), root, handler, cancel.clone());
    let task = tokio::spawn(supervisor.run());

    tokio::time::timeout(WAIT, tail_reached.notified()).await.unwrap();
    cancel.cancel();
    let handler = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    handler.shutdown().await;
}

fn count_jpegs(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "jpg"))
        .count()
}

fn run_dirs(root: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.is_dir())
        .collect()
}

#[cfg(unix)]
#[tokio::test]
async fn finished_print_encodes_and_removes_snapshots() {
    let root = tempfile::tempdir().unwrap();
    let webcam = jpeg_webcam().await;
    timelapse_print(root.path(), &webcam, false).await;

    assert!(run_dirs(root.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn keep_snapshots_leaves_one_jpeg_per_layer() {
    let root = tempfile::tempdir().unwrap();
    let webcam = jpeg_webcam().await;
    timelapse_print(root.path(), &webcam, true).await;

    let dirs = run_dirs(root.path());
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].to_string_lossy().ends_with("-test"));
    assert_eq!(count_jpegs(&dirs[0]), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn failed_snapshot_keeps_polling_and_captures_the_next_layer() {
    let webcam = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/snapshot"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .up_to_n_times(1)
        .expect(1)
        .mount(&webcam)
        .await;
    Mock::given(method("GET"))
        .and(path("/snapshot"))
        .respond_with(jpeg())
        .expect(1)
        .mount(&webcam)
        .await;

    let root = tempfile::tempdir().unwrap();
    timelapse_print(root.path(), &webcam, false).await;

    // The 200 expectation proves the second layer was captured; the removed
    // directory proves the finished print was encoded.
    assert!(run_dirs(root.path()).is_empty());
}
