//! Recording session control
//!
//! Owns the capture engine and reconciles its asynchronous start-up, status
//! reporting and failure signals into one session state:
//!
//! `Idle → Configuring → Starting → Recording → Stopping → Idle`, with
//! `Failed` reachable from `Configuring`, `Starting` and `Recording` and
//! recoverable only through [`Recorder::reset`].
//!
//! All methods run on the recorder's owning thread; engine callbacks arrive
//! on the event channel and are applied by [`Recorder::drain_events`] on that
//! same thread.

use crossbeam_channel::Receiver;
use engine::{CaptureEngine, EngineError, EngineEvent, EngineStatus, RecordingConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Readiness polling cadence: the engine's start call returns before frames
/// flow, so the session is confirmed by polling engine status.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const READY_POLL_ATTEMPTS: u32 = 50;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("operation not valid while {0:?}")]
    InvalidState(RecordingState),

    #[error("engine did not reach recording status within {0:?}")]
    StartTimeout(Duration),

    #[error("engine failure: {0}")]
    EngineFailure(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Configuring,
    Starting,
    Recording,
    Stopping,
    Failed,
}

/// What a stop request actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(PathBuf),
    /// Nothing was active; logged as a warning, not an error
    NotRecording,
}

pub type EngineFactory =
    Box<dyn FnMut(&RecordingConfig) -> Result<Box<dyn CaptureEngine>, EngineError> + Send>;

pub struct Recorder {
    state: RecordingState,
    engine: Option<Box<dyn CaptureEngine>>,
    events: Option<Receiver<EngineEvent>>,
    output_path: Option<PathBuf>,
    started_at: Option<Instant>,
    /// Last engine-reported status; diagnostic mirror only
    engine_status: EngineStatus,
    factory: EngineFactory,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl Recorder {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            state: RecordingState::Idle,
            engine: None,
            events: None,
            output_path: None,
            started_at: None,
            engine_status: EngineStatus::Idle,
            factory,
            poll_interval: READY_POLL_INTERVAL,
            poll_attempts: READY_POLL_ATTEMPTS,
        }
    }

    /// Override the readiness polling cadence (tests).
    pub fn with_poll_policy(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.engine_status
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|at| at.elapsed())
    }

    /// Start a session. Valid only in `Idle`. A pre-existing file at
    /// `output` is deleted first; the overwrite is intentional.
    ///
    /// Blocks the calling thread while confirming readiness, sleeping
    /// between status polls; run it on the recorder's worker thread.
    pub fn request_start(
        &mut self,
        config: RecordingConfig,
        output: PathBuf,
    ) -> Result<(), RecorderError> {
        if self.state != RecordingState::Idle {
            return Err(RecorderError::InvalidState(self.state));
        }
        self.state = RecordingState::Configuring;
        info!(path = %output.display(), "starting recording session");

        // at most one live engine: the previous instance is dropped before a
        // replacement is constructed
        self.engine = None;
        self.events = None;

        if output.exists() {
            if let Err(e) = std::fs::remove_file(&output) {
                self.state = RecordingState::Failed;
                return Err(e.into());
            }
        }

        let mut engine = match (self.factory)(&config) {
            Ok(engine) => engine,
            Err(e) => {
                self.state = RecordingState::Failed;
                return Err(e.into());
            }
        };
        self.events = Some(engine.events());

        self.state = RecordingState::Starting;
        if let Err(e) = engine.start(&output) {
            self.state = RecordingState::Failed;
            self.events = None;
            return Err(e.into());
        }
        self.engine = Some(engine);
        self.output_path = Some(output);

        self.await_engine_ready()?;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Poll engine status until it reports recording or the attempt budget
    /// runs out. Engine events are applied between polls, so an asynchronous
    /// failure cuts the wait short.
    fn await_engine_ready(&mut self) -> Result<(), RecorderError> {
        for attempt in 0..self.poll_attempts {
            self.drain_events()?;
            let status = self.engine.as_ref().map(|engine| engine.status());
            if status == Some(EngineStatus::Recording) {
                self.engine_status = EngineStatus::Recording;
                debug!(attempt, "engine reached recording status");
                self.state = RecordingState::Recording;
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }

        let waited = self.poll_interval * self.poll_attempts;
        warn!(?waited, "engine never reached recording status");
        self.state = RecordingState::Failed;
        self.engine = None;
        self.events = None;
        Err(RecorderError::StartTimeout(waited))
    }

    /// Stop the active session. Valid in `Recording`; anywhere else it is a
    /// no-op reporting [`StopOutcome::NotRecording`]. The engine stop blocks
    /// until the output file is finalized, so the `Stopping → Idle`
    /// transition happens only after it returns.
    pub fn request_stop(&mut self) -> Result<StopOutcome, RecorderError> {
        if self.state != RecordingState::Recording {
            warn!(state = ?self.state, "stop requested with no active recording");
            return Ok(StopOutcome::NotRecording);
        }
        self.state = RecordingState::Stopping;

        let result = match self.engine.as_mut() {
            Some(engine) => engine.stop(),
            None => Ok(()),
        };
        self.engine = None;
        self.events = None;
        self.started_at = None;

        match result {
            Ok(()) => {
                self.state = RecordingState::Idle;
                let path = self.output_path.take().unwrap_or_default();
                info!(path = %path.display(), "recording stopped");
                Ok(StopOutcome::Stopped(path))
            }
            Err(e) => {
                self.state = RecordingState::Failed;
                Err(e.into())
            }
        }
    }

    /// Explicit recovery from `Failed`; a no-op in `Idle` and invalid while
    /// a session is active.
    pub fn reset(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecordingState::Idle => Ok(()),
            RecordingState::Failed => {
                self.engine = None;
                self.events = None;
                self.output_path = None;
                self.started_at = None;
                self.engine_status = EngineStatus::Idle;
                self.state = RecordingState::Idle;
                info!("session reset");
                Ok(())
            }
            state => Err(RecorderError::InvalidState(state)),
        }
    }

    /// Apply pending engine events. This is the single synchronized entry
    /// point for engine callbacks, whatever thread delivered them.
    pub fn drain_events(&mut self) -> Result<(), RecorderError> {
        let Some(events) = self.events.clone() else {
            return Ok(());
        };
        while let Ok(event) = events.try_recv() {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: EngineEvent) -> Result<(), RecorderError> {
        match event {
            EngineEvent::StatusChanged(status) => {
                // diagnostic only; primary transitions stay with the
                // start/stop requests
                self.engine_status = status;
                debug!(?status, "engine status");
                Ok(())
            }
            EngineEvent::Completed(path) => {
                info!(path = %path.display(), "engine completed");
                Ok(())
            }
            EngineEvent::Failed(reason) => {
                warn!(%reason, "engine failed");
                self.state = RecordingState::Failed;
                self.engine = None;
                self.events = None;
                Err(RecorderError::EngineFailure(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Sender};
    use engine::{DisplaySource, EngineResult};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    const FAST: Duration = Duration::from_millis(1);

    #[derive(Clone, Default)]
    struct Probes {
        calls: Arc<Mutex<Vec<&'static str>>>,
        polls: Arc<AtomicU32>,
        live: Arc<AtomicUsize>,
        event_tx: Arc<Mutex<Option<Sender<EngineEvent>>>>,
    }

    /// Scripted engine stand-in.
    struct FakeEngine {
        probes: Probes,
        /// status() reports Recording after this many polls once started
        ready_after_polls: Option<u32>,
        fail_start: bool,
        fail_event_on_start: Option<String>,
        started: bool,
        rx: Receiver<EngineEvent>,
    }

    impl FakeEngine {
        fn new(
            probes: Probes,
            ready_after_polls: Option<u32>,
            fail_start: bool,
            fail_event_on_start: Option<String>,
        ) -> Self {
            let (tx, rx) = unbounded();
            probes.live.fetch_add(1, Ordering::SeqCst);
            *probes.event_tx.lock() = Some(tx);
            Self {
                probes,
                ready_after_polls,
                fail_start,
                fail_event_on_start,
                started: false,
                rx,
            }
        }
    }

    impl CaptureEngine for FakeEngine {
        fn start(&mut self, _output: &Path) -> EngineResult<()> {
            self.probes.calls.lock().push("start");
            if self.fail_start {
                return Err(EngineError::Failed("spawn refused".to_string()));
            }
            if let Some(reason) = self.fail_event_on_start.take() {
                if let Some(tx) = self.probes.event_tx.lock().as_ref() {
                    let _ = tx.send(EngineEvent::Failed(reason));
                }
            }
            self.started = true;
            Ok(())
        }

        fn stop(&mut self) -> EngineResult<()> {
            self.probes.calls.lock().push("stop");
            Ok(())
        }

        fn status(&self) -> EngineStatus {
            self.probes.calls.lock().push("status");
            let polls = self.probes.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.started {
                return EngineStatus::Idle;
            }
            match self.ready_after_polls {
                Some(ready) if polls >= ready => EngineStatus::Recording,
                _ => EngineStatus::Idle,
            }
        }

        fn events(&self) -> Receiver<EngineEvent> {
            self.rx.clone()
        }
    }

    impl Drop for FakeEngine {
        fn drop(&mut self) {
            self.probes.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn config() -> RecordingConfig {
        RecordingConfig {
            displays: vec![DisplaySource {
                device_id: r"\\.\DISPLAY1".to_string(),
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            }],
            ..Default::default()
        }
    }

    fn recorder(probes: &Probes, ready_after_polls: Option<u32>) -> Recorder {
        let probes = probes.clone();
        let factory: EngineFactory = Box::new(move |_config| {
            Ok(Box::new(FakeEngine::new(probes.clone(), ready_after_polls, false, None)))
        });
        Recorder::new(factory).with_poll_policy(FAST, 50)
    }

    fn scratch_output() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("capture.mp4");
        (dir, path)
    }

    #[test]
    fn start_confirms_readiness_after_engine_start() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(3));
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output).expect("start");
        assert_eq!(recorder.state(), RecordingState::Recording);

        // readiness was observed by polling, never before the engine start
        let calls = probes.calls.lock();
        let first_status = calls.iter().position(|c| *c == "status").expect("polled");
        let start = calls.iter().position(|c| *c == "start").expect("started");
        assert!(start < first_status);
    }

    #[test]
    fn start_timeout_exhausts_the_attempt_budget() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, None);
        let (_dir, output) = scratch_output();

        match recorder.request_start(config(), output) {
            Err(RecorderError::StartTimeout(waited)) => {
                assert_eq!(waited, FAST * 50);
            }
            other => panic!("expected StartTimeout, got {other:?}"),
        }
        assert_eq!(recorder.state(), RecordingState::Failed);
        assert_eq!(probes.polls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn start_while_recording_is_invalid_and_leaves_state_alone() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output.clone()).expect("start");
        match recorder.request_start(config(), output) {
            Err(RecorderError::InvalidState(RecordingState::Recording)) => {}
            other => panic!("expected InvalidState(Recording), got {other:?}"),
        }
        assert_eq!(recorder.state(), RecordingState::Recording);
    }

    #[test]
    fn start_from_failed_requires_reset_first() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, None).with_poll_policy(FAST, 2);
        let (_dir, output) = scratch_output();

        assert!(recorder.request_start(config(), output.clone()).is_err());
        assert_eq!(recorder.state(), RecordingState::Failed);

        match recorder.request_start(config(), output.clone()) {
            Err(RecorderError::InvalidState(RecordingState::Failed)) => {}
            other => panic!("expected InvalidState(Failed), got {other:?}"),
        }

        recorder.reset().expect("reset");
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn stop_with_nothing_active_is_a_warning_not_an_error() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));

        assert_eq!(
            recorder.request_stop().expect("no-op stop"),
            StopOutcome::NotRecording
        );
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(!probes.calls.lock().iter().any(|c| *c == "stop"));
    }

    #[test]
    fn stop_returns_to_idle_only_through_the_engine_stop() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output.clone()).expect("start");
        match recorder.request_stop().expect("stop") {
            StopOutcome::Stopped(path) => assert_eq!(path, output),
            other => panic!("expected Stopped, got {other:?}"),
        }
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(
            probes.calls.lock().iter().filter(|c| **c == "stop").count(),
            1
        );

        // a second stop finds nothing active
        assert_eq!(
            recorder.request_stop().expect("no-op stop"),
            StopOutcome::NotRecording
        );
    }

    #[test]
    fn engine_failure_during_start_forces_failed() {
        let probes = Probes::default();
        let shared = probes.clone();
        let factory: EngineFactory = Box::new(move |_config| {
            Ok(Box::new(FakeEngine::new(
                shared.clone(),
                None,
                false,
                Some("device lost".to_string()),
            )))
        });
        let mut recorder = Recorder::new(factory).with_poll_policy(FAST, 50);
        let (_dir, output) = scratch_output();

        match recorder.request_start(config(), output) {
            Err(RecorderError::EngineFailure(reason)) => assert_eq!(reason, "device lost"),
            other => panic!("expected EngineFailure, got {other:?}"),
        }
        assert_eq!(recorder.state(), RecordingState::Failed);
    }

    #[test]
    fn engine_failure_while_recording_forces_failed() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output).expect("start");

        let tx = probes.event_tx.lock().clone().expect("event sender");
        tx.send(EngineEvent::Failed("encoder crashed".to_string()))
            .expect("send");

        match recorder.drain_events() {
            Err(RecorderError::EngineFailure(_)) => {}
            other => panic!("expected EngineFailure, got {other:?}"),
        }
        assert_eq!(recorder.state(), RecordingState::Failed);
    }

    #[test]
    fn failed_engine_start_is_surfaced() {
        let probes = Probes::default();
        let shared = probes.clone();
        let factory: EngineFactory = Box::new(move |_config| {
            Ok(Box::new(FakeEngine::new(shared.clone(), None, true, None)))
        });
        let mut recorder = Recorder::new(factory).with_poll_policy(FAST, 50);
        let (_dir, output) = scratch_output();

        assert!(matches!(
            recorder.request_start(config(), output),
            Err(RecorderError::Engine(EngineError::Failed(_)))
        ));
        assert_eq!(recorder.state(), RecordingState::Failed);
    }

    #[test]
    fn pre_existing_output_is_deleted() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));
        let (_dir, output) = scratch_output();
        std::fs::write(&output, b"stale").expect("seed file");

        recorder.request_start(config(), output.clone()).expect("start");
        assert!(!output.exists());
    }

    #[test]
    fn replacement_engine_is_built_only_after_the_old_one_is_gone() {
        let probes = Probes::default();
        let shared = probes.clone();
        let factory: EngineFactory = Box::new(move |_config| {
            assert_eq!(
                shared.live.load(Ordering::SeqCst),
                0,
                "previous engine still alive"
            );
            Ok(Box::new(FakeEngine::new(shared.clone(), Some(1), false, None)))
        });
        let mut recorder = Recorder::new(factory).with_poll_policy(FAST, 50);
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output.clone()).expect("first start");
        recorder.request_stop().expect("stop");
        recorder.request_start(config(), output).expect("second start");
        assert_eq!(probes.live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_is_rejected_while_a_session_is_active() {
        let probes = Probes::default();
        let mut recorder = recorder(&probes, Some(1));
        let (_dir, output) = scratch_output();

        recorder.request_start(config(), output).expect("start");
        assert!(matches!(
            recorder.reset(),
            Err(RecorderError::InvalidState(RecordingState::Recording))
        ));
    }
}
