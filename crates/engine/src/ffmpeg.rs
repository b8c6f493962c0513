//! ffmpeg-backed capture engine
//!
//! Spawns the encoder as a child process and derives status and events from
//! its stderr progress stream: the first `frame=` line marks the engine as
//! recording, an abnormal exit surfaces as a failure event carrying the
//! stderr tail. Stop writes `q` to the child and waits for the muxer to
//! finalize the file.

use crate::command::build_args;
use crate::{
    CaptureEngine, EngineError, EngineEvent, EngineResult, EngineStatus, RecordingConfig,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 12;

pub struct FfmpegEngine {
    config: RecordingConfig,
    binary: PathBuf,
    child: Arc<Mutex<Option<Child>>>,
    status: Arc<Mutex<EngineStatus>>,
    stopping: Arc<AtomicBool>,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
    stderr_thread: Option<JoinHandle<()>>,
    output: Option<PathBuf>,
}

impl FfmpegEngine {
    pub fn new(config: RecordingConfig) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            config,
            binary: resolve_binary(),
            child: Arc::new(Mutex::new(None)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            stopping: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx,
            stderr_thread: None,
            output: None,
        }
    }

    /// Override the encoder binary (tests, portable installs).
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

fn resolve_binary() -> PathBuf {
    std::env::var_os("FLEXCAP_FFMPEG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

fn publish_status(slot: &Mutex<EngineStatus>, tx: &Sender<EngineEvent>, status: EngineStatus) {
    let mut current = slot.lock();
    if *current != status {
        *current = status;
        let _ = tx.send(EngineEvent::StatusChanged(status));
    }
}

impl CaptureEngine for FfmpegEngine {
    fn start(&mut self, output: &Path) -> EngineResult<()> {
        if self.child.lock().is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let args = build_args(&self.config, output);
        debug!(binary = %self.binary.display(), "spawning encoder");
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::EncoderMissing(self.binary.display().to_string())
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child.stderr.take();
        *self.child.lock() = Some(child);
        self.output = Some(output.to_path_buf());

        if let Some(stderr) = stderr {
            let status = self.status.clone();
            let tx = self.event_tx.clone();
            let stopping = self.stopping.clone();
            let child_slot = self.child.clone();
            self.stderr_thread = Some(std::thread::spawn(move || {
                let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    if line.contains("frame=") {
                        publish_status(&status, &tx, EngineStatus::Recording);
                    } else {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }

                // stderr closed: either a requested stop or the process died
                if stopping.load(Ordering::SeqCst) {
                    return;
                }
                let Some(mut child) = child_slot.lock().take() else {
                    return;
                };
                match child.wait() {
                    Ok(exit) if exit.success() => {}
                    Ok(exit) => {
                        warn!(%exit, "encoder exited abnormally");
                        publish_status(&status, &tx, EngineStatus::Idle);
                        let reason: Vec<String> = tail.into();
                        let _ = tx.send(EngineEvent::Failed(format!(
                            "encoder exited with {exit}: {}",
                            reason.join(" | ")
                        )));
                    }
                    Err(e) => {
                        let _ = tx.send(EngineEvent::Failed(format!(
                            "wait on encoder failed: {e}"
                        )));
                    }
                }
            }));
        }

        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.stopping.store(true, Ordering::SeqCst);
        let child = self.child.lock().take();
        let Some(mut child) = child else {
            return Err(EngineError::NotStarted);
        };

        publish_status(&self.status, &self.event_tx, EngineStatus::Finishing);
        if let Some(mut stdin) = child.stdin.take() {
            // graceful quit so the muxer writes its trailer
            let _ = stdin.write_all(b"q\n");
        }
        let exit = child.wait()?;
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
        publish_status(&self.status, &self.event_tx, EngineStatus::Idle);

        if exit.success() {
            if let Some(path) = self.output.clone() {
                let _ = self.event_tx.send(EngineEvent::Completed(path));
            }
            Ok(())
        } else {
            let reason = format!("encoder exited with {exit}");
            let _ = self.event_tx.send(EngineEvent::Failed(reason.clone()));
            Err(EngineError::Failed(reason))
        }
    }

    fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisplaySource;

    fn config() -> RecordingConfig {
        RecordingConfig {
            displays: vec![DisplaySource {
                device_id: r"\\.\DISPLAY1".to_string(),
                x: 0,
                y: 0,
                width: 640,
                height: 480,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn fresh_engine_is_idle() {
        let engine = FfmpegEngine::new(config());
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine =
            FfmpegEngine::new(config()).with_binary(dir.path().join("no-such-encoder"));
        match engine.start(&dir.path().join("out.mp4")) {
            Err(EngineError::EncoderMissing(_)) => {}
            other => panic!("expected EncoderMissing, got {other:?}"),
        }
    }

    #[test]
    fn stop_without_start_is_rejected() {
        let mut engine = FfmpegEngine::new(config());
        assert!(matches!(engine.stop(), Err(EngineError::NotStarted)));
    }
}
