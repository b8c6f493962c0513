//! Capture engine boundary for FlexCap
//!
//! Defines the recording configuration, the engine status/event surface and
//! the [`CaptureEngine`] trait, plus the production ffmpeg-backed engine.
//! Everything behind [`CaptureEngine::start`] is a black box to callers: they
//! poll [`CaptureEngine::status`] or watch the event channel.

pub mod command;
pub mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder binary not found: {0}")]
    EncoderMissing(String),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine not started")]
    NotStarted,

    #[error("engine failure: {0}")]
    Failed(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Rectangle in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Engine status, polled by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Created or start still warming up
    Idle,
    /// Frames are flowing into the output file
    Recording,
    /// Stop requested, output being finalized
    Finishing,
}

/// Asynchronous engine signals, delivered on the event channel
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StatusChanged(EngineStatus),
    /// Output file finalized at the given path
    Completed(PathBuf),
    /// Engine-supplied failure description
    Failed(String),
}

/// A display to capture, addressed as an offset into the virtual desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySource {
    /// Platform device name, e.g. `\\.\DISPLAY1`
    pub device_id: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Immutable per-session recording configuration.
///
/// Built fresh from the current UI selections on every start request; device
/// changes while a session is live only affect the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    pub displays: Vec<DisplaySource>,
    /// Output frame size; `None` keeps the source size
    pub output_size: Option<(u32, u32)>,
    /// Crop applied to the stitched source before scaling
    pub crop: Option<Rect>,
    pub bitrate_kbps: u32,
    pub frame_rate: u32,
    pub hardware_encoding: bool,
    pub capture_microphone: bool,
    pub microphone_id: Option<String>,
    pub capture_system_audio: bool,
    pub system_audio_id: Option<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            displays: Vec::new(),
            output_size: None,
            crop: None,
            bitrate_kbps: 8000,
            frame_rate: 30,
            hardware_encoding: true,
            capture_microphone: false,
            microphone_id: None,
            capture_system_audio: false,
            system_audio_id: None,
        }
    }
}

/// External capture engine boundary.
///
/// `start` returns before the engine actually produces frames; readiness is
/// observed through `status` or the event channel. `stop` blocks until the
/// output file is finalized.
pub trait CaptureEngine: Send {
    fn start(&mut self, output: &Path) -> EngineResult<()>;
    fn stop(&mut self) -> EngineResult<()>;
    fn status(&self) -> EngineStatus;
    fn events(&self) -> Receiver<EngineEvent>;
}
