//! Device enumeration and webcam preview for FlexCap
//!
//! [`DeviceCatalog`] is a read-only query service over the platform's capture
//! devices and display outputs; [`PreviewSession`] owns the webcam preview
//! pipeline lifecycle.

pub mod catalog;
pub mod preview;

pub use catalog::DeviceCatalog;
pub use preview::PreviewSession;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("no video frame source on device {0}")]
    NoFrameSource(String),

    #[error("unknown display: {0}")]
    UnknownDisplay(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Capture-capable device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoCapture,
    AudioCapture,
    AudioRender,
    Display,
}

/// One enumerated device; replaced wholesale on re-enumeration.
#[derive(Debug, Clone)]
pub struct Device {
    /// Opaque platform identifier
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
}

/// A display output with its current pixel geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTarget {
    pub device_id: String,
    /// Desktop origin of the display
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
