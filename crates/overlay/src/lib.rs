//! Overlay window behavior for FlexCap
//!
//! The webcam HUD is a borderless, always-on-top window whose native
//! behavior is overridden through a window-procedure hook: resizing is
//! locked to an aspect ratio, and only the area around the stop button is
//! pointer-interactive while the rest of the window drags.

pub mod hook;
pub mod region;
pub mod sizing;
pub mod timer;
pub mod window;

pub use hook::{MessageHandler, WindowProcHook};
pub use region::{interactive_rect, InteractiveRegions, LogicalBounds, PixelRect};
pub use sizing::{SizingSpec, WindowRect, WindowSizing};
pub use timer::{format_elapsed, RecordingTimer};
pub use window::WebcamWindow;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("window procedure hook installation failed")]
    HookInstall,
}

pub type OverlayResult<T> = Result<T, OverlayError>;
