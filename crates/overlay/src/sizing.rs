//! Aspect-ratio-locked resize policy
//!
//! Intercepts resize-in-progress messages and rewrites the proposed window
//! rectangle so width:height stays at a fixed ratio within width bounds.
//! The recompute direction follows the dragged edge: horizontal drags make
//! width authoritative, everything else makes height authoritative. Both
//! directions truncate; recomputing more than once per direction per message
//! would let the ratio drift under repeated mixed-edge drags.

use crate::{hook::WindowProcHook, OverlayResult};
use windows::Win32::Foundation::{HWND, LRESULT, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    WMSZ_BOTTOM, WMSZ_BOTTOMLEFT, WMSZ_BOTTOMRIGHT, WMSZ_LEFT, WMSZ_RIGHT, WMSZ_TOP,
    WMSZ_TOPLEFT, WMSZ_TOPRIGHT, WM_SIZING,
};

/// Window rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn set_width(&mut self, width: i32) {
        self.right = self.left + width;
    }

    pub fn set_height(&mut self, height: i32) {
        self.bottom = self.top + height;
    }

    fn adjust_height(&mut self, ratio: (i32, i32)) {
        self.set_height(self.width() * ratio.1 / ratio.0);
    }

    fn adjust_width(&mut self, ratio: (i32, i32)) {
        self.set_width(self.height() * ratio.0 / ratio.1);
    }
}

impl From<RECT> for WindowRect {
    fn from(rect: RECT) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }
}

impl From<WindowRect> for RECT {
    fn from(rect: WindowRect) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }
}

/// Resize policy: width bounds and the width:height ratio to preserve.
#[derive(Debug, Clone, Copy)]
pub struct SizingSpec {
    pub min_width: i32,
    pub max_width: i32,
    pub ratio: (i32, i32),
}

/// Which edge or corner a resize drag grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Left,
    Right,
    Top,
    TopLeft,
    TopRight,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    pub fn from_wparam(value: usize) -> Option<Self> {
        match value as u32 {
            WMSZ_LEFT => Some(Self::Left),
            WMSZ_RIGHT => Some(Self::Right),
            WMSZ_TOP => Some(Self::Top),
            WMSZ_TOPLEFT => Some(Self::TopLeft),
            WMSZ_TOPRIGHT => Some(Self::TopRight),
            WMSZ_BOTTOM => Some(Self::Bottom),
            WMSZ_BOTTOMLEFT => Some(Self::BottomLeft),
            WMSZ_BOTTOMRIGHT => Some(Self::BottomRight),
            _ => None,
        }
    }

    fn width_is_authoritative(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Rewrite a proposed rectangle to honor the ratio and width bounds.
pub fn constrain(rect: &mut WindowRect, edge: ResizeEdge, spec: &SizingSpec) {
    if edge.width_is_authoritative() {
        rect.adjust_height(spec.ratio);
    } else {
        rect.adjust_width(spec.ratio);
    }

    if rect.width() < spec.min_width {
        rect.set_width(spec.min_width);
        rect.adjust_height(spec.ratio);
    } else if rect.width() > spec.max_width {
        rect.set_width(spec.max_width);
        rect.adjust_height(spec.ratio);
    }
}

/// Installed resize policy; dropping it restores default resize behavior.
pub struct WindowSizing {
    _hook: WindowProcHook,
}

impl WindowSizing {
    pub fn install(hwnd: HWND, spec: SizingSpec) -> OverlayResult<Self> {
        let hook = WindowProcHook::install(
            hwnd,
            Box::new(move |_hwnd, msg, wparam, lparam| {
                if msg != WM_SIZING {
                    return None;
                }
                let Some(edge) = ResizeEdge::from_wparam(wparam.0) else {
                    return None;
                };
                // lparam carries the proposed RECT; this is the single
                // boundary conversion for the ratio math
                let raw = unsafe { &mut *(lparam.0 as *mut RECT) };
                let mut rect = WindowRect::from(*raw);
                constrain(&mut rect, edge, &spec);
                *raw = rect.into();
                Some(LRESULT(1))
            }),
        )?;
        Ok(Self { _hook: hook })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(left: i32, top: i32, width: i32, height: i32) -> WindowRect {
        WindowRect {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    fn spec(min: i32, max: i32, ratio: (i32, i32)) -> SizingSpec {
        SizingSpec {
            min_width: min,
            max_width: max,
            ratio,
        }
    }

    #[test]
    fn horizontal_drags_rederive_height_from_width() {
        for ratio in [(16, 9), (4, 3), (1, 1), (21, 9)] {
            for width in [320, 501, 777, 1100] {
                for edge in [ResizeEdge::Left, ResizeEdge::Right] {
                    let mut r = rect(10, 20, width, 333);
                    constrain(&mut r, edge, &spec(100, 2000, ratio));
                    assert_eq!(r.width(), width);
                    assert_eq!(r.height(), width * ratio.1 / ratio.0);
                }
            }
        }
    }

    #[test]
    fn vertical_drags_rederive_width_from_height() {
        for ratio in [(16, 9), (4, 3), (1, 1)] {
            for height in [240, 487, 900] {
                for edge in [ResizeEdge::Top, ResizeEdge::Bottom] {
                    let mut r = rect(0, 0, 555, height);
                    constrain(&mut r, edge, &spec(100, 5000, ratio));
                    assert_eq!(r.height(), height);
                    assert_eq!(r.width(), height * ratio.0 / ratio.1);
                }
            }
        }
    }

    #[test]
    fn corner_drags_treat_height_as_authoritative() {
        let mut r = rect(0, 0, 100, 450);
        constrain(&mut r, ResizeEdge::BottomRight, &spec(100, 2000, (16, 9)));
        assert_eq!(r.height(), 450);
        assert_eq!(r.width(), 800);
    }

    #[test]
    fn narrow_drag_clamps_to_min_width_and_rederives_height() {
        let mut r = rect(50, 50, 200, 112);
        constrain(&mut r, ResizeEdge::Left, &spec(300, 1200, (16, 9)));
        assert_eq!(r.width(), 300);
        assert_eq!(r.height(), 300 * 9 / 16);
    }

    #[test]
    fn wide_drag_clamps_to_max_width_and_rederives_height() {
        let mut r = rect(0, 0, 4000, 2250);
        constrain(&mut r, ResizeEdge::Right, &spec(300, 1200, (16, 9)));
        assert_eq!(r.width(), 1200);
        assert_eq!(r.height(), 1200 * 9 / 16);
    }

    #[test]
    fn clamped_short_height_also_snaps_back_to_ratio() {
        // a top-edge drag proposing a tiny height derives a tiny width,
        // which the min bound pushes back out
        let mut r = rect(0, 0, 600, 90);
        constrain(&mut r, ResizeEdge::Top, &spec(300, 1200, (16, 9)));
        assert_eq!(r.width(), 300);
        assert_eq!(r.height(), 300 * 9 / 16);
    }

    #[test]
    fn anchors_stay_on_the_top_left() {
        let mut r = rect(-400, 35, 640, 480);
        constrain(&mut r, ResizeEdge::Right, &spec(100, 2000, (4, 3)));
        assert_eq!((r.left, r.top), (-400, 35));
    }

    #[test]
    fn unknown_edge_values_are_declined() {
        assert_eq!(ResizeEdge::from_wparam(0), None);
        assert_eq!(ResizeEdge::from_wparam(99), None);
    }
}
