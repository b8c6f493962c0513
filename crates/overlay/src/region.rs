//! Interactive regions for the click-through HUD
//!
//! The HUD is draggable everywhere except a padded rectangle around its stop
//! button. The published region set feeds a hit-test handler: points inside
//! any region hit-test as client area, the rest of the body as caption so the
//! window drags. Regions go stale the moment the control moves or the DPI
//! scale changes, so they are recomputed on every layout-affecting event.

use crate::{hook::WindowProcHook, OverlayResult};
use parking_lot::Mutex;
use std::sync::Arc;
use windows::Win32::Foundation::{HWND, LRESULT, POINT};
use windows::Win32::Graphics::Gdi::ScreenToClient;
use windows::Win32::UI::WindowsAndMessaging::{DefWindowProcW, HTCAPTION, HTCLIENT, WM_NCHITTEST};

/// Extra interactive slack around a control, in logical units per side.
pub const DEFAULT_PADDING: f64 = 20.0;

/// Control bounds in layout (logical) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in physical pixels, client-relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Pad a control's bounds and convert to physical pixels.
pub fn interactive_rect(bounds: LogicalBounds, dpi_scale: f64, padding: f64) -> PixelRect {
    PixelRect {
        x: ((bounds.x - padding) * dpi_scale) as i32,
        y: ((bounds.y - padding) * dpi_scale) as i32,
        width: ((bounds.width + padding * 2.0) * dpi_scale) as i32,
        height: ((bounds.height + padding * 2.0) * dpi_scale) as i32,
    }
}

/// Published interactive region set for one window.
pub struct InteractiveRegions {
    regions: Arc<Mutex<Vec<PixelRect>>>,
    _hook: WindowProcHook,
}

impl InteractiveRegions {
    pub fn install(hwnd: HWND) -> OverlayResult<Self> {
        let regions: Arc<Mutex<Vec<PixelRect>>> = Arc::new(Mutex::new(Vec::new()));
        let shared = regions.clone();
        let hook = WindowProcHook::install(
            hwnd,
            Box::new(move |hwnd, msg, wparam, lparam| {
                if msg != WM_NCHITTEST {
                    return None;
                }
                // let the default hit test keep resize borders working; only
                // body hits are reclassified
                let hit = unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
                if hit.0 != HTCLIENT as isize {
                    return Some(hit);
                }

                let screen_x = (lparam.0 & 0xFFFF) as i16 as i32;
                let screen_y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
                let mut point = POINT {
                    x: screen_x,
                    y: screen_y,
                };
                unsafe {
                    let _ = ScreenToClient(hwnd, &mut point);
                }

                if shared.lock().iter().any(|r| r.contains(point.x, point.y)) {
                    Some(LRESULT(HTCLIENT as isize))
                } else {
                    Some(LRESULT(HTCAPTION as isize))
                }
            }),
        )?;
        Ok(Self {
            regions,
            _hook: hook,
        })
    }

    /// Replace the published region set wholesale.
    pub fn publish(&self, regions: Vec<PixelRect>) {
        *self.regions.lock() = regions;
    }

    /// Recompute the sole interactive region from a control's bounds and the
    /// window's current DPI scale.
    pub fn update_from_control(&self, bounds: LogicalBounds, dpi_scale: f64) {
        self.publish(vec![interactive_rect(bounds, dpi_scale, DEFAULT_PADDING)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_and_scale_are_applied() {
        let bounds = LogicalBounds {
            x: 100.0,
            y: 200.0,
            width: 80.0,
            height: 40.0,
        };
        let rect = interactive_rect(bounds, 1.5, 20.0);
        assert_eq!(rect, PixelRect { x: 120, y: 270, width: 180, height: 120 });
    }

    #[test]
    fn fractional_pixels_truncate() {
        let bounds = LogicalBounds {
            x: 101.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        };
        let rect = interactive_rect(bounds, 1.25, 20.0);
        assert_eq!(rect.x, 101); // 81 * 1.25 = 101.25
        assert_eq!(rect.width, 112); // 90 * 1.25 = 112.5
    }

    #[test]
    fn containment_is_half_open() {
        let rect = PixelRect {
            x: 10,
            y: 10,
            width: 20,
            height: 20,
        };
        assert!(rect.contains(10, 10));
        assert!(rect.contains(29, 29));
        assert!(!rect.contains(30, 10));
        assert!(!rect.contains(9, 15));
    }
}
