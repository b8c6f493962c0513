//! Webcam HUD window
//!
//! Borderless, always-on-top square window that hosts the webcam preview
//! surface, the elapsed-time readout and the stop button. Resizing is
//! ratio-locked through [`WindowSizing`]; pointer input is limited to the
//! padded area around the stop button through [`InteractiveRegions`], so the
//! rest of the window drags.

use crate::region::{InteractiveRegions, LogicalBounds};
use crate::sizing::{SizingSpec, WindowSizing};
use crate::timer::RecordingTimer;
use crate::OverlayResult;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::Arc;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateFontW, CreateSolidBrush, DeleteObject, EndPaint, InvalidateRect,
    SelectObject, SetBkMode, SetTextColor, TextOutW, CLIP_DEFAULT_PRECIS, DEFAULT_CHARSET,
    DEFAULT_PITCH, DEFAULT_QUALITY, FF_SWISS, FW_BOLD, OUT_DEFAULT_PRECIS, PAINTSTRUCT,
    TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, GetClientRect, KillTimer, LoadCursorW, PostMessageW,
    RegisterClassExW, SetTimer, SetWindowPos, ShowWindow, BS_PUSHBUTTON, CS_HREDRAW, CS_VREDRAW,
    HMENU, HWND_TOPMOST, IDC_ARROW, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SW_HIDE, SW_SHOW,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_COMMAND, WM_DESTROY, WM_DPICHANGED, WM_PAINT, WM_SIZE,
    WM_TIMER, WM_USER, WNDCLASSEXW, WS_CHILD, WS_EX_TOPMOST, WS_POPUP, WS_THICKFRAME,
};

const WINDOW_SIZE: i32 = 600;
const MIN_WIDTH: i32 = 300;
const MAX_WIDTH: i32 = 1200;
const RATIO: (i32, i32) = (1, 1);

const ID_BTN_STOP: u16 = 301;
const BTN_WIDTH: i32 = 96;
const BTN_HEIGHT: i32 = 40;
const BTN_MARGIN_BOTTOM: i32 = 24;

const TIMER_ID: usize = 1;
const TIMER_INTERVAL_MS: u32 = 1000;

/// Posted by the recorder wiring when a session starts.
pub const WM_APP_HUD_BEGIN: u32 = WM_USER + 110;
/// Posted when a session ends, whatever the outcome.
pub const WM_APP_HUD_END: u32 = WM_USER + 111;

pub struct HudState {
    pub timer: RecordingTimer,
    pub recording: bool,
    pub btn_stop: isize,
    pub on_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

static HUD_STATE: OnceCell<Arc<Mutex<HudState>>> = OnceCell::new();

thread_local! {
    static REGIONS: RefCell<Option<InteractiveRegions>> = RefCell::new(None);
}

fn isize_to_hwnd(value: isize) -> HWND {
    HWND(value as *mut std::ffi::c_void)
}

pub struct WebcamWindow {
    hwnd: HWND,
    _sizing: WindowSizing,
}

impl WebcamWindow {
    const CLASS_NAME: PCWSTR = w!("FlexCapWebcam");

    pub fn create() -> OverlayResult<(Self, Arc<Mutex<HudState>>)> {
        let state = Arc::new(Mutex::new(HudState {
            timer: RecordingTimer::new(),
            recording: false,
            btn_stop: 0,
            on_stop: None,
        }));
        let _ = HUD_STATE.set(state.clone());

        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);

            let bg_brush = CreateSolidBrush(COLORREF(0x00201815));
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(Self::wnd_proc),
                hInstance: hinstance,
                hCursor: LoadCursorW(None, IDC_ARROW)?,
                hbrBackground: bg_brush,
                lpszClassName: Self::CLASS_NAME,
                ..Default::default()
            };
            RegisterClassExW(&wc);

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST,
                Self::CLASS_NAME,
                w!("FlexCap Webcam"),
                WS_POPUP | WS_THICKFRAME,
                80,
                80,
                WINDOW_SIZE,
                WINDOW_SIZE,
                HWND::default(),
                HMENU::default(),
                hinstance,
                None,
            )?;

            let mut client = RECT::default();
            let _ = GetClientRect(hwnd, &mut client);
            let (btn_x, btn_y) = stop_button_origin(client.right, client.bottom);
            let btn_stop = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("BUTTON"),
                w!("Stop"),
                WS_CHILD | WINDOW_STYLE(BS_PUSHBUTTON as u32),
                btn_x,
                btn_y,
                BTN_WIDTH,
                BTN_HEIGHT,
                hwnd,
                HMENU(ID_BTN_STOP as _),
                hinstance,
                None,
            )?;
            state.lock().btn_stop = btn_stop.0 as isize;

            let sizing = WindowSizing::install(
                hwnd,
                SizingSpec {
                    min_width: MIN_WIDTH,
                    max_width: MAX_WIDTH,
                    ratio: RATIO,
                },
            )?;
            let regions = InteractiveRegions::install(hwnd)?;
            REGIONS.with(|slot| *slot.borrow_mut() = Some(regions));
            Self::refresh_interactive_region(hwnd);

            stay_on_top(hwnd);

            Ok((Self { hwnd, _sizing: sizing }, state))
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn show(&self) {
        unsafe {
            ShowWindow(self.hwnd, SW_SHOW);
        }
    }

    /// Republish the interactive region from the stop button's current
    /// bounds and the window's DPI scale. Stale regions silently desync
    /// pointer input from the rendered button.
    fn refresh_interactive_region(hwnd: HWND) {
        let mut client = RECT::default();
        unsafe {
            let _ = GetClientRect(hwnd, &mut client);
        }
        let (x, y) = stop_button_origin(client.right, client.bottom);

        let dpi_scale = unsafe { GetDpiForWindow(hwnd) } as f64 / 96.0;
        if dpi_scale <= 0.0 {
            return;
        }
        let bounds = LogicalBounds {
            x: x as f64 / dpi_scale,
            y: y as f64 / dpi_scale,
            width: BTN_WIDTH as f64 / dpi_scale,
            height: BTN_HEIGHT as f64 / dpi_scale,
        };
        REGIONS.with(|slot| {
            if let Some(ref regions) = *slot.borrow() {
                regions.update_from_control(bounds, dpi_scale);
            }
        });
    }

    unsafe extern "system" fn wnd_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_SIZE => {
                let width = (lparam.0 & 0xFFFF) as i32;
                let height = ((lparam.0 >> 16) & 0xFFFF) as i32;
                if let Some(state) = HUD_STATE.get() {
                    let btn_stop = state.lock().btn_stop;
                    if btn_stop != 0 {
                        let (x, y) = stop_button_origin(width, height);
                        let _ = SetWindowPos(
                            isize_to_hwnd(btn_stop),
                            HWND::default(),
                            x,
                            y,
                            BTN_WIDTH,
                            BTN_HEIGHT,
                            SWP_NOZORDER,
                        );
                    }
                }
                Self::refresh_interactive_region(hwnd);
                LRESULT(0)
            }

            WM_DPICHANGED => {
                Self::refresh_interactive_region(hwnd);
                LRESULT(0)
            }

            WM_TIMER if wparam.0 == TIMER_ID => {
                if let Some(state) = HUD_STATE.get() {
                    state.lock().timer.tick();
                }
                let _ = InvalidateRect(hwnd, None, true);
                LRESULT(0)
            }

            WM_PAINT => {
                Self::on_paint(hwnd);
                LRESULT(0)
            }

            WM_COMMAND => {
                let id = (wparam.0 & 0xFFFF) as u16;
                if id == ID_BTN_STOP {
                    if let Some(state) = HUD_STATE.get() {
                        // clone the callback so it runs outside the lock
                        let callback = { state.lock().on_stop.clone() };
                        if let Some(cb) = callback {
                            cb();
                        }
                    }
                }
                LRESULT(0)
            }

            WM_APP_HUD_BEGIN => {
                if let Some(state) = HUD_STATE.get() {
                    let btn_stop = {
                        let mut state = state.lock();
                        state.timer.reset();
                        state.recording = true;
                        state.btn_stop
                    };
                    if btn_stop != 0 {
                        ShowWindow(isize_to_hwnd(btn_stop), SW_SHOW);
                    }
                }
                SetTimer(hwnd, TIMER_ID, TIMER_INTERVAL_MS, None);
                let _ = InvalidateRect(hwnd, None, true);
                LRESULT(0)
            }

            WM_APP_HUD_END => {
                let _ = KillTimer(hwnd, TIMER_ID);
                if let Some(state) = HUD_STATE.get() {
                    let btn_stop = {
                        let mut state = state.lock();
                        state.recording = false;
                        state.btn_stop
                    };
                    if btn_stop != 0 {
                        ShowWindow(isize_to_hwnd(btn_stop), SW_HIDE);
                    }
                }
                let _ = InvalidateRect(hwnd, None, true);
                LRESULT(0)
            }

            WM_DESTROY => LRESULT(0),

            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }

    unsafe fn on_paint(hwnd: HWND) {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);

        if let Some(state) = HUD_STATE.get() {
            let (recording, display) = {
                let state = state.lock();
                (state.recording, state.timer.display())
            };

            if recording {
                let font = CreateFontW(
                    32,
                    0,
                    0,
                    0,
                    FW_BOLD.0 as i32,
                    0,
                    0,
                    0,
                    DEFAULT_CHARSET.0 as u32,
                    OUT_DEFAULT_PRECIS.0 as u32,
                    CLIP_DEFAULT_PRECIS.0 as u32,
                    DEFAULT_QUALITY.0 as u32,
                    (DEFAULT_PITCH.0 | FF_SWISS.0) as u32,
                    w!("Segoe UI"),
                );
                let old_font = SelectObject(hdc, font);
                SetBkMode(hdc, TRANSPARENT);
                SetTextColor(hdc, COLORREF(0x00FFFFFF));

                let text: Vec<u16> = display.encode_utf16().collect();
                let _ = TextOutW(hdc, 24, 24, &text);

                SelectObject(hdc, old_font);
                DeleteObject(font);
            }
        }

        let _ = EndPaint(hwnd, &ps);
    }
}

fn stop_button_origin(client_width: i32, client_height: i32) -> (i32, i32) {
    (
        (client_width - BTN_WIDTH) / 2,
        client_height - BTN_HEIGHT - BTN_MARGIN_BOTTOM,
    )
}

/// Keep a window above every non-topmost window.
pub fn stay_on_top(hwnd: HWND) {
    unsafe {
        let _ = SetWindowPos(hwnd, HWND_TOPMOST, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE);
    }
}

/// Tell the HUD a recording session started.
pub fn post_begin_recording(hwnd: HWND) {
    unsafe {
        let _ = PostMessageW(hwnd, WM_APP_HUD_BEGIN, WPARAM(0), LPARAM(0));
    }
}

/// Tell the HUD the session ended, whatever the outcome.
pub fn post_end_recording(hwnd: HWND) {
    unsafe {
        let _ = PostMessageW(hwnd, WM_APP_HUD_END, WPARAM(0), LPARAM(0));
    }
}
