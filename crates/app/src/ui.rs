//! Main panel UI
//!
//! Device selectors, the record button and a status line. Selection changes
//! are forwarded through callbacks; recording state changes arrive as a
//! posted message so worker threads never touch the controls directly.

use devices::{Device, DeviceCatalog, DeviceKind};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateFontW, CreateSolidBrush, DeleteObject, EndPaint, InvalidateRect,
    SelectObject, SetBkMode, SetTextColor, TextOutW, CLIP_DEFAULT_PRECIS, DEFAULT_CHARSET,
    DEFAULT_PITCH, DEFAULT_QUALITY, FF_SWISS, FW_BOLD, FW_NORMAL, OUT_DEFAULT_PRECIS,
    PAINTSTRUCT, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, GetSystemMetrics,
    LoadCursorW, PostMessageW, PostQuitMessage, RegisterClassExW, SendMessageW, SetWindowTextW,
    ShowWindow, TranslateMessage, BN_CLICKED, BS_PUSHBUTTON, CBN_SELCHANGE, CBS_DROPDOWNLIST,
    CB_ADDSTRING, CB_GETCURSEL, CB_SETCURSEL, CS_HREDRAW, CS_VREDRAW, HMENU, IDC_ARROW, MSG,
    SM_CXSCREEN, SM_CYSCREEN, SW_SHOW, WINDOW_EX_STYLE, WINDOW_STYLE, WM_COMMAND, WM_DESTROY,
    WM_PAINT, WM_USER, WNDCLASSEXW, WS_CAPTION, WS_CHILD, WS_EX_TOPMOST, WS_MINIMIZEBOX,
    WS_OVERLAPPED, WS_SYSMENU, WS_VISIBLE, WS_VSCROLL,
};

const WINDOW_WIDTH: i32 = 520;
const WINDOW_HEIGHT: i32 = 280;

const ID_COMBO_CAMERA: u16 = 201;
const ID_COMBO_MICROPHONE: u16 = 202;
const ID_COMBO_DISPLAY: u16 = 203;
const ID_BTN_RECORD: u16 = 204;

const LABEL_X: i32 = 24;
const CONTROL_X: i32 = 140;
const CONTROL_WIDTH: i32 = 340;
const ROW_HEIGHT: i32 = 40;
const FIRST_ROW_Y: i32 = 20;
const BTN_WIDTH: i32 = 180;
const BTN_HEIGHT: i32 = 40;

/// Posted by worker threads after mutating [`UiState`].
pub const WM_APP_UPDATE_STATE: u32 = WM_USER + 100;

static UI_STATE: OnceCell<Arc<Mutex<UiState>>> = OnceCell::new();

pub struct UiState {
    pub cameras: Vec<Device>,
    pub microphones: Vec<Device>,
    pub displays: Vec<Device>,
    pub selected_camera: usize,
    pub selected_microphone: usize,
    pub selected_display: usize,
    pub recording: bool,
    pub status_text: String,
    pub btn_record: isize,
    pub on_record: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_camera_changed: Option<Arc<dyn Fn(Device) + Send + Sync>>,
}

impl UiState {
    fn new(cameras: Vec<Device>, microphones: Vec<Device>, displays: Vec<Device>) -> Self {
        Self {
            cameras,
            microphones,
            displays,
            selected_camera: 0,
            selected_microphone: 0,
            selected_display: 0,
            recording: false,
            status_text: "Ready".to_string(),
            btn_record: 0,
            on_record: None,
            on_camera_changed: None,
        }
    }

    pub fn selected_camera_device(&self) -> Option<Device> {
        self.cameras.get(self.selected_camera).cloned()
    }

    pub fn selected_microphone_device(&self) -> Option<Device> {
        self.microphones.get(self.selected_microphone).cloned()
    }

    pub fn selected_display_device(&self) -> Option<Device> {
        self.displays.get(self.selected_display).cloned()
    }
}

fn isize_to_hwnd(value: isize) -> HWND {
    HWND(value as *mut std::ffi::c_void)
}

pub struct MainWindow {
    hwnd: HWND,
}

impl MainWindow {
    const CLASS_NAME: PCWSTR = w!("FlexCapMain");

    /// Create the panel and populate the selectors from a fresh enumeration
    /// pass. First devices are preselected, matching the platform default.
    pub fn create(catalog: &DeviceCatalog) -> anyhow::Result<(Self, Arc<Mutex<UiState>>)> {
        let cameras = catalog.enumerate(DeviceKind::VideoCapture)?;
        let microphones = catalog.enumerate(DeviceKind::AudioCapture)?;
        let displays = catalog.enumerate(DeviceKind::Display)?;

        let state = Arc::new(Mutex::new(UiState::new(cameras, microphones, displays)));
        let _ = UI_STATE.set(state.clone());

        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);

            let bg_brush = CreateSolidBrush(COLORREF(0x00F5F5F5));
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

            let screen_width = GetSystemMetrics(SM_CXSCREEN);
            let screen_height = GetSystemMetrics(SM_CYSCREEN);
            let x = (screen_width - WINDOW_WIDTH) / 2;
            let y = (screen_height - WINDOW_HEIGHT) / 2;

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST,
                Self::CLASS_NAME,
                w!("FlexCap"),
                WS_OVERLAPPED | WS_CAPTION | WS_SYSMENU | WS_MINIMIZEBOX,
                x,
                y,
                WINDOW_WIDTH,
                WINDOW_HEIGHT,
                HWND::default(),
                HMENU::default(),
                hinstance,
                None,
            )?;

            Self::create_controls(hwnd, hinstance)?;

            Ok((Self { hwnd }, state))
        }
    }

    unsafe fn create_controls(hwnd: HWND, hinstance: HINSTANCE) -> windows::core::Result<()> {
        let rows: [(PCWSTR, u16); 3] = [
            (w!("Webcam"), ID_COMBO_CAMERA),
            (w!("Microphone"), ID_COMBO_MICROPHONE),
            (w!("Display"), ID_COMBO_DISPLAY),
        ];

        for (index, (label, id)) in rows.iter().enumerate() {
            let row_y = FIRST_ROW_Y + index as i32 * ROW_HEIGHT;

            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("STATIC"),
                *label,
                WS_CHILD | WS_VISIBLE,
                LABEL_X,
                row_y + 4,
                CONTROL_X - LABEL_X - 8,
                22,
                hwnd,
                HMENU::default(),
                hinstance,
                None,
            )?;

            let combo = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("COMBOBOX"),
                PCWSTR::null(),
                WS_CHILD | WS_VISIBLE | WS_VSCROLL | WINDOW_STYLE(CBS_DROPDOWNLIST as u32),
                CONTROL_X,
                row_y,
                CONTROL_WIDTH,
                200,
                hwnd,
                HMENU(*id as _),
                hinstance,
                None,
            )?;
            Self::populate_combo(combo, *id);
        }

        let btn_record = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("BUTTON"),
            w!("Start Recording"),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(BS_PUSHBUTTON as u32),
            CONTROL_X,
            FIRST_ROW_Y + 3 * ROW_HEIGHT + 10,
            BTN_WIDTH,
            BTN_HEIGHT,
            hwnd,
            HMENU(ID_BTN_RECORD as _),
            hinstance,
            None,
        )?;

        if let Some(state) = UI_STATE.get() {
            state.lock().btn_record = btn_record.0 as isize;
        }

        Ok(())
    }

    unsafe fn populate_combo(combo: HWND, id: u16) {
        let Some(state) = UI_STATE.get() else {
            return;
        };
        let state = state.lock();
        let devices = match id {
            ID_COMBO_CAMERA => &state.cameras,
            ID_COMBO_MICROPHONE => &state.microphones,
            ID_COMBO_DISPLAY => &state.displays,
            _ => return,
        };
        for device in devices {
            let name = HSTRING::from(device.name.as_str());
            SendMessageW(
                combo,
                CB_ADDSTRING,
                WPARAM(0),
                LPARAM(name.as_ptr() as isize),
            );
        }
        if !devices.is_empty() {
            SendMessageW(combo, CB_SETCURSEL, WPARAM(0), LPARAM(0));
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

    pub fn run_message_loop() -> i32 {
        unsafe {
            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            msg.wParam.0 as i32
        }
    }

    fn update_state(hwnd: HWND) {
        if let Some(state) = UI_STATE.get() {
            let state = state.lock();
            unsafe {
                if state.btn_record != 0 {
                    let label = if state.recording {
                        w!("Stop Recording")
                    } else {
                        w!("Start Recording")
                    };
                    let _ = SetWindowTextW(isize_to_hwnd(state.btn_record), label);
                }
                let _ = InvalidateRect(hwnd, None, true);
            }
        }
    }

    unsafe extern "system" fn wnd_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_PAINT => {
                Self::on_paint(hwnd);
                LRESULT(0)
            }

            WM_COMMAND => {
                let id = (wparam.0 & 0xFFFF) as u16;
                let code = ((wparam.0 >> 16) & 0xFFFF) as u32;
                match id {
                    ID_BTN_RECORD if code == BN_CLICKED => Self::on_record_click(),
                    ID_COMBO_CAMERA | ID_COMBO_MICROPHONE | ID_COMBO_DISPLAY
                        if code == CBN_SELCHANGE =>
                    {
                        Self::on_selection_changed(id, isize_to_hwnd(lparam.0));
                    }
                    _ => {}
                }
                LRESULT(0)
            }

            WM_APP_UPDATE_STATE => {
                Self::update_state(hwnd);
                LRESULT(0)
            }

            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }

            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }

    unsafe fn on_selection_changed(id: u16, combo: HWND) {
        let index = SendMessageW(combo, CB_GETCURSEL, WPARAM(0), LPARAM(0)).0;
        if index < 0 {
            return;
        }
        let index = index as usize;

        let Some(state) = UI_STATE.get() else {
            return;
        };
        let (camera_changed, callback) = {
            let mut state = state.lock();
            match id {
                ID_COMBO_CAMERA => {
                    state.selected_camera = index;
                    (state.selected_camera_device(), state.on_camera_changed.clone())
                }
                ID_COMBO_MICROPHONE => {
                    state.selected_microphone = index;
                    (None, None)
                }
                ID_COMBO_DISPLAY => {
                    state.selected_display = index;
                    (None, None)
                }
                _ => (None, None),
            }
        };

        if let (Some(device), Some(cb)) = (camera_changed, callback) {
            cb(device);
        }
    }

    fn on_record_click() {
        if let Some(state) = UI_STATE.get() {
            // clone the callback so it runs outside the lock
            let callback = {
                let state = state.lock();
                state.on_record.clone()
            };
            if let Some(cb) = callback {
                cb();
            }
        }
    }

    unsafe fn on_paint(hwnd: HWND) {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);

        let title_font = CreateFontW(
            24,
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
        let old_font = SelectObject(hdc, title_font);
        SetBkMode(hdc, TRANSPARENT);
        SetTextColor(hdc, COLORREF(0x00333333));

        let title: Vec<u16> = "FlexCap".encode_utf16().collect();
        let _ = TextOutW(hdc, LABEL_X, WINDOW_HEIGHT - 110, &title);

        SelectObject(hdc, old_font);
        DeleteObject(title_font);

        if let Some(state) = UI_STATE.get() {
            let (status, recording) = {
                let state = state.lock();
                (state.status_text.clone(), state.recording)
            };

            let status_font = CreateFontW(
                17,
                0,
                0,
                0,
                FW_NORMAL.0 as i32,
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
            let old_font = SelectObject(hdc, status_font);
            SetBkMode(hdc, TRANSPARENT);

            let color = if recording { 0x000044CC } else { 0x00666666 };
            SetTextColor(hdc, COLORREF(color));

            let text: Vec<u16> = status.encode_utf16().collect();
            let _ = TextOutW(hdc, LABEL_X, WINDOW_HEIGHT - 80, &text);

            SelectObject(hdc, old_font);
            DeleteObject(status_font);
        }

        let _ = EndPaint(hwnd, &ps);
    }
}

/// Post a state refresh to the panel.
pub fn post_update_state(hwnd: HWND) {
    unsafe {
        let _ = PostMessageW(hwnd, WM_APP_UPDATE_STATE, WPARAM(0), LPARAM(0));
    }
}
