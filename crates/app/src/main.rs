//! FlexCap - screen recorder with a webcam overlay HUD

#![windows_subsystem = "windows"]

mod recorder;
mod ui;

use crate::recorder::{Recorder, StopOutcome};
use crate::ui::{post_update_state, MainWindow, UiState};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use devices::{DeviceCatalog, PreviewSession};
use engine::{CaptureEngine, DisplaySource, FfmpegEngine, RecordingConfig};
use overlay::window::{post_begin_recording, post_end_recording, stay_on_top};
use overlay::WebcamWindow;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use windows::core::{w, HSTRING};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::WinRT::{RoInitialize, RoUninitialize, RO_INIT_MULTITHREADED};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

const DEFAULT_BITRATE_KBPS: u32 = 8000;
const DEFAULT_FRAME_RATE: u32 = 30;

/// Commands for the recorder worker thread
enum RecorderCommand {
    Start {
        config: RecordingConfig,
        output: PathBuf,
    },
    Stop,
    Reset,
    Shutdown,
}

/// Session outcomes forwarded to the UI
enum RecorderNotice {
    Started,
    Stopped(PathBuf),
    NotRecording,
    Failed(String),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        // device enumeration and the preview pipeline are WinRT
        RoInitialize(RO_INIT_MULTITHREADED)?;
    }

    let catalog = DeviceCatalog::new();
    let (main_window, ui_state) = MainWindow::create(&catalog)?;
    let (webcam_window, hud_state) = WebcamWindow::create()?;
    let main_hwnd_raw = main_window.hwnd().0 as isize;
    let hud_hwnd_raw = webcam_window.hwnd().0 as isize;

    stay_on_top(main_window.hwnd());

    // webcam preview follows the camera selection
    let preview = Arc::new(Mutex::new(PreviewSession::new()));
    {
        let initial = { ui_state.lock().selected_camera_device() };
        if let Some(device) = initial {
            if let Err(e) = preview.lock().bind(&device) {
                warn!(error = %e, "initial webcam bind failed");
                show_error(&format!("Webcam preview failed: {e}"));
            }
        }
    }
    {
        let preview = preview.clone();
        ui_state.lock().on_camera_changed = Some(Arc::new(move |device| {
            if let Err(e) = preview.lock().bind(&device) {
                warn!(error = %e, "webcam rebind failed");
                show_error(&format!("Webcam preview failed: {e}"));
            }
        }));
    }

    let (cmd_tx, cmd_rx) = bounded::<RecorderCommand>(4);
    let (notice_tx, notice_rx) = bounded::<RecorderNotice>(4);

    let worker = thread::spawn(move || recorder_worker(cmd_rx, notice_tx));

    // record button toggles between start and stop
    {
        let cmd_tx = cmd_tx.clone();
        let ui_state_cb = ui_state.clone();
        ui_state.lock().on_record = Some(Arc::new(move || {
            on_record_click(&catalog, ui_state_cb.clone(), cmd_tx.clone());
        }));
    }

    // the HUD stop button is just another stop request
    {
        let cmd_tx = cmd_tx.clone();
        hud_state.lock().on_stop = Some(Arc::new(move || {
            let _ = cmd_tx.send(RecorderCommand::Stop);
        }));
    }

    let notices = {
        let ui_state = ui_state.clone();
        let cmd_tx = cmd_tx.clone();
        thread::spawn(move || {
            notice_handler(main_hwnd_raw, hud_hwnd_raw, ui_state, notice_rx, cmd_tx)
        })
    };

    main_window.show();
    webcam_window.show();
    let _exit_code = MainWindow::run_message_loop();

    let _ = cmd_tx.send(RecorderCommand::Shutdown);
    drop(cmd_tx);
    let _ = worker.join();
    let _ = notices.join();

    unsafe {
        RoUninitialize();
    }

    Ok(())
}

fn hwnd_from_raw(raw: isize) -> HWND {
    HWND(raw as *mut std::ffi::c_void)
}

fn show_error(message: &str) {
    unsafe {
        MessageBoxW(
            None,
            &HSTRING::from(message),
            w!("FlexCap"),
            MB_OK | MB_ICONERROR,
        );
    }
}

/// UI-thread record-button handler: snapshot the selections, ask for an
/// output path and hand the session to the worker.
fn on_record_click(
    catalog: &DeviceCatalog,
    ui_state: Arc<Mutex<UiState>>,
    cmd_tx: Sender<RecorderCommand>,
) {
    let (recording, display, microphone) = {
        let state = ui_state.lock();
        (
            state.recording,
            state.selected_display_device(),
            state.selected_microphone_device(),
        )
    };
    if recording {
        let _ = cmd_tx.send(RecorderCommand::Stop);
        return;
    }

    let Some(display) = display else {
        show_error("No display selected.");
        return;
    };

    // cancelling the picker quietly aborts the start
    let Some(output) = rfd::FileDialog::new()
        .add_filter("MP4 video", &["mp4"])
        .set_file_name("ScreenCapture.mp4")
        .save_file()
    else {
        return;
    };

    let target = match catalog.display_target(&display.id) {
        Ok(target) => target,
        Err(e) => {
            let display_id = &display.id;
            error!(error = %e, display = %display_id, "display query failed");
            show_error(&format!("Display query failed: {e}"));
            return;
        }
    };

    let config = RecordingConfig {
        displays: vec![DisplaySource {
            device_id: target.device_id.clone(),
            x: target.x,
            y: target.y,
            width: target.width,
            height: target.height,
        }],
        output_size: Some((target.width, target.height)),
        crop: None,
        bitrate_kbps: DEFAULT_BITRATE_KBPS,
        frame_rate: DEFAULT_FRAME_RATE,
        hardware_encoding: true,
        capture_microphone: microphone.is_some(),
        microphone_id: microphone.map(|device| device.name),
        capture_system_audio: false,
        system_audio_id: None,
    };

    info!(path = %output.display(), "record requested");
    let _ = cmd_tx.send(RecorderCommand::Start { config, output });
}

/// Owns the [`Recorder`]; every session-state mutation happens on this
/// thread, including engine events drained between commands.
fn recorder_worker(cmd_rx: Receiver<RecorderCommand>, notice_tx: Sender<RecorderNotice>) {
    let factory: recorder::EngineFactory = Box::new(|config| {
        Ok(Box::new(FfmpegEngine::new(config.clone())) as Box<dyn CaptureEngine>)
    });
    let mut recorder = Recorder::new(factory);

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(RecorderCommand::Start { config, output }) => {
                match recorder.request_start(config, output) {
                    Ok(()) => {
                        let _ = notice_tx.send(RecorderNotice::Started);
                    }
                    Err(e) => {
                        warn!(error = %e, "start failed");
                        let _ = notice_tx.send(RecorderNotice::Failed(e.to_string()));
                    }
                }
            }
            Ok(RecorderCommand::Stop) => match recorder.request_stop() {
                Ok(StopOutcome::Stopped(path)) => {
                    let _ = notice_tx.send(RecorderNotice::Stopped(path));
                }
                Ok(StopOutcome::NotRecording) => {
                    let _ = notice_tx.send(RecorderNotice::NotRecording);
                }
                Err(e) => {
                    warn!(error = %e, "stop failed");
                    let _ = notice_tx.send(RecorderNotice::Failed(e.to_string()));
                }
            },
            Ok(RecorderCommand::Reset) => {
                if let Err(e) = recorder.reset() {
                    warn!(error = %e, "reset rejected");
                }
            }
            Ok(RecorderCommand::Shutdown) => {
                let _ = recorder.request_stop();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                // engine callbacks land here, on the recorder's owning thread
                if let Err(e) = recorder.drain_events() {
                    let _ = notice_tx.send(RecorderNotice::Failed(e.to_string()));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Forwards worker notices to the windows and surfaces failures as a
/// dismissible dialog.
fn notice_handler(
    main_hwnd_raw: isize,
    hud_hwnd_raw: isize,
    ui_state: Arc<Mutex<UiState>>,
    notice_rx: Receiver<RecorderNotice>,
    cmd_tx: Sender<RecorderCommand>,
) {
    let main_hwnd = hwnd_from_raw(main_hwnd_raw);
    let hud_hwnd = hwnd_from_raw(hud_hwnd_raw);

    loop {
        match notice_rx.recv() {
            Ok(RecorderNotice::Started) => {
                {
                    let mut state = ui_state.lock();
                    state.recording = true;
                    state.status_text = "Recording...".to_string();
                }
                post_update_state(main_hwnd);
                post_begin_recording(hud_hwnd);
            }
            Ok(RecorderNotice::Stopped(path)) => {
                {
                    let mut state = ui_state.lock();
                    state.recording = false;
                    state.status_text = format!("Saved {}", path.display());
                }
                post_update_state(main_hwnd);
                post_end_recording(hud_hwnd);
            }
            Ok(RecorderNotice::NotRecording) => {
                {
                    let mut state = ui_state.lock();
                    state.status_text = "Nothing is recording".to_string();
                }
                post_update_state(main_hwnd);
            }
            Ok(RecorderNotice::Failed(reason)) => {
                {
                    let mut state = ui_state.lock();
                    state.recording = false;
                    state.status_text = "Recording failed".to_string();
                }
                post_update_state(main_hwnd);
                post_end_recording(hud_hwnd);
                show_error(&reason);
                // the session stays failed until explicitly reset; the
                // dismissed dialog is that acknowledgement
                let _ = cmd_tx.send(RecorderCommand::Reset);
            }
            Err(_) => break,
        }
    }
}
