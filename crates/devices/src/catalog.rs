//! Platform device and display enumeration

use crate::{Device, DeviceKind, DeviceResult, DeviceError, DisplayTarget};
use windows::core::PCWSTR;
use windows::Devices::Enumeration::{DeviceClass, DeviceInformation};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayDevicesW, EnumDisplaySettingsW, DEVMODEW, DISPLAY_DEVICEW,
    DISPLAY_DEVICE_ATTACHED_TO_DESKTOP, DISPLAY_DEVICE_MIRRORING_DRIVER, ENUM_CURRENT_SETTINGS,
};

/// Read-only device query service. Consumers hold an instance; there is no
/// process-wide device state.
pub struct DeviceCatalog;

impl DeviceCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Enumerate devices of a kind. Every call re-queries the platform and
    /// replaces the previous result set; nothing is cached across calls.
    pub fn enumerate(&self, kind: DeviceKind) -> DeviceResult<Vec<Device>> {
        match kind {
            DeviceKind::VideoCapture => winrt_devices(DeviceClass::VideoCapture, kind),
            DeviceKind::AudioCapture => winrt_devices(DeviceClass::AudioCapture, kind),
            DeviceKind::AudioRender => winrt_devices(DeviceClass::AudioRender, kind),
            DeviceKind::Display => display_devices(),
        }
    }

    /// Pixel size and desktop origin of a display, from its current settings.
    pub fn display_target(&self, device_id: &str) -> DeviceResult<DisplayTarget> {
        let wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();
        let mut mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };
        let ok =
            unsafe { EnumDisplaySettingsW(PCWSTR(wide.as_ptr()), ENUM_CURRENT_SETTINGS, &mut mode) };
        if !ok.as_bool() {
            return Err(DeviceError::UnknownDisplay(device_id.to_string()));
        }

        let position = unsafe { mode.Anonymous1.Anonymous2.dmPosition };
        Ok(DisplayTarget {
            device_id: device_id.to_string(),
            x: position.x,
            y: position.y,
            width: mode.dmPelsWidth,
            height: mode.dmPelsHeight,
        })
    }
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn winrt_devices(class: DeviceClass, kind: DeviceKind) -> DeviceResult<Vec<Device>> {
    let collection = DeviceInformation::FindAllAsyncDeviceClass(class)?.get()?;
    let mut devices = Vec::new();
    for i in 0..collection.Size()? {
        let info = collection.GetAt(i)?;
        devices.push(Device {
            id: info.Id()?.to_string(),
            name: info.Name()?.to_string(),
            kind,
        });
    }
    Ok(devices)
}

fn display_devices() -> DeviceResult<Vec<Device>> {
    let mut devices = Vec::new();
    let mut index = 0u32;
    loop {
        let mut adapter = DISPLAY_DEVICEW {
            cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
            ..Default::default()
        };
        let ok = unsafe { EnumDisplayDevicesW(PCWSTR::null(), index, &mut adapter, 0) };
        if !ok.as_bool() {
            break;
        }
        index += 1;

        let attached = adapter.StateFlags & DISPLAY_DEVICE_ATTACHED_TO_DESKTOP != 0;
        let mirroring = adapter.StateFlags & DISPLAY_DEVICE_MIRRORING_DRIVER != 0;
        if !attached || mirroring {
            continue;
        }

        devices.push(Device {
            id: wide_to_string(&adapter.DeviceName),
            name: wide_to_string(&adapter.DeviceString),
            kind: DeviceKind::Display,
        });
    }
    Ok(devices)
}

fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}
