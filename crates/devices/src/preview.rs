//! Webcam preview pipeline
//!
//! Binding a device tears down the previous pipeline, claims the camera,
//! picks a preview-capable frame source and starts playback. Presenting the
//! player's frames is the window shell's concern.

use crate::{Device, DeviceError, DeviceResult};
use tracing::{debug, info};
use windows::core::{Interface, HSTRING};
use windows::Media::Capture::Frames::MediaFrameSource;
use windows::Media::Capture::{
    MediaCapture, MediaCaptureInitializationSettings, MediaStreamType, StreamingCaptureMode,
};
use windows::Media::Core::MediaSource;
use windows::Media::Playback::{IMediaPlaybackSource, MediaPlayer};

const PREFERRED_WIDTH: u32 = 640;
const PREFERRED_HEIGHT: u32 = 480;
const PREFERRED_SUBTYPE: &str = "NV12";

/// Stream kind of a frame source, as far as preview selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    VideoPreview,
    VideoRecord,
    Other,
}

pub struct PreviewSession {
    capture: Option<MediaCapture>,
    player: Option<MediaPlayer>,
}

impl PreviewSession {
    pub fn new() -> Self {
        Self {
            capture: None,
            player: None,
        }
    }

    /// Bind the preview to a webcam. Any previously bound pipeline is closed
    /// first so the device is released before it is claimed again.
    pub fn bind(&mut self, device: &Device) -> DeviceResult<()> {
        if let Some(previous) = self.capture.take() {
            let _ = previous.Close();
        }

        let settings = MediaCaptureInitializationSettings::new()?;
        settings.SetVideoDeviceId(&HSTRING::from(device.id.as_str()))?;
        settings.SetStreamingCaptureMode(StreamingCaptureMode::Video)?;

        let capture = MediaCapture::new()?;
        capture.InitializeWithSettingsAsync(&settings)?.get()?;

        let sources = frame_sources(&capture)?;
        let kinds: Vec<StreamKind> = sources.iter().map(stream_kind).collect();
        let Some(index) = pick_frame_source(&kinds) else {
            let _ = capture.Close();
            return Err(DeviceError::NoFrameSource(device.name.clone()));
        };
        let source = &sources[index];

        negotiate_format(source)?;

        let media_source = MediaSource::CreateFromMediaFrameSource(source)?;
        let player = match self.player.take() {
            Some(player) => player,
            None => MediaPlayer::new()?,
        };
        player.SetSource(&media_source.cast::<IMediaPlaybackSource>()?)?;
        player.Play()?;

        info!(device = %device.name, "webcam preview running");
        self.capture = Some(capture);
        self.player = Some(player);
        Ok(())
    }

    /// Tear down the pipeline and release the camera.
    pub fn unbind(&mut self) {
        if let Some(player) = self.player.as_ref() {
            let _ = player.Pause();
        }
        if let Some(capture) = self.capture.take() {
            let _ = capture.Close();
        }
    }

    pub fn player(&self) -> Option<&MediaPlayer> {
        self.player.as_ref()
    }
}

impl Default for PreviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// First frame source able to feed a preview: video-preview or video-record.
pub(crate) fn pick_frame_source(kinds: &[StreamKind]) -> Option<usize> {
    kinds
        .iter()
        .position(|kind| matches!(kind, StreamKind::VideoPreview | StreamKind::VideoRecord))
}

fn frame_sources(capture: &MediaCapture) -> DeviceResult<Vec<MediaFrameSource>> {
    let map = capture.FrameSources()?;
    let iter = map.First()?;
    let mut sources = Vec::new();
    while iter.HasCurrent()? {
        sources.push(iter.Current()?.Value()?);
        iter.MoveNext()?;
    }
    Ok(sources)
}

fn stream_kind(source: &MediaFrameSource) -> StreamKind {
    match source.Info().and_then(|info| info.MediaStreamType()) {
        Ok(MediaStreamType::VideoPreview) => StreamKind::VideoPreview,
        Ok(MediaStreamType::VideoRecord) => StreamKind::VideoRecord,
        _ => StreamKind::Other,
    }
}

/// Try the preferred preview format; keep the device default when absent.
fn negotiate_format(source: &MediaFrameSource) -> DeviceResult<()> {
    let formats = source.SupportedFormats()?;
    for i in 0..formats.Size()? {
        let format = formats.GetAt(i)?;
        let video = format.VideoFormat()?;
        if video.Width()? == PREFERRED_WIDTH
            && video.Height()? == PREFERRED_HEIGHT
            && format
                .Subtype()?
                .to_string()
                .eq_ignore_ascii_case(PREFERRED_SUBTYPE)
        {
            source.SetFormatAsync(&format)?.get()?;
            debug!("preview format set to {PREFERRED_WIDTH}x{PREFERRED_HEIGHT} {PREFERRED_SUBTYPE}");
            return Ok(());
        }
    }
    debug!("preferred preview format unavailable, keeping device default");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_stream_is_picked_first() {
        let kinds = [StreamKind::Other, StreamKind::VideoPreview, StreamKind::VideoRecord];
        assert_eq!(pick_frame_source(&kinds), Some(1));
    }

    #[test]
    fn record_stream_is_an_acceptable_fallback() {
        let kinds = [StreamKind::Other, StreamKind::VideoRecord];
        assert_eq!(pick_frame_source(&kinds), Some(1));
    }

    #[test]
    fn no_video_stream_means_no_source() {
        assert_eq!(pick_frame_source(&[]), None);
        assert_eq!(pick_frame_source(&[StreamKind::Other, StreamKind::Other]), None);
    }
}
