//! ffmpeg invocation built from a recording configuration
//!
//! Kept free of process handling so the configuration→argument mapping can
//! be tested directly.

use crate::RecordingConfig;
use std::path::Path;

/// Build the full argument list for one recording session.
pub fn build_args(config: &RecordingConfig, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-stats".into(), "-y".into()];

    for display in &config.displays {
        args.push("-f".into());
        args.push("gdigrab".into());
        args.push("-framerate".into());
        args.push(config.frame_rate.to_string());
        args.push("-offset_x".into());
        args.push(display.x.to_string());
        args.push("-offset_y".into());
        args.push(display.y.to_string());
        args.push("-video_size".into());
        args.push(format!("{}x{}", display.width, display.height));
        args.push("-i".into());
        args.push("desktop".into());
    }

    let video_inputs = config.displays.len();
    let mut audio_devices: Vec<&str> = Vec::new();
    if config.capture_microphone {
        if let Some(id) = config.microphone_id.as_deref() {
            audio_devices.push(id);
        }
    }
    if config.capture_system_audio {
        if let Some(id) = config.system_audio_id.as_deref() {
            audio_devices.push(id);
        }
    }
    for device in &audio_devices {
        args.push("-f".into());
        args.push("dshow".into());
        args.push("-i".into());
        args.push(format!("audio={device}"));
    }

    let mut video_filters: Vec<String> = Vec::new();
    if let Some(crop) = config.crop {
        video_filters.push(format!(
            "crop={}:{}:{}:{}",
            crop.width, crop.height, crop.x, crop.y
        ));
    }
    if let Some((width, height)) = config.output_size {
        video_filters.push(format!("scale={width}:{height}"));
    }

    // hstack and amix need a filter graph; plain sessions stay on -filter:v
    let needs_graph = video_inputs > 1 || audio_devices.len() > 1;
    if needs_graph {
        let mut graph = String::new();
        let video_label = if video_inputs > 1 {
            for i in 0..video_inputs {
                graph.push_str(&format!("[{i}:v]"));
            }
            graph.push_str(&format!("hstack=inputs={video_inputs}"));
            if video_filters.is_empty() {
                graph.push_str("[vout]");
            } else {
                graph.push_str("[cat];[cat]");
                graph.push_str(&video_filters.join(","));
                graph.push_str("[vout]");
            }
            "[vout]".to_string()
        } else if !video_filters.is_empty() {
            graph.push_str(&format!("[0:v]{}[vout]", video_filters.join(",")));
            "[vout]".to_string()
        } else {
            "0:v".to_string()
        };
        if audio_devices.len() > 1 {
            if !graph.is_empty() {
                graph.push(';');
            }
            for i in 0..audio_devices.len() {
                graph.push_str(&format!("[{}:a]", video_inputs + i));
            }
            graph.push_str(&format!("amix=inputs={}[aout]", audio_devices.len()));
        }
        args.push("-filter_complex".into());
        args.push(graph);
        args.push("-map".into());
        args.push(video_label);
        if audio_devices.len() > 1 {
            args.push("-map".into());
            args.push("[aout]".into());
        } else if audio_devices.len() == 1 {
            args.push("-map".into());
            args.push(format!("{video_inputs}:a"));
        }
    } else {
        if !video_filters.is_empty() {
            args.push("-filter:v".into());
            args.push(video_filters.join(","));
        }
        if audio_devices.len() == 1 {
            args.push("-map".into());
            args.push("0:v".into());
            args.push("-map".into());
            args.push("1:a".into());
        }
    }

    args.push("-c:v".into());
    args.push(if config.hardware_encoding { "h264_nvenc" } else { "libx264" }.into());
    args.push("-b:v".into());
    args.push(format!("{}k", config.bitrate_kbps));
    args.push("-r".into());
    args.push(config.frame_rate.to_string());
    args.push("-pix_fmt".into());
    args.push("yuv420p".into());
    if !audio_devices.is_empty() {
        args.push("-c:a".into());
        args.push("aac".into());
    }
    args.push("-movflags".into());
    args.push("+faststart".into());
    args.push(output.display().to_string());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DisplaySource, Rect};
    use std::path::PathBuf;

    fn display(id: &str, x: i32, y: i32, w: u32, h: u32) -> DisplaySource {
        DisplaySource {
            device_id: id.to_string(),
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn single_display_geometry_and_rates() {
        let config = RecordingConfig {
            displays: vec![display(r"\\.\DISPLAY1", -1920, 0, 1920, 1080)],
            bitrate_kbps: 6000,
            frame_rate: 24,
            hardware_encoding: false,
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));

        assert!(has_pair(&args, "-f", "gdigrab"));
        assert!(has_pair(&args, "-offset_x", "-1920"));
        assert!(has_pair(&args, "-offset_y", "0"));
        assert!(has_pair(&args, "-video_size", "1920x1080"));
        assert!(has_pair(&args, "-framerate", "24"));
        assert!(has_pair(&args, "-b:v", "6000k"));
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn hardware_preference_selects_nvenc() {
        let config = RecordingConfig {
            displays: vec![display(r"\\.\DISPLAY1", 0, 0, 1280, 720)],
            hardware_encoding: true,
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));
        assert!(has_pair(&args, "-c:v", "h264_nvenc"));
    }

    #[test]
    fn crop_then_scale_in_filter_chain() {
        let config = RecordingConfig {
            displays: vec![display(r"\\.\DISPLAY1", 0, 0, 2560, 1440)],
            crop: Some(Rect::new(100, 50, 1920, 1080)),
            output_size: Some((1280, 720)),
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));
        assert!(has_pair(&args, "-filter:v", "crop=1920:1080:100:50,scale=1280:720"));
    }

    #[test]
    fn two_displays_stitch_horizontally() {
        let config = RecordingConfig {
            displays: vec![
                display(r"\\.\DISPLAY1", 0, 0, 1920, 1080),
                display(r"\\.\DISPLAY2", 1920, 0, 1920, 1080),
            ],
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_pos + 1].contains("hstack=inputs=2"));
        assert!(has_pair(&args, "-map", "[vout]"));
    }

    #[test]
    fn microphone_only_maps_second_input() {
        let config = RecordingConfig {
            displays: vec![display(r"\\.\DISPLAY1", 0, 0, 1920, 1080)],
            capture_microphone: true,
            microphone_id: Some("Microphone (USB Audio)".to_string()),
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));
        assert!(has_pair(&args, "-i", "audio=Microphone (USB Audio)"));
        assert!(has_pair(&args, "-map", "1:a"));
        assert!(has_pair(&args, "-c:a", "aac"));
    }

    #[test]
    fn both_audio_sources_are_mixed() {
        let config = RecordingConfig {
            displays: vec![display(r"\\.\DISPLAY1", 0, 0, 1920, 1080)],
            capture_microphone: true,
            microphone_id: Some("Mic".to_string()),
            capture_system_audio: true,
            system_audio_id: Some("Speakers".to_string()),
            ..Default::default()
        };
        let args = build_args(&config, &PathBuf::from("out.mp4"));
        let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_pos + 1].contains("amix=inputs=2"));
        assert!(has_pair(&args, "-map", "[aout]"));
    }
}
