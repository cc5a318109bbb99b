// REELFORGE Media Probe
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// ffprobe wrappers for duration and frame geometry of background footage.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::ProbeError;

const PROBE_TIMEOUT_SECS: u64 = 10;

/// Geometry and length of one video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Prefix paths that start with `-` so ffmpeg tools never read them as flags.
pub fn safe_arg_path(path: &Path) -> PathBuf {
    if path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

async fn run_ffprobe(path: &Path, args: &[&str]) -> Result<String, ProbeError> {
    let output = tokio::time::timeout(
        tokio::time::Duration::from_secs(PROBE_TIMEOUT_SECS),
        Command::new("ffprobe")
            .kill_on_drop(true)
            .args(args)
            .arg(safe_arg_path(path))
            .output(),
    )
    .await
    .map_err(|_| ProbeError::Failed {
        path: path.to_path_buf(),
        message: "ffprobe timed out".to_string(),
    })?
    .map_err(|source| ProbeError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Container duration in seconds.
pub async fn media_duration(path: &Path) -> Result<f64, ProbeError> {
    let stdout = run_ffprobe(
        path,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
    )
    .await?;

    stdout.trim().parse::<f64>().map_err(|_| ProbeError::Parse {
        path: path.to_path_buf(),
        message: format!("unexpected duration '{}'", stdout.trim()),
    })
}

/// Duration plus first video stream dimensions.
pub async fn probe_video(path: &Path) -> Result<VideoInfo, ProbeError> {
    let stdout = run_ffprobe(
        path,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,duration:format=duration",
            "-of",
            "json",
        ],
    )
    .await?;

    let info = parse_probe_json(path, &stdout)?;
    debug!(
        "[PROBE] {:?}: {}x{} {:.2}s",
        path, info.width, info.height, info.duration
    );
    Ok(info)
}

fn parse_probe_json(path: &Path, json: &str) -> Result<VideoInfo, ProbeError> {
    let parse_err = |message: String| ProbeError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let probe: ProbeOutput = serde_json::from_str(json).map_err(|e| parse_err(e.to_string()))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| parse_err("no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(parse_err("missing frame dimensions".to_string())),
    };

    // Container duration is more reliable than the stream's for most muxers
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| parse_err("missing duration".to_string()))?;

    Ok(VideoInfo {
        duration,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_json() {
        let json = r#"{
            "programs": [],
            "streams": [{ "width": 1920, "height": 1080, "duration": "12.500000" }],
            "format": { "duration": "12.533000" }
        }"#;
        let info = parse_probe_json(Path::new("a.mp4"), json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration - 12.533).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_json_stream_duration_fallback() {
        let json = r#"{ "streams": [{ "width": 640, "height": 480, "duration": "3.0" }] }"#;
        let info = parse_probe_json(Path::new("a.mp4"), json).unwrap();
        assert_eq!(info.duration, 3.0);
    }

    #[test]
    fn test_parse_probe_json_without_video() {
        let json = r#"{ "streams": [], "format": { "duration": "3.0" } }"#;
        let err = parse_probe_json(Path::new("a.mp3"), json).unwrap_err();
        assert!(matches!(err, ProbeError::Parse { .. }));
    }

    #[test]
    fn test_safe_arg_path() {
        assert_eq!(
            safe_arg_path(Path::new("-clip.mp4")),
            PathBuf::from("./-clip.mp4")
        );
        assert_eq!(
            safe_arg_path(Path::new("clip.mp4")),
            PathBuf::from("clip.mp4")
        );
    }
}
