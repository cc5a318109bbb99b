// REELFORGE Framing Preview
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Stills of the planned background clips, cropped onto the canvas in
// process. Lets the crop framing be checked without a full encode.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::composer::compositor::{apply_opacity, CompositeTimeline};
use crate::composer::normalizer::normalize_frames;
use crate::composer::probe::safe_arg_path;
use crate::error::RenderError;

/// Grab the frame at `at` seconds from `source` into `dest` (PNG).
pub async fn grab_frame(source: &Path, at: f64, dest: &Path) -> Result<(), RenderError> {
    let output = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-ss"])
        .arg(format!("{:.3}", at))
        .arg("-i")
        .arg(safe_arg_path(source))
        .args(["-frames:v", "1"])
        .arg(safe_arg_path(dest))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(RenderError::Spawn)?;

    if !output.status.success() {
        return Err(RenderError::Encoder {
            status: output.status.to_string(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Write `preview_NNN.png` for every timeline clip, taken at the clip's
/// midpoint with the fade level at that instant applied.
pub async fn render_previews(
    timeline: &CompositeTimeline,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, RenderError> {
    tokio::fs::create_dir_all(out_dir).await?;
    let scratch = tempfile::Builder::new().prefix("reelforge_preview_").tempdir()?;

    let mut frames = Vec::with_capacity(timeline.clips.len());
    let mut alphas = Vec::with_capacity(timeline.clips.len());
    for (i, clip) in timeline.clips.iter().enumerate() {
        let local = clip.duration / 2.0;
        let raw = scratch.path().join(format!("raw_{:03}.png", i));
        grab_frame(&clip.clip.clip.source, clip.clip.clip.in_point + local, &raw).await?;
        match image::open(&raw) {
            Ok(img) => {
                frames.push(img);
                alphas.push(clip.opacity_at(local));
            }
            Err(e) => warn!("[PREVIEW] Could not decode frame {}: {}", i, e),
        }
    }

    let canvas = timeline.canvas;
    let normalized = tokio::task::spawn_blocking(move || normalize_frames(&frames, canvas))
        .await
        .map_err(|_| RenderError::Cancelled)?;

    let mut written = Vec::with_capacity(normalized.len());
    for (i, (mut frame, alpha)) in normalized.into_iter().zip(alphas).enumerate() {
        apply_opacity(&mut frame, alpha);
        let path = out_dir.join(format!("preview_{:03}.png", i));
        frame
            .save(&path)
            .map_err(|e| RenderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        written.push(path);
    }

    info!("[PREVIEW] Wrote {} preview frames to {:?}", written.len(), out_dir);
    Ok(written)
}
