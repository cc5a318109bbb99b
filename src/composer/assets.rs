// REELFORGE Asset Provider
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Resolves narration identifiers and discovers background footage. The
// pipeline only sees the `AssetProvider` trait; `DirectoryAssets` is the
// on-disk convention (AudioAssets/ + VideoAssets/).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::composer::audio::{probe_duration, AudioTrack};
use crate::composer::probe::{media_duration, probe_video};
use crate::composer::selector::{order_sources, SourceVideo};
use crate::config::SourceOrder;
use crate::error::{ComposeError, TranscriptionError};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

#[async_trait]
pub trait AssetProvider: Send + Sync {
    /// Resolve an audio identifier to a readable track with known duration.
    async fn audio_track(&self, id: &str) -> Result<AudioTrack, ComposeError>;

    /// Background candidates for this narration, in visiting order.
    async fn backgrounds_for(&self, audio: &AudioTrack) -> Result<Vec<SourceVideo>, ComposeError>;
}

pub struct DirectoryAssets {
    audio_dir: PathBuf,
    video_dir: PathBuf,
    order: SourceOrder,
}

impl DirectoryAssets {
    pub fn new(audio_dir: PathBuf, video_dir: PathBuf, order: SourceOrder) -> Self {
        Self {
            audio_dir,
            video_dir,
            order,
        }
    }

    /// An existing file path is used as is; anything else is looked up in
    /// the audio directory.
    pub fn resolve_audio(&self, id: &str) -> Result<PathBuf, ComposeError> {
        let id = id.trim();
        let direct = Path::new(id);
        if !id.is_empty() && direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        let joined = self.audio_dir.join(id);
        if !id.is_empty() && joined.is_file() {
            return Ok(joined);
        }
        Err(ComposeError::AudioNotFound { path: joined })
    }

    /// Video files directly inside the video directory, sorted by path.
    pub fn scan_videos(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.video_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("[ASSETS] Cannot read {:?}: {}", self.video_dir, e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_video_file(p))
            .collect();
        files.sort();
        files
    }
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

async fn audio_duration(path: &Path) -> Result<f64, ComposeError> {
    let blocking_path = path.to_path_buf();
    let probed = tokio::task::spawn_blocking(move || probe_duration(&blocking_path))
        .await
        .map_err(|e| TranscriptionError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let duration = match probed {
        Ok(Some(d)) => d,
        // Containers without a frame count (VBR mp3, some m4a) need ffprobe
        Ok(None) | Err(_) => {
            media_duration(path)
                .await
                .map_err(|e| TranscriptionError::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
        }
    };

    if !(duration > 0.0) {
        return Err(TranscriptionError::Unreadable {
            path: path.to_path_buf(),
            reason: "audio has zero duration".to_string(),
        }
        .into());
    }
    Ok(duration)
}

#[async_trait]
impl AssetProvider for DirectoryAssets {
    async fn audio_track(&self, id: &str) -> Result<AudioTrack, ComposeError> {
        let path = self.resolve_audio(id)?;
        let duration = audio_duration(&path).await?;
        info!("[ASSETS] Using audio file: {:?} ({:.2}s)", path, duration);
        Ok(AudioTrack { path, duration })
    }

    async fn backgrounds_for(&self, _audio: &AudioTrack) -> Result<Vec<SourceVideo>, ComposeError> {
        let files = self.scan_videos();
        let mut sources = Vec::with_capacity(files.len());
        for path in files {
            match probe_video(&path).await {
                Ok(info) => sources.push(SourceVideo {
                    path,
                    duration: info.duration,
                    width: info.width,
                    height: info.height,
                }),
                Err(e) => warn!("[ASSETS] Skipping unreadable video: {}", e),
            }
        }
        info!(
            "[ASSETS] Found {} video files in {:?}",
            sources.len(),
            self.video_dir
        );
        Ok(order_sources(sources, &self.order))
    }
}
