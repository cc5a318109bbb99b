// REELFORGE Composer Pipeline
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// One audio file in, one vertical video out. Stages run strictly in
// sequence for a unit; nothing here is shared between units except the
// renderer's encode limiter.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::composer::assets::{AssetProvider, DirectoryAssets};
use crate::composer::audio::AudioTrack;
use crate::composer::captions::{generate_srt, Caption, CaptionPlanner};
use crate::composer::compositor::{CompositeTimeline, TransitionCompositor};
use crate::composer::normalizer::{normalize_clips, Resolution};
use crate::composer::render::{FfmpegRenderer, OutputVideo, RenderJob, Renderer};
use crate::composer::selector::{select, ClipSpec, SourceVideo};
use crate::composer::transcription::{build_transcriber, Transcriber};
use crate::config::ComposerConfig;
use crate::encoder_backend::select_backend;
use crate::error::ComposeError;

/// Everything decided for a unit before encoding. Deterministic for the
/// same inputs and configuration.
#[derive(Debug, Clone, Serialize)]
pub struct UnitPlan {
    pub audio: AudioTrack,
    pub sources: Vec<SourceVideo>,
    pub clips: Vec<ClipSpec>,
    pub captions: Vec<Caption>,
    pub timeline: CompositeTimeline,
}

/// Output file reserved for one unit. The encoder writes to a hidden part
/// file which is renamed into place on `commit`; dropping an uncommitted
/// slot removes the part file.
pub struct OutputSlot {
    final_path: PathBuf,
    part_path: PathBuf,
    committed: bool,
}

impl OutputSlot {
    pub fn reserve(dir: &Path, generated_at_ms: u64, index: usize) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let stem = format!("video_{}_{}", generated_at_ms, index);
        Ok(Self {
            final_path: dir.join(format!("{}.mp4", stem)),
            part_path: dir.join(format!(".{}.part.mp4", stem)),
            committed: false,
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    pub fn commit(mut self) -> std::io::Result<PathBuf> {
        std::fs::rename(&self.part_path, &self.final_path)?;
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for OutputSlot {
    fn drop(&mut self) {
        if !self.committed && self.part_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.part_path) {
                warn!(
                    "[PIPELINE] Could not remove partial output {:?}: {}",
                    self.part_path, e
                );
            }
        }
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct ComposerPipeline {
    config: Arc<ComposerConfig>,
    assets: Arc<dyn AssetProvider>,
    transcriber: Arc<dyn Transcriber>,
    renderer: Arc<dyn Renderer>,
}

impl ComposerPipeline {
    pub fn new(
        config: Arc<ComposerConfig>,
        assets: Arc<dyn AssetProvider>,
        transcriber: Arc<dyn Transcriber>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config,
            assets,
            transcriber,
            renderer,
        }
    }

    /// Directory assets, the configured transcriber and the ffmpeg renderer.
    pub fn from_config(config: ComposerConfig) -> Result<Self, ComposeError> {
        let assets = DirectoryAssets::new(
            config.audio_dir.clone(),
            config.video_dir.clone(),
            config.source_order.clone(),
        );
        let transcriber = build_transcriber(&config.transcriber)?;
        let renderer = FfmpegRenderer::new(
            config.style.clone(),
            config.encode.clone(),
            config.captions.line_chars,
            select_backend(&config.encode),
            config.max_concurrent_encodes,
        );
        Ok(Self::new(
            Arc::new(config),
            Arc::new(assets),
            transcriber,
            Arc::new(renderer),
        ))
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn canvas(&self) -> Resolution {
        Resolution::new(self.config.canvas_width, self.config.canvas_height)
    }

    /// Transcribe and plan captions only.
    pub async fn captions(&self, audio: &AudioTrack) -> Result<Vec<Caption>, ComposeError> {
        let segments = self.transcriber.transcribe(audio).await?;
        info!(
            "[PIPELINE] {} transcribed {} segments",
            self.transcriber.name(),
            segments.len()
        );
        let planner = CaptionPlanner::new(self.config.captions.clone());
        Ok(planner.plan(&segments, audio.duration))
    }

    /// Decide clips, captions and timeline for one audio identifier.
    pub async fn plan(&self, audio_id: &str) -> Result<UnitPlan, ComposeError> {
        let audio = self.assets.audio_track(audio_id).await?;
        info!(
            "[PIPELINE] Video duration will be {:.2} seconds",
            audio.duration
        );

        // Asset pre-flight happens before the expensive transcription
        let sources = self.assets.backgrounds_for(&audio).await?;
        let clips = select(
            &sources,
            audio.duration,
            self.config.segment_length,
            self.config.exhaustion,
        )?;
        info!("[PIPELINE] Will use {} video clips for this audio", clips.len());

        info!("[PIPELINE] Generating captions from audio...");
        let captions = self.captions(&audio).await?;

        let normalized = normalize_clips(&clips, &sources, self.canvas());
        let compositor = TransitionCompositor::new(
            self.config.fade_duration,
            self.canvas(),
            self.config.encode.fps,
        );
        let timeline = compositor.compose(normalized);

        Ok(UnitPlan {
            audio,
            sources,
            clips,
            captions,
            timeline,
        })
    }

    /// Run one unit end to end. `index` keeps output names unique within a
    /// batch.
    pub async fn generate(&self, index: usize, audio_id: &str) -> Result<OutputVideo, ComposeError> {
        let started = Instant::now();
        info!("[PIPELINE] Processing {}...", audio_id);

        let plan = self.plan(audio_id).await?;

        let generated_at_ms = unix_millis();
        let slot = OutputSlot::reserve(&self.config.output_dir, generated_at_ms, index)?;
        info!(
            "[PIPELINE] Rendering final video as {:?}...",
            slot.final_path()
        );

        let job = RenderJob {
            timeline: plan.timeline,
            audio: plan.audio,
            captions: plan.captions,
            output: slot.part_path().to_path_buf(),
            generated_at_ms,
        };
        let mut video = self.renderer.render(&job).await?;
        video.path = slot.commit()?;

        if self.config.write_srt {
            let srt_path = video.path.with_extension("srt");
            if let Err(e) = tokio::fs::write(&srt_path, generate_srt(&job.captions)).await {
                warn!("[PIPELINE] Failed to write subtitles {:?}: {}", srt_path, e);
            }
        }

        let elapsed = started.elapsed().as_secs();
        info!(
            "[PIPELINE] Completed {} in {} minutes and {} seconds",
            audio_id,
            elapsed / 60,
            elapsed % 60
        );
        Ok(video)
    }
}
