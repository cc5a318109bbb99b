// Shared fakes for the integration tests: in-memory assets, a fixed
// transcriber and a renderer that writes a placeholder file.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reelforge_core::composer::assets::AssetProvider;
use reelforge_core::composer::audio::AudioTrack;
use reelforge_core::composer::pipeline::ComposerPipeline;
use reelforge_core::composer::render::{OutputVideo, RenderJob, Renderer};
use reelforge_core::composer::selector::SourceVideo;
use reelforge_core::composer::transcription::{TranscriptSegment, Transcriber};
use reelforge_core::config::ComposerConfig;
use reelforge_core::error::{ComposeError, RenderError, TranscriptionError};

pub fn video(name: &str, duration: f64, width: u32, height: u32) -> SourceVideo {
    SourceVideo {
        path: PathBuf::from(name),
        duration,
        width,
        height,
    }
}

pub fn default_sources() -> Vec<SourceVideo> {
    vec![
        video("bg/city.mp4", 30.0, 1920, 1080),
        video("bg/forest.mov", 12.0, 1440, 1080),
        video("bg/portrait.mp4", 20.0, 1080, 1920),
    ]
}

/// Assets held in memory. Audio ids listed in `short_for` only get
/// backgrounds that are too short to use.
pub struct FakeAssets {
    pub durations: HashMap<String, f64>,
    pub sources: Vec<SourceVideo>,
    pub short_for: Vec<String>,
}

impl FakeAssets {
    pub fn new(durations: &[(&str, f64)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(id, d)| (id.to_string(), *d))
                .collect(),
            sources: default_sources(),
            short_for: Vec::new(),
        }
    }
}

#[async_trait]
impl AssetProvider for FakeAssets {
    async fn audio_track(&self, id: &str) -> Result<AudioTrack, ComposeError> {
        match self.durations.get(id) {
            Some(duration) => Ok(AudioTrack {
                path: PathBuf::from(id),
                duration: *duration,
            }),
            None => Err(ComposeError::AudioNotFound {
                path: PathBuf::from(id),
            }),
        }
    }

    async fn backgrounds_for(&self, audio: &AudioTrack) -> Result<Vec<SourceVideo>, ComposeError> {
        let id = audio.path.to_string_lossy();
        if self.short_for.iter().any(|s| s.as_str() == id) {
            return Ok(vec![video("bg/tiny.mp4", 2.0, 1920, 1080)]);
        }
        Ok(self.sources.clone())
    }
}

/// Returns the same transcript for every track, cut to its duration.
pub struct FixedTranscriber {
    pub segments: Vec<TranscriptSegment>,
    pub calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn transcribe(
        &self,
        audio: &AudioTrack,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let segments: Vec<_> = self
            .segments
            .iter()
            .filter(|s| s.start < audio.duration)
            .cloned()
            .collect();
        if segments.is_empty() {
            return Err(TranscriptionError::EmptyTranscript {
                path: audio.path.clone(),
            });
        }
        Ok(segments)
    }
}

pub fn story_segments() -> Vec<TranscriptSegment> {
    vec![
        TranscriptSegment::new("It was a quiet night in the city", 0.0, 2.4),
        TranscriptSegment::new("until the lights went out", 2.6, 4.0),
        TranscriptSegment::new("Nobody expected what happened next, not even the people who had lived there all their lives", 4.2, 13.0),
        TranscriptSegment::new("Silence", 13.5, 13.8),
        TranscriptSegment::new("Then a knock", 14.0, 15.5),
    ]
}

/// Writes a small placeholder to the part path, or fails when asked to.
pub struct FakeRenderer {
    pub renders: AtomicUsize,
    pub fail_after_partial_write: bool,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            renders: AtomicUsize::new(0),
            fail_after_partial_write: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            renders: AtomicUsize::new(0),
            fail_after_partial_write: true,
        }
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, job: &RenderJob) -> Result<OutputVideo, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if job.timeline.is_empty() {
            return Err(RenderError::EmptyTimeline);
        }
        tokio::fs::write(&job.output, b"not really an mp4").await?;
        if self.fail_after_partial_write {
            return Err(RenderError::Encoder {
                status: "exit status: 1".to_string(),
                stderr_tail: "simulated encoder crash".to_string(),
            });
        }
        Ok(OutputVideo {
            path: job.output.clone(),
            generated_at_ms: job.generated_at_ms,
            duration: job.audio.duration,
            clip_count: job.timeline.clips.len(),
            caption_count: job.captions.len(),
        })
    }
}

pub fn pipeline_with(
    config: ComposerConfig,
    assets: FakeAssets,
    renderer: Arc<FakeRenderer>,
) -> ComposerPipeline {
    ComposerPipeline::new(
        Arc::new(config),
        Arc::new(assets),
        Arc::new(FixedTranscriber::new(story_segments())),
        renderer,
    )
}
