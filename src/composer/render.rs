// REELFORGE Render Pipeline
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Final encode: the composite timeline, narration audio and burned-in
// captions go through a single ffmpeg invocation. Clip trims, crop/scale,
// fades, concat and drawtext overlays are expressed as one filter graph
// written to a script file inside a per-unit scratch directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::composer::audio::AudioTrack;
use crate::composer::captions::{wrap_lines, Caption};
use crate::composer::compositor::CompositeTimeline;
use crate::composer::probe::safe_arg_path;
use crate::config::{CaptionStyle, EncodeSettings};
use crate::encoder_backend::EncoderBackend;
use crate::error::RenderError;

const STDERR_TAIL_LINES: usize = 20;

/// Everything needed to encode one unit.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub timeline: CompositeTimeline,
    pub audio: AudioTrack,
    pub captions: Vec<Caption>,
    /// Where the encoded file is written.
    pub output: PathBuf,
    /// Unix milliseconds identifying this generation.
    pub generated_at_ms: u64,
}

/// A finished, write-once artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputVideo {
    pub path: PathBuf,
    pub generated_at_ms: u64,
    pub duration: f64,
    pub clip_count: usize,
    pub caption_count: usize,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<OutputVideo, RenderError>;
}

pub struct FfmpegRenderer {
    style: CaptionStyle,
    encode: EncodeSettings,
    line_chars: usize,
    backend: EncoderBackend,
    encode_slots: Arc<Semaphore>,
}

impl FfmpegRenderer {
    pub fn new(
        style: CaptionStyle,
        encode: EncodeSettings,
        line_chars: usize,
        backend: EncoderBackend,
        max_concurrent_encodes: usize,
    ) -> Self {
        info!(
            "[RENDER] Encoder: {} (max {} concurrent encodes)",
            backend, max_concurrent_encodes
        );
        Self {
            style,
            encode,
            line_chars,
            backend,
            encode_slots: Arc::new(Semaphore::new(max_concurrent_encodes.max(1))),
        }
    }

    /// Write caption text files and the filter script into `work_dir`.
    fn prepare_work_dir(&self, job: &RenderJob, work_dir: &Path) -> Result<PathBuf, RenderError> {
        let mut caption_files = Vec::with_capacity(job.captions.len());
        for (i, caption) in job.captions.iter().enumerate() {
            let name = format!("cap_{:03}.txt", i);
            std::fs::write(work_dir.join(&name), wrap_lines(&caption.text, self.line_chars))?;
            caption_files.push(name);
        }

        let graph = build_filter_graph(&job.timeline, &job.captions, &caption_files, &self.style);
        let script = work_dir.join("filter_graph.txt");
        std::fs::write(&script, &graph)?;
        debug!("[RENDER] Filter graph:\n{}", graph);
        Ok(script)
    }

    fn ffmpeg_args(&self, job: &RenderJob, filter_script: &Path) -> std::io::Result<Vec<OsString>> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-nostdin"]
            .into_iter()
            .map(OsString::from)
            .collect();

        for clip in &job.timeline.clips {
            args.push("-ss".into());
            args.push(format!("{:.3}", clip.clip.clip.in_point).into());
            args.push("-t".into());
            args.push(format!("{:.3}", clip.duration).into());
            args.push("-i".into());
            args.push(safe_arg_path(&absolutize(&clip.clip.clip.source)?).into());
        }
        args.push("-i".into());
        args.push(safe_arg_path(&absolutize(&job.audio.path)?).into());

        args.push("-filter_complex_script".into());
        args.push(filter_script.as_os_str().to_os_string());

        let audio_input = job.timeline.clips.len();
        args.push("-map".into());
        args.push("[vout]".into());
        args.push("-map".into());
        args.push(format!("{}:a:0", audio_input).into());

        args.extend(self.backend.video_args(&self.encode).into_iter().map(OsString::from));
        args.push("-r".into());
        args.push(self.encode.fps.to_string().into());
        args.push("-c:a".into());
        args.push(self.encode.audio_codec.clone().into());
        args.push("-b:a".into());
        args.push(self.encode.audio_bitrate.clone().into());
        args.push("-t".into());
        args.push(format!("{:.3}", job.audio.duration).into());
        args.push("-movflags".into());
        args.push("+faststart".into());
        args.push(safe_arg_path(&absolutize(&job.output)?).into());
        Ok(args)
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob) -> Result<OutputVideo, RenderError> {
        if job.timeline.is_empty() {
            return Err(RenderError::EmptyTimeline);
        }

        let work_dir = tempfile::Builder::new().prefix("reelforge_").tempdir()?;
        let script = self.prepare_work_dir(job, work_dir.path())?;
        let args = self.ffmpeg_args(job, &script)?;

        let _permit = self
            .encode_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RenderError::Cancelled)?;

        info!(
            "[RENDER] Encoding {:?} ({} clips, {} captions, {:.2}s)",
            job.output,
            job.timeline.clips.len(),
            job.captions.len(),
            job.audio.duration
        );

        let output = Command::new("ffmpeg")
            .args(&args)
            .current_dir(work_dir.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(RenderError::Spawn)?;

        if !output.status.success() {
            let stderr_tail = tail_lines(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES);
            error!("[RENDER] ffmpeg failed for {:?}: {}", job.output, stderr_tail);
            return Err(RenderError::Encoder {
                status: output.status.to_string(),
                stderr_tail,
            });
        }

        info!("[RENDER] Encoded {:?}", job.output);
        Ok(OutputVideo {
            path: job.output.clone(),
            generated_at_ms: job.generated_at_ms,
            duration: job.audio.duration,
            clip_count: job.timeline.clips.len(),
            caption_count: job.captions.len(),
        })
    }
}

/// Filter graph for the whole unit. Input `i` is clip `i`; the audio input
/// comes after the clips and is mapped directly.
pub fn build_filter_graph(
    timeline: &CompositeTimeline,
    captions: &[Caption],
    caption_files: &[String],
    style: &CaptionStyle,
) -> String {
    let mut graph = String::new();

    for (i, clip) in timeline.clips.iter().enumerate() {
        let mut chain = format!(
            "[{}:v]{},fps={},format=yuv420p,setpts=PTS-STARTPTS",
            i,
            clip.clip.ffmpeg_filter(),
            timeline.fps
        );
        let fades = clip.fade_filter();
        if !fades.is_empty() {
            chain.push(',');
            chain.push_str(&fades);
        }
        graph.push_str(&format!("{}[v{}];\n", chain, i));
    }

    let labels: String = (0..timeline.clips.len())
        .map(|i| format!("[v{}]", i))
        .collect();
    graph.push_str(&format!(
        "{}concat=n={}:v=1:a=0[bg];\n",
        labels,
        timeline.clips.len()
    ));

    let overlays: Vec<String> = captions
        .iter()
        .zip(caption_files)
        .map(|(caption, file)| drawtext_filter(caption, file, style))
        .collect();
    if overlays.is_empty() {
        graph.push_str("[bg]null[vout]");
    } else {
        graph.push_str(&format!("[bg]{}[vout]", overlays.join(",\n")));
    }
    graph
}

/// Centred drawtext overlay shown for exactly `[start, end)`.
pub fn drawtext_filter(caption: &Caption, text_file: &str, style: &CaptionStyle) -> String {
    let mut filter = format!(
        "drawtext=textfile='{}':expansion=none:fontsize={}:fontcolor={}:borderw={}:bordercolor={}",
        escape_filter_value(text_file),
        style.font_size,
        style.font_color,
        style.border_width,
        style.border_color
    );
    if let Some(font) = &style.font_file {
        filter.push_str(&format!(
            ":fontfile='{}'",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    filter.push_str(&format!(
        ":line_spacing=8:x=(w-text_w)/2:y=(h-text_h)/2:enable='gte(t,{:.3})*lt(t,{:.3})'",
        caption.start, caption.end
    ));
    filter
}

/// Escape a value placed inside single quotes in a filter graph.
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "/")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
