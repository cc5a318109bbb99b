// REELFORGE Transition Compositor
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Lays normalized clips end to end and assigns fades. Fades sit inside each
// clip's own duration, so the timeline is exactly as long as the clips are
// and narration sync never drifts. Every internal boundary gets a matching
// fade-out / fade-in pair; the first clip fades in from black and the last
// fades out to black.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::composer::normalizer::{NormalizedClip, Resolution};

/// One clip placed on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineClip {
    pub clip: NormalizedClip,
    /// Start on the output timeline (seconds).
    pub offset: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl TimelineClip {
    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }

    /// Brightness multiplier at `local` seconds into the clip.
    pub fn opacity_at(&self, local: f64) -> f64 {
        let mut alpha: f64 = 1.0;
        if self.fade_in > 0.0 && local < self.fade_in {
            alpha = alpha.min(local.max(0.0) / self.fade_in);
        }
        let tail_start = self.duration - self.fade_out;
        if self.fade_out > 0.0 && local > tail_start {
            alpha = alpha.min(((self.duration - local) / self.fade_out).max(0.0));
        }
        alpha.clamp(0.0, 1.0)
    }

    /// ffmpeg `fade` filters in clip-local time. Empty when the clip has no fades.
    pub fn fade_filter(&self) -> String {
        let mut parts = Vec::new();
        if self.fade_in > 0.0 {
            parts.push(format!("fade=t=in:st=0:d={:.3}", self.fade_in));
        }
        if self.fade_out > 0.0 {
            parts.push(format!(
                "fade=t=out:st={:.3}:d={:.3}",
                self.duration - self.fade_out,
                self.fade_out
            ));
        }
        parts.join(",")
    }
}

/// The visual track for one unit, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeTimeline {
    pub clips: Vec<TimelineClip>,
    pub canvas: Resolution,
    pub fps: u32,
}

impl CompositeTimeline {
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Equal to the sum of clip durations.
    pub fn total_duration(&self) -> f64 {
        self.clips.last().map(|c| c.end()).unwrap_or(0.0)
    }

    /// Index of the clip visible at `t` and the clip-local time.
    pub fn clip_at(&self, t: f64) -> Option<(usize, f64)> {
        if t < 0.0 || t >= self.total_duration() {
            return None;
        }
        let idx = self.clips.partition_point(|c| c.end() <= t);
        self.clips.get(idx).map(|c| (idx, t - c.offset))
    }

    pub fn opacity_at(&self, t: f64) -> f64 {
        self.clip_at(t)
            .map(|(i, local)| self.clips[i].opacity_at(local))
            .unwrap_or(0.0)
    }
}

pub struct TransitionCompositor {
    fade_duration: f64,
    canvas: Resolution,
    fps: u32,
}

impl TransitionCompositor {
    pub fn new(fade_duration: f64, canvas: Resolution, fps: u32) -> Self {
        Self {
            fade_duration: fade_duration.max(0.0),
            canvas,
            fps,
        }
    }

    /// Fade for the boundary between clips of length `a` and `b`: never more
    /// than half of either.
    pub fn boundary_fade(&self, a: f64, b: f64) -> f64 {
        self.fade_duration.min(a / 2.0).min(b / 2.0)
    }

    pub fn compose(&self, clips: Vec<NormalizedClip>) -> CompositeTimeline {
        let durations: Vec<f64> = clips.iter().map(|c| c.duration().max(0.0)).collect();
        let n = durations.len();

        let mut offset = 0.0;
        let mut placed = Vec::with_capacity(n);
        for (i, clip) in clips.into_iter().enumerate() {
            let duration = durations[i];
            let fade_in = if i == 0 {
                self.fade_duration.min(duration / 2.0)
            } else {
                self.boundary_fade(durations[i - 1], duration)
            };
            let fade_out = if i + 1 == n {
                self.fade_duration.min(duration / 2.0)
            } else {
                self.boundary_fade(duration, durations[i + 1])
            };
            if fade_in < self.fade_duration || fade_out < self.fade_duration {
                debug!(
                    "[COMPOSE] Clip {} ({:.2}s) uses shortened fades in={:.3}s out={:.3}s",
                    i, duration, fade_in, fade_out
                );
            }

            placed.push(TimelineClip {
                clip,
                offset,
                duration,
                fade_in,
                fade_out,
            });
            offset += duration;
        }

        let timeline = CompositeTimeline {
            clips: placed,
            canvas: self.canvas,
            fps: self.fps,
        };
        info!(
            "[COMPOSE] Timeline of {} clips, {:.3}s at {} {}fps",
            timeline.clips.len(),
            timeline.total_duration(),
            timeline.canvas,
            timeline.fps
        );
        timeline
    }
}

/// Darken a frame toward black by `alpha` (1.0 leaves it unchanged).
pub fn apply_opacity(frame: &mut RgbImage, alpha: f64) {
    let alpha = alpha.clamp(0.0, 1.0) as f32;
    if alpha >= 1.0 {
        return;
    }
    for px in frame.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = (*c as f32 * alpha).round() as u8;
        }
    }
}
