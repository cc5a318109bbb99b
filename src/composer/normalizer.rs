// REELFORGE Frame Normalizer
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Crop-to-fill onto the vertical canvas. Never letterboxes: the source is
// scaled until the constraining axis fits exactly, then the overflow on the
// other axis is cut evenly from both sides.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composer::selector::{ClipSpec, SourceVideo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Region of the source frame, in source pixels, that survives the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centred crop window with the target's aspect ratio.
pub fn crop_window(source: Resolution, target: Resolution) -> CropWindow {
    let (sw, sh) = (source.width.max(1) as u64, source.height.max(1) as u64);
    let (tw, th) = (target.width.max(1) as u64, target.height.max(1) as u64);

    if sw * th > sh * tw {
        // Wider than the target: keep full height, trim the sides
        let width = ((sh * tw) as f64 / th as f64).round().clamp(1.0, sw as f64) as u64;
        CropWindow {
            x: ((sw - width) / 2) as u32,
            y: 0,
            width: width as u32,
            height: sh as u32,
        }
    } else {
        let height = ((sw * th) as f64 / tw as f64).round().clamp(1.0, sh as f64) as u64;
        CropWindow {
            x: 0,
            y: ((sh - height) / 2) as u32,
            width: sw as u32,
            height: height as u32,
        }
    }
}

/// A selected clip together with the crop that maps it onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedClip {
    pub clip: ClipSpec,
    pub source_resolution: Resolution,
    pub target: Resolution,
    pub crop: CropWindow,
}

impl NormalizedClip {
    pub fn duration(&self) -> f64 {
        self.clip.duration()
    }

    /// ffmpeg filter chain producing frames at exactly the target size.
    pub fn ffmpeg_filter(&self) -> String {
        format!(
            "crop={}:{}:{}:{},scale={}:{}:flags=lanczos,setsar=1",
            self.crop.width,
            self.crop.height,
            self.crop.x,
            self.crop.y,
            self.target.width,
            self.target.height
        )
    }
}

pub fn normalize(clip: &ClipSpec, source: &SourceVideo, target: Resolution) -> NormalizedClip {
    let source_resolution = Resolution::new(source.width, source.height);
    let crop = crop_window(source_resolution, target);
    debug!(
        "[NORMALIZE] {:?} {} -> crop {}x{}+{}+{} -> {}",
        clip.source,
        source_resolution,
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        target
    );
    NormalizedClip {
        clip: clip.clone(),
        source_resolution,
        target,
        crop,
    }
}

/// Normalize every clip. `clips[i].source_index` indexes into `sources`;
/// clips pointing outside it are skipped.
pub fn normalize_clips(
    clips: &[ClipSpec],
    sources: &[SourceVideo],
    target: Resolution,
) -> Vec<NormalizedClip> {
    clips
        .iter()
        .filter_map(|clip| {
            sources
                .get(clip.source_index)
                .map(|source| normalize(clip, source, target))
        })
        .collect()
}

/// Crop and scale one decoded frame onto the canvas.
pub fn normalize_frame(frame: &DynamicImage, target: Resolution) -> RgbImage {
    let (width, height) = frame.dimensions();
    let crop = crop_window(Resolution::new(width, height), target);
    frame
        .crop_imm(crop.x, crop.y, crop.width, crop.height)
        .resize_exact(target.width, target.height, FilterType::Triangle)
        .to_rgb8()
}

pub fn normalize_frames(frames: &[DynamicImage], target: Resolution) -> Vec<RgbImage> {
    frames
        .par_iter()
        .map(|frame| normalize_frame(frame, target))
        .collect()
}
