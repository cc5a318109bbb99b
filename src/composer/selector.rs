// REELFORGE Background Segment Selector
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Cuts background footage into fixed-length windows covering the narration.
// Sources are visited round-robin so consecutive clips come from different
// files whenever more than one is usable.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{ExhaustionPolicy, SourceOrder};
use crate::error::InsufficientAssetsError;

const EPS: f64 = 1e-9;

/// A background video available to the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVideo {
    pub path: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// One window `[in_point, out_point)` of a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Index into the source list handed to `select`.
    pub source_index: usize,
    pub source: PathBuf,
    pub in_point: f64,
    pub out_point: f64,
}

impl ClipSpec {
    pub fn duration(&self) -> f64 {
        self.out_point - self.in_point
    }
}

/// Apply the configured visiting order.
pub fn order_sources(mut sources: Vec<SourceVideo>, order: &SourceOrder) -> Vec<SourceVideo> {
    match order {
        SourceOrder::Input => {}
        SourceOrder::Sorted => sources.sort_by(|a, b| a.path.cmp(&b.path)),
        SourceOrder::Shuffled { seed } => {
            // Sort first so discovery order cannot change the result
            sources.sort_by(|a, b| a.path.cmp(&b.path));
            let mut rng = StdRng::seed_from_u64(*seed);
            sources.shuffle(&mut rng);
        }
    }
    sources
}

/// Number of windows needed to cover `total` seconds.
pub fn segment_count(total: f64, segment_length: f64) -> usize {
    if total <= 0.0 {
        return 0;
    }
    ((total / segment_length) - EPS).ceil().max(1.0) as usize
}

/// Produce clip windows whose durations sum to exactly `total_duration`.
///
/// Every clip but the last is `segment_length` long; the last is trimmed.
/// Sources shorter than `segment_length` never contribute a window.
pub fn select(
    sources: &[SourceVideo],
    total_duration: f64,
    segment_length: f64,
    policy: ExhaustionPolicy,
) -> Result<Vec<ClipSpec>, InsufficientAssetsError> {
    if sources.is_empty() {
        return Err(InsufficientAssetsError::NoSources);
    }

    let usable: Vec<usize> = sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.duration + EPS >= segment_length)
        .map(|(i, _)| i)
        .collect();

    if usable.is_empty() {
        let longest = sources
            .iter()
            .map(|s| s.duration)
            .fold(0.0f64, f64::max);
        return Err(InsufficientAssetsError::AllTooShort {
            required: segment_length,
            longest,
        });
    }

    let skipped = sources.len() - usable.len();
    if skipped > 0 {
        debug!(
            "[SELECTOR] Skipping {} source(s) shorter than {:.2}s",
            skipped, segment_length
        );
    }

    let count = segment_count(total_duration, segment_length);
    let m = usable.len();
    let mut cursors = vec![0.0f64; m];
    let mut turn = 0usize;
    let mut clips = Vec::with_capacity(count);

    for k in 0..count {
        let len = if k + 1 == count {
            total_duration - segment_length * (count - 1) as f64
        } else {
            segment_length
        };

        let fits = |slot: usize, cursors: &[f64]| {
            cursors[slot] + len <= sources[usable[slot]].duration + EPS
        };

        let slot = match policy {
            ExhaustionPolicy::Wrap => {
                let slot = turn % m;
                if !fits(slot, &cursors) {
                    cursors[slot] = 0.0;
                }
                slot
            }
            ExhaustionPolicy::Advance => {
                let next = (0..m).map(|o| (turn + o) % m).find(|&s| fits(s, &cursors));
                match next {
                    Some(slot) => slot,
                    None => {
                        debug!("[SELECTOR] All sources spent, restarting from t=0");
                        cursors.iter_mut().for_each(|c| *c = 0.0);
                        turn % m
                    }
                }
            }
        };
        turn = slot + 1;

        let index = usable[slot];
        let in_point = cursors[slot];
        cursors[slot] += len;
        clips.push(ClipSpec {
            source_index: index,
            source: sources[index].path.clone(),
            in_point,
            out_point: in_point + len,
        });
    }

    info!(
        "[SELECTOR] {} clips of {:.2}s from {} usable source(s) for {:.2}s",
        clips.len(),
        segment_length,
        m,
        total_duration
    );
    Ok(clips)
}
