mod common;

use reelforge_core::composer::captions::CaptionPlanner;
use reelforge_core::composer::compositor::TransitionCompositor;
use reelforge_core::composer::normalizer::{crop_window, normalize_clips, normalize_frame, Resolution};
use reelforge_core::composer::selector::select;
use reelforge_core::composer::transcription::{TranscriptSegment, TranscriptWord};
use reelforge_core::config::{CaptionPolicy, ExhaustionPolicy};
use reelforge_core::error::InsufficientAssetsError;

use common::{default_sources, story_segments, video};

const CANVAS: Resolution = Resolution {
    width: 1080,
    height: 1920,
};

#[test]
fn captions_never_overlap() {
    let planner = CaptionPlanner::new(CaptionPolicy::default());

    let mut word_segment = TranscriptSegment::new("ignored", 16.0, 20.0);
    word_segment.words = (0..12)
        .map(|i| TranscriptWord {
            text: format!("word{}", i),
            start: 16.0 + i as f64 * 0.3,
            end: 16.0 + i as f64 * 0.3 + 0.2,
        })
        .collect();

    let mut segments = story_segments();
    segments.push(TranscriptSegment::new("overlapping mess", 14.5, 16.5));
    segments.push(word_segment);

    let captions = planner.plan(&segments, 19.0);
    assert!(!captions.is_empty());
    for pair in captions.windows(2) {
        assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
        assert!(pair[0].start <= pair[1].start);
    }
    assert!(captions.iter().all(|c| c.end <= 19.0 && c.start < c.end));
    assert!(captions.iter().all(|c| c.duration() <= 7.0 + 1e-9));
}

#[test]
fn clip_durations_sum_to_total() {
    let sources = default_sources();
    for total in [0.4, 5.0, 9.99, 23.0, 61.7, 180.25] {
        for policy in [ExhaustionPolicy::Advance, ExhaustionPolicy::Wrap] {
            let clips = select(&sources, total, 5.0, policy).unwrap();
            let sum: f64 = clips.iter().map(|c| c.duration()).sum();
            assert!((sum - total).abs() < 1e-3, "total {} got {}", total, sum);
            for clip in &clips {
                let source = &sources[clip.source_index];
                assert!(clip.in_point >= 0.0);
                assert!(clip.out_point <= source.duration + 1e-9);
            }
        }
    }
}

#[test]
fn twenty_three_seconds_makes_five_clips() {
    let clips = select(&default_sources(), 23.0, 5.0, ExhaustionPolicy::Advance).unwrap();
    assert_eq!(clips.len(), 5);
    let sum: f64 = clips.iter().map(|c| c.duration()).sum();
    assert!((sum - 23.0).abs() < 1e-3);
    assert!(clips[4].duration() < 5.0);
}

#[test]
fn too_short_backgrounds_fail_before_any_work() {
    let sources = vec![video("a.mp4", 1.0, 1920, 1080), video("b.mp4", 4.9, 1920, 1080)];
    let err = select(&sources, 30.0, 5.0, ExhaustionPolicy::Advance).unwrap_err();
    assert!(matches!(err, InsufficientAssetsError::AllTooShort { .. }));
}

#[test]
fn every_aspect_ratio_lands_on_the_canvas() {
    // 16:9, 4:3, 9:16, and an odd one
    for (w, h) in [(1920, 1080), (1440, 1080), (1080, 1920), (1000, 999)] {
        let crop = crop_window(Resolution::new(w, h), CANVAS);
        assert!(crop.x + crop.width <= w && crop.y + crop.height <= h);
        // crop keeps the canvas aspect within a pixel of rounding
        let ratio = crop.width as f64 / crop.height as f64;
        assert!((ratio - 1080.0 / 1920.0).abs() < 0.01, "{}x{} -> {:?}", w, h, crop);

        let frame = image::DynamicImage::new_rgb8(w / 8, h / 8);
        let out = normalize_frame(&frame, CANVAS);
        assert_eq!(out.dimensions(), (1080, 1920));
    }
}

#[test]
fn three_five_second_clips_stay_fifteen_seconds() {
    let sources = vec![video("a.mp4", 60.0, 1920, 1080)];
    let clips = select(&sources, 15.0, 5.0, ExhaustionPolicy::Advance).unwrap();
    let normalized = normalize_clips(&clips, &sources, CANVAS);
    let timeline = TransitionCompositor::new(0.5, CANVAS, 24).compose(normalized);

    assert_eq!(timeline.clips.len(), 3);
    assert!((timeline.total_duration() - 15.0).abs() < 1e-9);
    assert!(timeline.clips.iter().all(|c| c.fade_in == 0.5 && c.fade_out == 0.5));
}
