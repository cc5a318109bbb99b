// REELFORGE Caption Planner
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Turns transcript segments into a display-ready caption track.
//
// Stages, in order:
// 1. word timings (when present) are grouped into short phrases
// 2. overlapping spans are clamped so each starts at the previous end
// 3. spans that are too long or too wordy are split at word boundaries,
//    with time divided in proportion to character count
// 4. short captions are stretched toward the next caption's start
// 5. everything is clamped to the audio duration

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::composer::transcription::{TranscriptSegment, TranscriptWord};
use crate::config::CaptionPolicy;

const EPS: f64 = 1e-9;

/// A caption visible during `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Caption {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

pub struct CaptionPlanner {
    policy: CaptionPolicy,
}

impl CaptionPlanner {
    pub fn new(policy: CaptionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CaptionPolicy {
        &self.policy
    }

    /// Build the caption track for one audio file.
    ///
    /// The result is ordered by start and never overlaps:
    /// `captions[i].end <= captions[i + 1].start`, and no caption runs past
    /// `audio_duration`.
    pub fn plan(&self, segments: &[TranscriptSegment], audio_duration: f64) -> Vec<Caption> {
        let mut spans = self.collect_phrases(segments);
        spans.sort_by(|a, b| a.start.total_cmp(&b.start));

        let spans = clamp_overlaps(spans);

        let mut split = Vec::with_capacity(spans.len());
        for span in spans {
            self.split_into(&span.text, span.start, span.end, &mut split);
        }

        let extended = self.extend_short(split, audio_duration);
        let captions = clamp_to_duration(extended, audio_duration);

        info!(
            "[CAPTIONS] Planned {} captions from {} transcript segments",
            captions.len(),
            segments.len()
        );
        captions
    }

    /// Word-timed segments are regrouped into phrases; plain segments pass
    /// through unchanged.
    fn collect_phrases(&self, segments: &[TranscriptSegment]) -> Vec<Caption> {
        let mut phrases = Vec::new();
        let mut pending: Vec<TranscriptWord> = Vec::new();

        for segment in segments {
            if segment.words.is_empty() {
                phrases.extend(group_words(&pending, &self.policy));
                pending.clear();
                phrases.push(Caption {
                    text: normalize_whitespace(&segment.text),
                    start: segment.start,
                    end: segment.end,
                });
            } else {
                pending.extend(segment.words.iter().cloned());
            }
        }
        phrases.extend(group_words(&pending, &self.policy));

        phrases.retain(|p| !p.text.is_empty());
        phrases
    }

    /// Recursively split one span until it satisfies the display policy or
    /// is a single word.
    fn split_into(&self, text: &str, start: f64, end: f64, out: &mut Vec<Caption>) {
        let words: Vec<&str> = text.split_whitespace().collect();
        let joined = words.join(" ");
        let total_chars = joined.chars().count();
        let duration = end - start;

        let too_long = duration > self.policy.max_display + EPS;
        let too_wide = total_chars > self.policy.max_chars;
        if words.len() <= 1 || (!too_long && !too_wide) {
            out.push(Caption {
                text: joined,
                start,
                end,
            });
            return;
        }

        let by_time = (duration / self.policy.max_display).ceil() as usize;
        let by_chars = (total_chars as f64 / self.policy.max_chars as f64).ceil() as usize;
        let pieces = by_time.max(by_chars).clamp(2, words.len());

        let cuts = word_cuts(&words, pieces);
        debug!(
            "[CAPTIONS] Splitting {:.2}s / {} chars into {} pieces",
            duration, total_chars, pieces
        );

        let chunks: Vec<String> = cuts
            .windows(2)
            .map(|w| words[w[0]..w[1]].join(" "))
            .collect();

        // Shared boundaries keep pieces contiguous and the last end exact
        let weights: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        let weight_total: usize = weights.iter().sum();
        let mut bounds = Vec::with_capacity(chunks.len() + 1);
        bounds.push(start);
        let mut acc = 0usize;
        for (i, w) in weights.iter().enumerate() {
            acc += w;
            if i + 1 == weights.len() {
                bounds.push(end);
            } else {
                bounds.push(start + duration * acc as f64 / weight_total.max(1) as f64);
            }
        }

        for (i, chunk) in chunks.iter().enumerate() {
            self.split_into(chunk, bounds[i], bounds[i + 1], out);
        }
    }

    /// Stretch captions shorter than `min_display` forward, up to the next
    /// caption's start (or the end of audio). Never shrinks a caption.
    fn extend_short(&self, mut captions: Vec<Caption>, audio_duration: f64) -> Vec<Caption> {
        for i in 0..captions.len() {
            if captions[i].duration() >= self.policy.min_display {
                continue;
            }
            let limit = captions
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(audio_duration);
            let target = (captions[i].start + self.policy.min_display).min(limit);
            if target > captions[i].end {
                captions[i].end = target;
            }
        }
        captions
    }
}

/// Group timed words into phrases. A new phrase starts when the current one
/// already holds `words_per_phrase` words, the pause since the previous word
/// exceeds `pause_gap`, or the phrase would span more than `max_phrase_span`.
pub fn group_words(words: &[TranscriptWord], policy: &CaptionPolicy) -> Vec<Caption> {
    let mut phrases = Vec::new();
    let mut current: Vec<&TranscriptWord> = Vec::new();
    let mut phrase_start = 0.0;

    let flush = |current: &mut Vec<&TranscriptWord>, phrases: &mut Vec<Caption>| {
        if let (Some(first), Some(last)) = (current.first(), current.last()) {
            let text = current
                .iter()
                .map(|w| w.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            phrases.push(Caption {
                text,
                start: first.start,
                end: last.end,
            });
        }
        current.clear();
    };

    for word in words {
        let starts_new = match current.last() {
            None => true,
            Some(prev) => {
                current.len() >= policy.words_per_phrase
                    || word.start - prev.end > policy.pause_gap
                    || word.end - phrase_start > policy.max_phrase_span
            }
        };
        if starts_new {
            flush(&mut current, &mut phrases);
            phrase_start = word.start;
        }
        current.push(word);
    }
    flush(&mut current, &mut phrases);

    phrases
}

/// Start each span no earlier than the previous span's end. Spans that end
/// up with no time left (fully inside an earlier span) are dropped.
fn clamp_overlaps(spans: Vec<Caption>) -> Vec<Caption> {
    let mut prev_end = 0.0f64;
    spans
        .into_iter()
        .filter_map(|mut span| {
            let original = (span.start, span.end);
            let clamped = prev_end > span.start;
            span.start = span.start.max(prev_end);
            span.end = span.end.max(span.start);
            if clamped && span.end - span.start <= EPS {
                debug!(
                    "[CAPTIONS] Dropping contained segment {:?} ({:.2}-{:.2})",
                    span.text, original.0, original.1
                );
                return None;
            }
            prev_end = span.end;
            Some(span)
        })
        .collect()
}

fn clamp_to_duration(captions: Vec<Caption>, audio_duration: f64) -> Vec<Caption> {
    captions
        .into_iter()
        .filter_map(|mut c| {
            c.start = c.start.min(audio_duration);
            c.end = c.end.min(audio_duration);
            if c.end - c.start > EPS {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// Word indices where a span of `words` is cut into `pieces` chunks. Each
/// cut is the word boundary nearest an even share of the characters.
fn word_cuts(words: &[&str], pieces: usize) -> Vec<usize> {
    let n = words.len();
    // offsets[j] = characters before word j, counting single spaces
    let mut offsets = Vec::with_capacity(n + 1);
    let mut acc = 0usize;
    offsets.push(0);
    for (j, w) in words.iter().enumerate() {
        acc += w.chars().count();
        if j + 1 < n {
            acc += 1;
        }
        offsets.push(acc);
    }
    let total = acc as f64;

    let mut cuts = vec![0usize];
    for k in 1..pieces {
        let target = total * k as f64 / pieces as f64;
        let lo = cuts[cuts.len() - 1] + 1;
        let hi = n - (pieces - k);
        let mut best = lo;
        let mut best_dist = f64::MAX;
        for (j, offset) in offsets.iter().enumerate().take(hi + 1).skip(lo) {
            let dist = (*offset as f64 - target).abs();
            if dist < best_dist {
                best = j;
                best_dist = dist;
            }
        }
        cuts.push(best);
    }
    cuts.push(n);
    cuts
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word wrap to at most `line_chars` per line. Overlong words get a
/// line of their own.
pub fn wrap_lines(text: &str, line_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if !line.is_empty() && needed > line_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// `HH:MM:SS,mmm`
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, ms)
}

pub fn generate_srt(captions: &[Caption]) -> String {
    let mut srt = String::new();
    for (i, caption) in captions.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_time(caption.start),
            format_srt_time(caption.end),
            caption.text
        ));
    }
    srt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> TranscriptWord {
        TranscriptWord {
            text: text.to_string(),
            start,
            end,
        }
    }

    fn planner() -> CaptionPlanner {
        CaptionPlanner::new(CaptionPolicy::default())
    }

    fn assert_ordered(captions: &[Caption]) {
        for pair in captions.windows(2) {
            assert!(
                pair[0].end <= pair[1].start + 1e-9,
                "overlap: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_group_words_breaks_on_count() {
        let words: Vec<_> = (0..7)
            .map(|i| word(&format!("w{}", i), i as f64 * 0.3, i as f64 * 0.3 + 0.25))
            .collect();
        let phrases = group_words(&words, &CaptionPolicy::default());
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].text, "w0 w1 w2 w3 w4");
        assert_eq!(phrases[1].text, "w5 w6");
        assert_eq!(phrases[1].start, 1.5);
    }

    #[test]
    fn test_group_words_breaks_on_pause() {
        let words = vec![
            word("hello", 0.0, 0.4),
            word("there", 0.5, 0.9),
            word("friend", 2.0, 2.5),
        ];
        let phrases = group_words(&words, &CaptionPolicy::default());
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].text, "hello there");
        assert_eq!(phrases[0].end, 0.9);
        assert_eq!(phrases[1].text, "friend");
    }

    #[test]
    fn test_group_words_breaks_on_span() {
        let words = vec![
            word("slow", 0.0, 1.2),
            word("slow", 1.3, 2.5),
            word("speech", 2.6, 3.8),
            word("here", 3.9, 4.5),
        ];
        let phrases = group_words(&words, &CaptionPolicy::default());
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[1].text, "here");
    }

    #[test]
    fn test_overlapping_segments_are_clamped() {
        let segments = vec![
            TranscriptSegment::new("first line", 0.0, 3.0),
            TranscriptSegment::new("second line", 2.0, 5.0),
        ];
        let captions = planner().plan(&segments, 10.0);
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[1].start, 3.0);
        assert_eq!(captions[1].end, 5.0);
        assert_ordered(&captions);
    }

    #[test]
    fn test_long_segment_is_split_at_word_boundary() {
        let segments = vec![TranscriptSegment::new(
            "one two three four five six seven eight nine ten",
            0.0,
            10.0,
        )];
        let captions = planner().plan(&segments, 10.0);
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].text, "one two three four five");
        assert_eq!(captions[1].text, "six seven eight nine ten");
        assert_eq!(captions[0].end, captions[1].start);
        assert_eq!(captions[1].end, 10.0);
        // 23 of 47 characters
        assert!((captions[0].end - 10.0 * 23.0 / 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_wide_segment_is_split_by_chars() {
        let text = "a quick brown fox jumps over the lazy dog and keeps running far away";
        let segments = vec![TranscriptSegment::new(text, 1.0, 4.0)];
        let captions = planner().plan(&segments, 10.0);
        assert!(captions.len() >= 2);
        for c in &captions {
            assert!(c.text.chars().count() <= 42, "{:?}", c);
        }
        assert_eq!(captions.first().unwrap().start, 1.0);
        assert_eq!(captions.last().unwrap().end, 4.0);
        assert_ordered(&captions);
    }

    #[test]
    fn test_contained_segment_is_dropped() {
        let segments = vec![
            TranscriptSegment::new("outer span", 0.0, 5.0),
            TranscriptSegment::new("inside", 1.0, 2.0),
            TranscriptSegment::new("after", 6.0, 7.0),
        ];
        let captions = planner().plan(&segments, 10.0);
        assert_eq!(captions.len(), 2);
        assert!(captions.iter().all(|c| c.text != "inside"));
        assert_eq!(captions[0].text, "outer span");
        assert_eq!((captions[0].start, captions[0].end), (0.0, 5.0));
        assert_eq!(captions[1].text, "after");
        assert_ordered(&captions);
    }

    #[test]
    fn test_single_long_word_is_kept() {
        let segments = vec![TranscriptSegment::new("Supercalifragilistic", 0.0, 9.0)];
        let captions = planner().plan(&segments, 10.0);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].end, 9.0);
    }

    #[test]
    fn test_short_caption_extends_up_to_next_start() {
        let segments = vec![
            TranscriptSegment::new("hi", 0.0, 0.2),
            TranscriptSegment::new("there", 0.6, 0.8),
            TranscriptSegment::new("everyone", 3.0, 3.3),
        ];
        let captions = planner().plan(&segments, 5.0);
        assert_eq!(captions[0].end, 0.6);
        assert!((captions[1].end - 1.6).abs() < 1e-9);
        assert!((captions[2].end - 4.0).abs() < 1e-9);
        assert_ordered(&captions);
    }

    #[test]
    fn test_last_caption_clamped_to_audio() {
        let segments = vec![
            TranscriptSegment::new("ending", 9.5, 9.7),
            TranscriptSegment::new("after the end", 10.5, 11.0),
        ];
        let captions = planner().plan(&segments, 10.0);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].end, 10.0);
    }

    #[test]
    fn test_word_segments_are_grouped_before_policy() {
        let mut seg = TranscriptSegment::new("unused", 0.0, 2.0);
        seg.words = vec![
            word("we", 0.0, 0.2),
            word("went", 0.3, 0.5),
            word("home", 0.6, 0.9),
        ];
        let captions = planner().plan(&[seg], 3.0);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "we went home");
        assert_eq!(captions[0].start, 0.0);
        // stretched to the minimum display time
        assert!((captions[0].end - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_messy_transcript_never_overlaps() {
        let segments = vec![
            TranscriptSegment::new("alpha beta gamma delta epsilon zeta eta theta", 0.0, 9.0),
            TranscriptSegment::new("iota", 8.0, 8.1),
            TranscriptSegment::new("kappa lambda", 8.05, 8.2),
            TranscriptSegment::new("mu", 15.0, 15.1),
        ];
        let captions = planner().plan(&segments, 16.0);
        assert_ordered(&captions);
        assert!(captions.iter().all(|c| c.end <= 16.0));
        assert!(captions.iter().all(|c| c.start < c.end));
    }

    #[test]
    fn test_wrap_lines() {
        assert_eq!(
            wrap_lines("the quick brown fox jumps", 10),
            "the quick\nbrown fox\njumps"
        );
        assert_eq!(wrap_lines("extraordinarily long", 5), "extraordinarily\nlong");
    }

    #[test]
    fn test_srt_output() {
        let captions = vec![
            Caption {
                text: "Hello".to_string(),
                start: 0.0,
                end: 1.5,
            },
            Caption {
                text: "World".to_string(),
                start: 61.25,
                end: 3725.0,
            },
        ];
        let srt = generate_srt(&captions);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:01:01,250 --> 01:02:05,000\nWorld\n\n"
        );
    }
}
