// REELFORGE Audio Intake
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Decodes narration audio with symphonia: duration probing for the
// selector and mono 16 kHz PCM for the speech model.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use crate::error::TranscriptionError;

/// Sample rate expected by Whisper.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;

/// Peak amplitude below which a whole track is treated as silence.
const SILENCE_PEAK: f32 = 1e-3;

/// Narration input for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Seconds.
    pub duration: f64,
}

/// Decoded mono PCM.
#[derive(Debug, Clone)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Pcm {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn unreadable(path: &Path, reason: impl ToString) -> TranscriptionError {
    TranscriptionError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open_format(
    path: &Path,
) -> Result<Box<dyn symphonia::core::formats::FormatReader>, TranscriptionError> {
    let file = File::open(path).map_err(|e| unreadable(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unreadable(path, e))?;
    Ok(probed.format)
}

/// Read the duration from container metadata without decoding.
/// Returns `Ok(None)` when the container does not declare a frame count.
pub fn probe_duration(path: &Path) -> Result<Option<f64>, TranscriptionError> {
    let format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| unreadable(path, "no audio track"))?;

    let params = &track.codec_params;
    match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Ok(Some(frames as f64 / rate as f64)),
        _ => Ok(None),
    }
}

/// Fully decode the default track and down-mix to mono.
pub fn decode_mono(path: &Path) -> Result<Pcm, TranscriptionError> {
    let mut format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| unreadable(path, "no audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| unreadable(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unreadable(path, e))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unreadable(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                mono.extend(downmix(buf.samples(), channels));
            }
            // Corrupt packets are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("[AUDIO] Skipping undecodable packet in {:?}: {}", path, e);
            }
            Err(e) => return Err(unreadable(path, e)),
        }
    }

    debug!(
        "[AUDIO] Decoded {:?}: {} mono samples @ {} Hz",
        path,
        mono.len(),
        sample_rate
    );
    Ok(Pcm {
        samples: mono,
        sample_rate,
    })
}

/// Average interleaved channels into one.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler. Good enough for speech recognition input.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// True when no sample rises above the silence floor.
pub fn is_silent(samples: &[f32]) -> bool {
    samples.iter().all(|s| s.abs() < SILENCE_PEAK)
}

fn check_speech(path: &Path, pcm: &Pcm) -> Result<(), TranscriptionError> {
    if pcm.samples.is_empty() {
        return Err(unreadable(path, "no audio samples decoded"));
    }
    if is_silent(&pcm.samples) {
        return Err(TranscriptionError::Silent {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Decode off the async runtime and fail on unreadable or silent audio.
pub async fn ensure_speech(path: &Path) -> Result<(), TranscriptionError> {
    let owned = path.to_path_buf();
    let pcm = tokio::task::spawn_blocking(move || decode_mono(&owned))
        .await
        .map_err(|e| unreadable(path, e))??;
    check_speech(path, &pcm)?;
    debug!("[AUDIO] {:?} carries speech-level signal", path);
    Ok(())
}

/// Decode, reject silence, and resample to the speech model rate.
pub fn load_speech_pcm(path: &Path) -> Result<Vec<f32>, TranscriptionError> {
    let pcm = decode_mono(path)?;
    check_speech(path, &pcm)?;

    if pcm.sample_rate != SPEECH_SAMPLE_RATE {
        info!(
            "[AUDIO] Resampling {} Hz -> {} Hz ({:.2}s)",
            pcm.sample_rate,
            SPEECH_SAMPLE_RATE,
            pcm.duration()
        );
    }
    Ok(resample_linear(
        &pcm.samples,
        pcm.sample_rate,
        SPEECH_SAMPLE_RATE,
    ))
}
