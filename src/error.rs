// REELFORGE Error Taxonomy
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Every failure is local to one generation unit. The batch driver records
// the unit's `ComposeError` and moves on to the next audio file.

use std::path::PathBuf;
use thiserror::Error;

/// Speech-to-text failures. Never retried at the adapter layer.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Audio {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Audio {path} is silent throughout")]
    Silent { path: PathBuf },

    #[error("Transcription of {path} produced no text")]
    EmptyTranscript { path: PathBuf },

    #[error("Transcription service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Transcription service returned an invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Speech model error: {reason}")]
    Model { reason: String },
}

/// No background footage can cover a single segment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsufficientAssetsError {
    #[error("No background videos available")]
    NoSources,

    #[error("No background video is at least {required:.2}s long (longest is {longest:.2}s)")]
    AllTooShort { required: f64, longest: f64 },
}

/// Encode / mux failures from the codec engine.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Nothing to render: the visual timeline is empty")]
    EmptyTimeline,

    #[error("Encoder exited with {status}: {stderr_tail}")]
    Encoder { status: String, stderr_tail: String },

    #[error("Failed to launch encoder: {0}")]
    Spawn(std::io::Error),

    #[error("Render I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render cancelled")]
    Cancelled,
}

/// ffprobe / container inspection failures.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run ffprobe on {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffprobe failed on {path}: {message}")]
    Failed { path: PathBuf, message: String },

    #[error("Could not parse probe output for {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Umbrella error for one audio-to-video unit.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Audio file {path} not found")]
    AudioNotFound { path: PathBuf },

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    InsufficientAssets(#[from] InsufficientAssetsError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    /// Short machine-readable category used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ComposeError::AudioNotFound { .. } => "audio_not_found",
            ComposeError::Transcription(_) => "transcription",
            ComposeError::InsufficientAssets(_) => "insufficient_assets",
            ComposeError::Render(_) => "render",
            ComposeError::Probe(_) => "probe",
            ComposeError::Io(_) => "io",
        }
    }
}

/// Configuration file problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
