// REELFORGE Encoder Backend - Hardware Encoder Selection
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Picks the H.264 encoder handed to ffmpeg: NVENC when nvidia-smi reports
// a GPU and the config allows it, libx264 otherwise.

use std::process::Command;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::config::EncodeSettings;

/// Encoder backend selection
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderBackend {
    /// NVIDIA GPU with NVENC
    Nvenc { name: String, driver_version: String },
    /// Software x264
    Cpu { threads: usize },
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::Nvenc {
                name,
                driver_version,
            } => {
                write!(f, "NVENC: {} (Driver {})", name, driver_version)
            }
            EncoderBackend::Cpu { threads } => write!(f, "CPU libx264 ({} threads)", threads),
        }
    }
}

impl EncoderBackend {
    /// Detect the best available backend.
    pub fn detect() -> Self {
        if let Some(nvenc) = Self::try_nvenc() {
            return nvenc;
        }
        let threads = num_cpus::get();
        warn!(
            "[ENCODER] No NVIDIA GPU detected. Using libx264 ({} threads)",
            threads
        );
        EncoderBackend::Cpu { threads }
    }

    fn try_nvenc() -> Option<Self> {
        let output = Command::new("nvidia-smi")
            .args(["--query-gpu=name,driver_version", "--format=csv,noheader"])
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (name, driver_version) = parse_nvidia_smi(&stdout)?;
        info!(
            "[ENCODER] NVIDIA GPU detected: {} (Driver {})",
            name, driver_version
        );
        Some(EncoderBackend::Nvenc {
            name,
            driver_version,
        })
    }

    pub fn cpu() -> Self {
        EncoderBackend::Cpu {
            threads: num_cpus::get(),
        }
    }

    pub fn has_nvenc(&self) -> bool {
        matches!(self, EncoderBackend::Nvenc { .. })
    }

    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc { .. } => "h264_nvenc",
            EncoderBackend::Cpu { .. } => "libx264",
        }
    }

    /// Video codec arguments for the final encode.
    pub fn video_args(&self, settings: &EncodeSettings) -> Vec<String> {
        match self {
            EncoderBackend::Nvenc { .. } => vec![
                "-c:v".to_string(),
                "h264_nvenc".to_string(),
                // p1=fastest, p7=best quality
                "-preset".to_string(),
                "p4".to_string(),
                "-rc".to_string(),
                "vbr".to_string(),
                "-cq".to_string(),
                settings.crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ],
            EncoderBackend::Cpu { .. } => vec![
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                settings.preset.clone(),
                "-crf".to_string(),
                settings.crf.to_string(),
            ],
        }
    }
}

/// First `name, driver` line of `nvidia-smi --format=csv,noheader`.
fn parse_nvidia_smi(stdout: &str) -> Option<(String, String)> {
    let line = stdout.lines().next()?;
    let mut parts = line.split(',');
    let name = parts.next()?.trim();
    let driver = parts.next()?.trim();
    if name.is_empty() || driver.is_empty() {
        return None;
    }
    Some((name.to_string(), driver.to_string()))
}

static ENCODER_BACKEND: OnceLock<EncoderBackend> = OnceLock::new();

/// Detected backend, probed once per process.
pub fn detected_backend() -> &'static EncoderBackend {
    ENCODER_BACKEND.get_or_init(EncoderBackend::detect)
}

/// Backend to use for a run with these settings.
pub fn select_backend(settings: &EncodeSettings) -> EncoderBackend {
    if settings.allow_hardware {
        detected_backend().clone()
    } else {
        EncoderBackend::cpu()
    }
}
