// REELFORGE Composer Configuration
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// All tunables for one generation run. Loaded from `reelforge.json` when
// present, otherwise defaults; `REELFORGE_*` environment variables win.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "reelforge.json";

/// Fixed vertical canvas.
pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;

/// Order in which background sources are visited by the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceOrder {
    /// Keep the order the asset provider returned.
    Input,
    /// Lexicographic by path.
    Sorted,
    /// Reproducible shuffle.
    Shuffled { seed: u64 },
}

/// What the selector does when a source cannot fit another full window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Restart the same source from t=0.
    Wrap,
    /// Skip to the next source; once every source is spent, all restart at t=0.
    Advance,
}

/// Which speech-to-text backend to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum TranscriberConfig {
    Whisper {
        model: String,
        language: Option<String>,
        word_timestamps: bool,
    },
    Remote {
        base_url: String,
        model: String,
        /// Name of the environment variable holding the bearer token.
        api_key_env: Option<String>,
        word_timestamps: bool,
        /// Whole-request timeout in seconds.
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
    TranscriptFile {
        /// Directory holding `<audio stem>.json` segment files.
        dir: PathBuf,
    },
}

fn default_remote_timeout() -> u64 {
    120
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        TranscriberConfig::Whisper {
            model: "base".to_string(),
            language: Some("en".to_string()),
            word_timestamps: true,
        }
    }
}

/// Caption display policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionPolicy {
    /// Longest time one caption may stay on screen (seconds).
    pub max_display: f64,
    /// Shortest time a caption should stay on screen (seconds).
    pub min_display: f64,
    /// Longest caption text before it is split.
    pub max_chars: usize,
    /// Wrap width for a single rendered line.
    pub line_chars: usize,
    /// Word grouping: maximum words in one phrase.
    pub words_per_phrase: usize,
    /// Word grouping: a silence longer than this starts a new phrase.
    pub pause_gap: f64,
    /// Word grouping: maximum span of one phrase (seconds).
    pub max_phrase_span: f64,
}

impl Default for CaptionPolicy {
    fn default() -> Self {
        Self {
            max_display: 7.0,
            min_display: 1.0,
            max_chars: 42,
            line_chars: 24,
            words_per_phrase: 5,
            pause_gap: 0.7,
            max_phrase_span: 4.0,
        }
    }
}

/// Caption burn-in style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_size: u32,
    pub font_color: String,
    pub border_width: u32,
    pub border_color: String,
    /// Optional TTF/OTF path handed to drawtext.
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 45,
            font_color: "white".to_string(),
            border_width: 3,
            border_color: "black".to_string(),
            font_file: None,
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub fps: u32,
    pub crf: u32,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Use NVENC when an NVIDIA GPU is detected.
    pub allow_hardware: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: 24,
            crf: 23,
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            allow_hardware: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Background window length (seconds).
    pub segment_length: f64,
    /// Fade length at every clip boundary (seconds).
    pub fade_duration: f64,
    pub captions: CaptionPolicy,
    pub style: CaptionStyle,
    pub encode: EncodeSettings,
    pub transcriber: TranscriberConfig,
    pub source_order: SourceOrder,
    pub exhaustion: ExhaustionPolicy,
    pub audio_dir: PathBuf,
    pub video_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Write `<output>.srt` next to every rendered video.
    pub write_srt: bool,
    /// Units processed concurrently by the batch driver.
    pub max_parallel_units: usize,
    /// Concurrent encoder processes across the whole batch.
    pub max_concurrent_encodes: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            segment_length: 5.0,
            fade_duration: 0.5,
            captions: CaptionPolicy::default(),
            style: CaptionStyle::default(),
            encode: EncodeSettings::default(),
            transcriber: TranscriberConfig::default(),
            source_order: SourceOrder::Sorted,
            exhaustion: ExhaustionPolicy::Advance,
            audio_dir: PathBuf::from("AudioAssets"),
            video_dir: PathBuf::from("VideoAssets"),
            output_dir: PathBuf::from("OutputVideos"),
            write_srt: false,
            max_parallel_units: 1,
            max_concurrent_encodes: num_cpus::get().max(1),
        }
    }
}

impl ComposerConfig {
    /// Load from an explicit path, or from `reelforge.json` if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    info!("[CONFIG] Using default composer configuration");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("[CONFIG] Loaded composer configuration from {:?}", path);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("REELFORGE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("REELFORGE_AUDIO_DIR") {
            self.audio_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("REELFORGE_VIDEO_DIR") {
            self.video_dir = PathBuf::from(dir);
        }
        if let Some(n) = std::env::var("REELFORGE_MAX_ENCODES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.max_concurrent_encodes = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, message: &str) -> ConfigError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(invalid("canvas", "dimensions must be positive"));
        }
        if self.canvas_width % 2 != 0 || self.canvas_height % 2 != 0 {
            return Err(invalid("canvas", "dimensions must be even for yuv420p"));
        }
        if (self.canvas_width, self.canvas_height) != (CANVAS_WIDTH, CANVAS_HEIGHT) {
            return Err(invalid("canvas", "output is fixed at 1080x1920"));
        }
        if !(self.segment_length > 0.0) {
            return Err(invalid("segment_length", "must be positive"));
        }
        if self.fade_duration < 0.0 {
            return Err(invalid("fade_duration", "must not be negative"));
        }
        if !(self.captions.max_display > 0.0) {
            return Err(invalid("captions.max_display", "must be positive"));
        }
        if self.captions.min_display > self.captions.max_display {
            return Err(invalid(
                "captions.min_display",
                "must not exceed captions.max_display",
            ));
        }
        if self.captions.max_chars == 0 || self.captions.line_chars == 0 {
            return Err(invalid("captions", "character limits must be positive"));
        }
        if self.encode.fps == 0 {
            return Err(invalid("encode.fps", "must be positive"));
        }
        if self.max_parallel_units == 0 {
            return Err(invalid("max_parallel_units", "must be at least 1"));
        }
        if self.max_concurrent_encodes == 0 {
            return Err(invalid("max_concurrent_encodes", "must be at least 1"));
        }
        Ok(())
    }
}
