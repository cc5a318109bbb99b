// REELFORGE Composer
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Audio + background footage -> captioned vertical short.

pub mod assets;
pub mod audio;
pub mod batch;
pub mod captions;
pub mod compositor;
pub mod normalizer;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod render;
pub mod selector;
pub mod transcription;

pub use batch::{parse_audio_list, BatchReport, BatchRunner, UnitStatus};
pub use pipeline::{ComposerPipeline, UnitPlan};
