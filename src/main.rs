// REELFORGE Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | REELFORGE

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reelforge_core::composer::assets::{AssetProvider, DirectoryAssets};
use reelforge_core::composer::audio::AudioTrack;
use reelforge_core::composer::captions::generate_srt;
use reelforge_core::composer::compositor::TransitionCompositor;
use reelforge_core::composer::normalizer::{normalize_clips, Resolution};
use reelforge_core::composer::preview::render_previews;
use reelforge_core::composer::selector::select;
use reelforge_core::composer::{parse_audio_list, BatchRunner, ComposerPipeline};
use reelforge_core::config::ComposerConfig;
use reelforge_core::encoder_backend::select_backend;
use reelforge_core::health;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "REELFORGE vertical short composer", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./reelforge.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one video per audio file
    Generate {
        /// Comma-separated audio files (prompted for when omitted)
        #[arg(short, long)]
        audio: Option<String>,

        /// Override the output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Units processed at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Also write an .srt next to every video
        #[arg(long)]
        srt: bool,
    },

    /// Transcribe one audio file and print its caption track
    Captions {
        #[arg(short, long)]
        audio: String,

        /// Write SubRip subtitles here instead of printing JSON
        #[arg(long)]
        srt: Option<PathBuf>,
    },

    /// Print the background clip plan for a given duration
    Plan {
        /// Total duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Segment length in seconds
        #[arg(short, long)]
        segment: Option<f64>,
    },

    /// Save normalized stills of the planned clips
    Preview {
        /// Total duration in seconds
        #[arg(short, long)]
        duration: f64,

        #[arg(short, long, default_value = "preview")]
        out: PathBuf,
    },

    /// Check ffmpeg/ffprobe and the encoder backend
    Check,
}

fn prompt_audio_list() -> anyhow::Result<String> {
    println!("\nEnter the audio filenames separated by commas (e.g., audio1.mp3, audio2.mp3):");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read audio list from stdin")?;
    Ok(line)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Keep decoder and speech model internals quiet unless asked for
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,symphonia=error,whisper_rs=warn");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[REELFORGE PANIC] at {}: {}", location, message);
    }));

    let args = Cli::parse();
    let mut config = ComposerConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;

    match args.command {
        Commands::Generate {
            audio,
            output_dir,
            jobs,
            srt,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(n) = jobs {
                config.max_parallel_units = n.max(1);
            }
            config.write_srt |= srt;

            let raw = match audio {
                Some(list) => list,
                None => prompt_audio_list()?,
            };
            let audio_files = parse_audio_list(&raw);
            if audio_files.is_empty() {
                error!("No audio files provided. Exiting...");
                std::process::exit(1);
            }

            info!("[BATCH] Processing {} audio files:", audio_files.len());
            for file in &audio_files {
                info!("[BATCH] - {}", file);
            }

            let missing = health::missing_tools();
            if !missing.is_empty() {
                warn!("Missing dependencies: {:?}. Rendering will fail.", missing);
            }

            let max_parallel = config.max_parallel_units;
            let pipeline = ComposerPipeline::from_config(config)
                .context("failed to initialise the composer")?;
            let runner = BatchRunner::new(Arc::new(pipeline), max_parallel);
            let report = runner.run(&audio_files).await;
            report.log_summary();

            if report.any_failed() {
                std::process::exit(1);
            }
        }

        Commands::Captions { audio, srt } => {
            let pipeline = ComposerPipeline::from_config(config.clone())
                .context("failed to initialise the composer")?;
            let assets = DirectoryAssets::new(
                config.audio_dir.clone(),
                config.video_dir.clone(),
                config.source_order.clone(),
            );
            let track = assets.audio_track(&audio).await?;
            let captions = pipeline.captions(&track).await?;

            match srt {
                Some(path) => {
                    std::fs::write(&path, generate_srt(&captions))
                        .with_context(|| format!("failed to write {:?}", path))?;
                    info!("Wrote {} captions to {:?}", captions.len(), path);
                }
                None => println!("{}", serde_json::to_string_pretty(&captions)?),
            }
        }

        Commands::Plan { duration, segment } => {
            if !(duration > 0.0) {
                bail!("duration must be positive");
            }
            let segment_length = segment.unwrap_or(config.segment_length);
            let sources = background_sources(&config, duration).await?;
            let clips = select(&sources, duration, segment_length, config.exhaustion)?;
            println!("{}", serde_json::to_string_pretty(&clips)?);
        }

        Commands::Preview { duration, out } => {
            if !(duration > 0.0) {
                bail!("duration must be positive");
            }
            let sources = background_sources(&config, duration).await?;
            let clips = select(&sources, duration, config.segment_length, config.exhaustion)?;
            let canvas = Resolution::new(config.canvas_width, config.canvas_height);
            let timeline = TransitionCompositor::new(config.fade_duration, canvas, config.encode.fps)
                .compose(normalize_clips(&clips, &sources, canvas));
            let written = render_previews(&timeline, &out).await?;
            for path in written {
                println!("{}", path.display());
            }
        }

        Commands::Check => {
            let checks = health::check_dependencies();
            info!("Encoder backend: {}", select_backend(&config.encode));
            if checks.iter().any(|c| !c.is_available()) {
                error!("Required tools are missing; install ffmpeg (which ships ffprobe).");
                std::process::exit(1);
            }
            info!("All dependencies available.");
        }
    }

    Ok(())
}

async fn background_sources(
    config: &ComposerConfig,
    duration: f64,
) -> anyhow::Result<Vec<reelforge_core::composer::selector::SourceVideo>> {
    let assets = DirectoryAssets::new(
        config.audio_dir.clone(),
        config.video_dir.clone(),
        config.source_order.clone(),
    );
    // Background discovery does not depend on the narration itself
    let placeholder = AudioTrack {
        path: PathBuf::new(),
        duration,
    };
    Ok(assets.backgrounds_for(&placeholder).await?)
}
