// REELFORGE Batch Driver
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Runs independent units through a bounded worker pool. A failing or
// panicking unit is recorded and never stops the others.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::composer::pipeline::ComposerPipeline;
use crate::composer::render::OutputVideo;
use crate::error::{ComposeError, RenderError};

/// Split a comma-separated list of audio identifiers.
pub fn parse_audio_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Completed { output: OutputVideo, elapsed_secs: f64 },
    Failed { kind: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub index: usize,
    pub audio_id: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
    pub elapsed_secs: f64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Completed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn any_failed(&self) -> bool {
        self.failed() > 0
    }

    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            match &outcome.status {
                UnitStatus::Completed { output, .. } => {
                    info!("[BATCH] OK   {} -> {:?}", outcome.audio_id, output.path)
                }
                UnitStatus::Failed { kind, reason } => {
                    error!("[BATCH] FAIL {} ({}): {}", outcome.audio_id, kind, reason)
                }
            }
        }
        let total = self.elapsed_secs as u64;
        info!(
            "[BATCH] {} succeeded, {} failed. Total processing time: {} minutes and {} seconds",
            self.succeeded(),
            self.failed(),
            total / 60,
            total % 60
        );
    }
}

pub struct BatchRunner {
    pipeline: Arc<ComposerPipeline>,
    max_parallel: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<ComposerPipeline>, max_parallel: usize) -> Self {
        Self {
            pipeline,
            max_parallel: max_parallel.max(1),
        }
    }

    pub async fn run(&self, audio_ids: &[String]) -> BatchReport {
        let started = Instant::now();
        info!(
            "[BATCH] Processing {} audio files ({} at a time)",
            audio_ids.len(),
            self.max_parallel
        );

        let slots = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(audio_ids.len());
        for (index, audio_id) in audio_ids.iter().enumerate() {
            let pipeline = self.pipeline.clone();
            let slots = slots.clone();
            let id = audio_id.clone();
            let handle = tokio::spawn(async move {
                let _permit = slots
                    .acquire_owned()
                    .await
                    .map_err(|_| ComposeError::Render(RenderError::Cancelled))?;
                let unit_started = Instant::now();
                let output = pipeline.generate(index, &id).await?;
                Ok::<(OutputVideo, Duration), ComposeError>((output, unit_started.elapsed()))
            });
            handles.push((index, audio_id.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (index, audio_id, handle) in handles {
            let status = match handle.await {
                Ok(Ok((output, elapsed))) => UnitStatus::Completed {
                    output,
                    elapsed_secs: elapsed.as_secs_f64(),
                },
                Ok(Err(e)) => {
                    error!("[BATCH] Error processing {}: {}", audio_id, e);
                    UnitStatus::Failed {
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    }
                }
                Err(join_err) => {
                    let kind = if join_err.is_panic() { "panic" } else { "cancelled" };
                    error!("[BATCH] Unit {} aborted: {}", audio_id, join_err);
                    UnitStatus::Failed {
                        kind: kind.to_string(),
                        reason: join_err.to_string(),
                    }
                }
            };
            outcomes.push(UnitOutcome {
                index,
                audio_id,
                status,
            });
        }

        BatchReport {
            outcomes,
            elapsed_secs: started.elapsed().as_secs_f64(),
        }
    }
}
