// REELFORGE Dependency Health Check
// Copyright (c) 2026 Xing_The_Creator | REELFORGE
//
// Verifies the external codec tools are on PATH before a batch starts.

use std::process::Command;
use tracing::{info, warn};

/// Tools every render needs.
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Health status of one external tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolStatus {
    Available { version: String },
    Missing(String),
}

#[derive(Debug, Clone)]
pub struct ToolCheck {
    pub name: String,
    pub status: ToolStatus,
}

impl ToolCheck {
    pub fn is_available(&self) -> bool {
        matches!(self.status, ToolStatus::Available { .. })
    }
}

/// First line of `<tool> -version`, e.g. "ffmpeg version 6.1.1 ...".
fn version_line(stdout: &str) -> String {
    stdout.lines().next().unwrap_or("").trim().to_string()
}

pub fn check_tool(name: &str) -> ToolCheck {
    let status = match Command::new(name).arg("-version").output() {
        Ok(out) if out.status.success() => ToolStatus::Available {
            version: version_line(&String::from_utf8_lossy(&out.stdout)),
        },
        Ok(out) => ToolStatus::Missing(format!("exited with {}", out.status)),
        Err(e) => ToolStatus::Missing(e.to_string()),
    };
    ToolCheck {
        name: name.to_string(),
        status,
    }
}

/// Check every required tool and log the result.
pub fn check_dependencies() -> Vec<ToolCheck> {
    REQUIRED_TOOLS
        .iter()
        .map(|tool| {
            let check = check_tool(tool);
            match &check.status {
                ToolStatus::Available { version } => info!("[HEALTH] {}: {}", tool, version),
                ToolStatus::Missing(reason) => warn!("[HEALTH] {} not usable: {}", tool, reason),
            }
            check
        })
        .collect()
}

/// Names of required tools that are missing.
pub fn missing_tools() -> Vec<String> {
    check_dependencies()
        .into_iter()
        .filter(|c| !c.is_available())
        .map(|c| c.name)
        .collect()
}
