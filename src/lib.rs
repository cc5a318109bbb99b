// REELFORGE Core Library
// Copyright (c) 2026 Xing_The_Creator | REELFORGE

pub mod composer;
pub mod config;
pub mod encoder_backend;
pub mod error;
pub mod health;
