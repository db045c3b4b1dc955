//! reasoning-tap: reasoning side channel for streamed chat completions
//!
//! The core is [`reasoning::ReasoningTap`], which wraps any
//! [`services::StreamFn`] and reports the reasoning/thinking text found in
//! each streamed payload to an observer, without changing what the original
//! payload callback receives. Around it sit an OpenAI-compatible streaming
//! client, a transcript replayer, layered configuration and a small CLI.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

pub mod cli;
pub mod config;
pub mod error;
pub mod messages;
pub mod reasoning;
pub mod services;

// Re-exports for convenience
pub use error::{Result, TapError};
pub use reasoning::{extract_reasoning_text, ReasoningEvent, ReasoningTap, TapOptions};
pub use services::{StreamFn, StreamOptions};
