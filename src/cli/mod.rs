//! CLI argument parsing and command routing

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{config::TapConfig, services::replay::DEFAULT_CHUNK_SIZE};

pub use commands::run;

/// reasoning-tap: watch a model think while it streams
#[derive(Debug, Parser)]
#[command(name = "reasoning-tap")]
#[command(about = "Tap reasoning text out of streamed chat completions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not report reasoning text
    #[arg(long, global = true)]
    pub no_reasoning: bool,

    /// Echo every raw payload to stderr
    #[arg(long, global = true)]
    pub echo_payloads: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a recorded SSE transcript (`-` reads stdin)
    Replay {
        /// Transcript file
        file: PathBuf,

        /// Model name reported to the stream function
        #[arg(long)]
        model: Option<String>,

        /// Deliver the transcript in slices of this many bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Stream a single prompt from an OpenAI-compatible endpoint
    Chat {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Model to use (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Endpoint base URL (defaults to the configured endpoint)
        #[arg(long)]
        base_url: Option<String>,

        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Reasoning effort hint (e.g. low, medium, high)
        #[arg(long)]
        reasoning_effort: Option<String>,
    },

    /// Read one JSON payload per line from stdin and print the reasoning
    /// found in each as a JSON line (`null` when there is none)
    Extract,
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply global flags on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut TapConfig) {
        if self.verbose {
            config.verbose = true;
        }
        if self.no_reasoning {
            config.show_reasoning = false;
        }
        if self.echo_payloads {
            config.echo_payloads = true;
        }
        if let Commands::Chat {
            base_url: Some(base_url),
            ..
        } = &self.command
        {
            config.base_url.clone_from(base_url);
        }
    }
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` turns on debug output for
/// the crate and trace output for the reasoning tap.
pub fn init_logging(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("reasoning_tap=debug,agent::reasoning=trace"),
        Err(_) => return,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
