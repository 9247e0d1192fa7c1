//! CLI Module
//!
//! Command-line interface for the Voxpost pipeline.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::{EchoIntensity, EffectParams, PitchShift, ReverbSize};

/// Voxpost - offline post-processing for synthesized speech
#[derive(Parser, Debug)]
#[command(name = "voxpost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Effect choices shared by the processing commands
///
/// Unset options fall back to the config file's `default_effects`.
#[derive(Args, Debug, Clone, Default)]
pub struct EffectArgs {
    /// Reverb room size
    #[arg(long, value_enum)]
    pub reverb: Option<ReverbSize>,

    /// Echo intensity
    #[arg(long, value_enum)]
    pub echo: Option<EchoIntensity>,

    /// Pitch shift
    #[arg(long, value_enum)]
    pub pitch: Option<PitchShift>,
}

impl EffectArgs {
    /// Merge over the configured defaults
    pub fn resolve(&self, defaults: &EffectParams) -> EffectParams {
        EffectParams {
            reverb: self.reverb.unwrap_or(defaults.reverb),
            echo: self.echo.unwrap_or(defaults.echo),
            pitch: self.pitch.unwrap_or(defaults.pitch),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Post-process an existing WAV file
    #[command(name = "process")]
    Process {
        /// Input WAV file (any bit depth)
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Render a sine test tone through the pipeline
    #[command(name = "tone")]
    Tone {
        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Tone frequency in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f32,

        /// Duration in seconds (clamped to 1..=36000)
        #[arg(short, long)]
        duration: Option<f64>,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Render the silent placeholder signal through the pipeline
    #[command(name = "placeholder")]
    Placeholder {
        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds (clamped to 1..=36000)
        #[arg(short, long)]
        duration: Option<f64>,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Print container header details and checksum
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },

    /// Process every WAV file in a directory concurrently
    #[command(name = "batch")]
    Batch {
        /// Directory to scan recursively
        input_dir: PathBuf,

        /// Directory for processed files
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        effects: EffectArgs,
    },
}
