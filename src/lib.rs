//! Voxpost - Offline Audio Post-Processing
//!
//! Takes a raw synthesized voice signal and returns a finished 16-bit PCM
//! WAV container, optionally coloured by pitch, reverb and echo.
//!
//! # Architecture
//!
//! Data flows one way through pure stages:
//! - `engine`: immutable audio buffer, PCM container codec, signal sources
//! - `dsp`: normalizer and the offline render graph (pitch, reverb, echo)
//! - `pipeline`: orchestrator sequencing decode → normalize → render → encode

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{Result, VoxpostError};
pub use pipeline::{Pipeline, PipelineInput, PipelineStage, ProgressObserver, RenderOutput};
