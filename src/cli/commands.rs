//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::dsp::EffectParams;
use crate::engine::{
    inspect as inspect_container, PlaceholderSource, SignalSource, ToneSource, WavFileSource,
};
use crate::error::Result;
use crate::pipeline::{sha256_hex, Pipeline, PipelineInput, RenderOutput};

/// Build a pipeline from an optional config file
pub fn build_pipeline(config_path: Option<&Path>) -> Result<Pipeline> {
    let config = match config_path {
        Some(path) => {
            info!("Loading config: {}", path.display());
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };
    Ok(Pipeline::new(config))
}

/// Run `source` through the pipeline and write the container to `output`
fn render_to_file(
    pipeline: &Pipeline,
    source: &dyn SignalSource,
    duration_secs: f64,
    effects: &EffectParams,
    output: &Path,
) -> Result<RenderOutput> {
    let rendered = pipeline.run(PipelineInput::Source(source), duration_secs, effects)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &rendered.bytes)?;
    Ok(rendered)
}

fn print_summary(output: &Path, rendered: &RenderOutput) -> Result<()> {
    println!("Wrote: {}", output.display());
    println!("{}", serde_json::to_string_pretty(rendered)?);
    Ok(())
}

/// Post-process an existing WAV file.
pub fn process(pipeline: &Pipeline, input: &Path, output: &Path, effects: &EffectParams) -> Result<()> {
    info!("Processing audio: {} -> {}", input.display(), output.display());

    let source = WavFileSource::new(input);
    let duration = pipeline.config().default_duration_secs;
    let rendered = render_to_file(pipeline, &source, duration, effects, output)?;
    print_summary(output, &rendered)
}

/// Render a test tone.
pub fn tone(
    pipeline: &Pipeline,
    output: &Path,
    frequency: f32,
    duration: Option<f64>,
    effects: &EffectParams,
) -> Result<()> {
    info!("Rendering {} Hz test tone to: {}", frequency, output.display());

    let source = ToneSource {
        sample_rate: pipeline.config().sample_rate,
        ..ToneSource::new(frequency)
    };
    let duration = duration.unwrap_or(pipeline.config().default_duration_secs);
    let rendered = render_to_file(pipeline, &source, duration, effects, output)?;
    print_summary(output, &rendered)
}

/// Render the silent placeholder signal.
pub fn placeholder(
    pipeline: &Pipeline,
    output: &Path,
    duration: Option<f64>,
    effects: &EffectParams,
) -> Result<()> {
    info!("Rendering placeholder to: {}", output.display());

    let source = PlaceholderSource {
        sample_rate: pipeline.config().sample_rate,
    };
    let duration = duration.unwrap_or(pipeline.config().default_duration_secs);
    let rendered = render_to_file(pipeline, &source, duration, effects, output)?;
    print_summary(output, &rendered)
}

/// Print container details.
pub fn inspect(path: &Path) -> Result<()> {
    info!("Inspecting: {}", path.display());

    let bytes = std::fs::read(path)?;
    let header = inspect_container(&bytes)?;

    println!("File: {}", path.display());
    println!("{:-<60}", "");
    println!("Channels:      {}", header.channels);
    println!("Sample rate:   {} Hz", header.sample_rate);
    println!("Bit depth:     {}", header.bits_per_sample);
    println!("Frames:        {}", header.frame_count());
    println!("Duration:      {:.3}s", header.duration_secs());
    println!("Data bytes:    {}", header.data_len);
    println!("SHA-256:       {}", sha256_hex(&bytes));

    Ok(())
}

/// Collect `.wav` files under `dir`, sorted for stable output
fn find_wav_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    files.sort();
    files
}

/// Process a directory of WAV files concurrently.
///
/// Each file is an independent request. Failures are reported per file;
/// the first one is returned after all files have been attempted.
pub fn batch(
    pipeline: &Pipeline,
    input_dir: &Path,
    output_dir: &Path,
    effects: &EffectParams,
) -> Result<()> {
    info!("Batch processing: {} -> {}", input_dir.display(), output_dir.display());

    let files = find_wav_files(input_dir);
    if files.is_empty() {
        println!("No WAV files found in {}", input_dir.display());
        return Ok(());
    }

    let duration = pipeline.config().default_duration_secs;
    let results: Vec<(PathBuf, Result<RenderOutput>)> = files
        .par_iter()
        .map(|input| {
            let relative = input.strip_prefix(input_dir).unwrap_or(input.as_path());
            let output = output_dir.join(relative);
            let source = WavFileSource::new(input);
            let result = render_to_file(pipeline, &source, duration, effects, &output);
            (output, result)
        })
        .collect();

    let mut first_error = None;
    let mut succeeded = 0;
    for (output, result) in results {
        match result {
            Ok(rendered) => {
                succeeded += 1;
                println!("OK    {} ({} frames)", output.display(), rendered.frame_count);
            }
            Err(e) => {
                warn!("Failed {}: {}", output.display(), e);
                println!("FAIL  {} [{}] {}", output.display(), e.error_code(), e.friendly_message());
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    println!("{}/{} files processed", succeeded, files.len());

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
