//! Signal sources
//!
//! The raw signal comes from an external speech collaborator. This module
//! defines that seam plus the sources used by the CLI and tests: the
//! silent placeholder, a sine test tone, and WAV files on disk.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, VoxpostError};

/// Sample rate of the placeholder and test signals
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Shortest signal a caller may request, in seconds
pub const MIN_DURATION_SECS: f64 = 1.0;

/// Longest signal a caller may request, in seconds (10 hours)
pub const MAX_DURATION_SECS: f64 = 36000.0;

/// Clamp a requested duration to the supported range
///
/// Non-finite requests fall back to the minimum.
pub fn clamp_duration(duration_secs: f64) -> f64 {
    if duration_secs.is_finite() {
        duration_secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
    } else {
        MIN_DURATION_SECS
    }
}

/// Frames needed for `duration_secs` at `sample_rate`
fn frames_for(duration_secs: f64, sample_rate: u32) -> usize {
    (duration_secs * sample_rate as f64).round() as usize
}

/// Producer of the raw, unprocessed signal
///
/// Implementations report their own failures as
/// [`VoxpostError::UpstreamGeneration`].
pub trait SignalSource: Send + Sync {
    /// Produce a signal roughly `duration_secs` long
    fn generate(&self, duration_secs: f64) -> Result<AudioBuffer>;

    /// Short name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Placeholder
// ============================================================================

/// Mono silence, standing in for speech while no synthesizer is attached
#[derive(Debug, Clone)]
pub struct PlaceholderSource {
    pub sample_rate: u32,
}

impl Default for PlaceholderSource {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl SignalSource for PlaceholderSource {
    fn generate(&self, duration_secs: f64) -> Result<AudioBuffer> {
        AudioBuffer::silence(1, frames_for(duration_secs, self.sample_rate), self.sample_rate)
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

// ============================================================================
// Test tone
// ============================================================================

/// Full-scale sine wave
#[derive(Debug, Clone)]
pub struct ToneSource {
    pub frequency: f32,
    pub amplitude: f32,
    pub channels: usize,
    pub sample_rate: u32,
}

impl ToneSource {
    /// Mono full-scale tone at the default sample rate
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            amplitude: 1.0,
            channels: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl SignalSource for ToneSource {
    fn generate(&self, duration_secs: f64) -> Result<AudioBuffer> {
        generate_test_tone(
            self.frequency,
            self.amplitude,
            self.channels,
            frames_for(duration_secs, self.sample_rate),
            self.sample_rate,
        )
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Generate a sine test tone with the same signal on every channel
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    channels: usize,
    frames: usize,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    let samples: Vec<f32> = (0..frames)
        .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
        .collect();
    AudioBuffer::from_channels(vec![samples; channels], sample_rate)
}

// ============================================================================
// WAV file
// ============================================================================

/// Reads an existing WAV file, e.g. the output of an external synthesizer
///
/// Any integer or float WAV that `hound` understands is accepted. The
/// requested duration is ignored; the file is used as-is.
#[derive(Debug, Clone)]
pub struct WavFileSource {
    path: PathBuf,
}

impl WavFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for WavFileSource {
    fn generate(&self, _duration_secs: f64) -> Result<AudioBuffer> {
        read_wav_file(&self.path)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

fn upstream(path: &Path, e: impl std::fmt::Display) -> VoxpostError {
    VoxpostError::UpstreamGeneration {
        message: format!("{}: {}", path.display(), e),
    }
}

/// Read a WAV file into a planar float buffer
fn read_wav_file(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| upstream(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(upstream(path, "file declares zero channels"));
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|e| upstream(path, e))?;

    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for (i, sample) in interleaved.into_iter().take(frames * channels).enumerate() {
        planar[i % channels].push(sample);
    }

    AudioBuffer::from_channels(planar, spec.sample_rate).map_err(|e| upstream(path, e))
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, String> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| format!("failed to read float samples: {}", e));
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => return Err(format!("unsupported {}-bit integer audio", bits)),
    };

    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| format!("failed to read {}-bit samples: {}", bits_per_sample, e))
}
