//! Audio Buffer
//!
//! Immutable, planar (one `Vec<f32>` per channel) representation of a
//! decoded signal. Every processing stage reads a buffer and produces a new
//! one; nothing mutates a buffer after construction.

use crate::error::{Result, VoxpostError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded multi-channel signal
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Per-channel sample data, all of identical length
    channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data
    ///
    /// # Errors
    /// * `InvalidBuffer` - no channels, zero sample rate, or ragged channels
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(VoxpostError::InvalidBuffer {
                reason: "buffer must have at least one channel".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(VoxpostError::InvalidBuffer {
                reason: "sample rate must be positive".to_string(),
            });
        }
        let frames = channels[0].len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, c)| c.len() != frames) {
            return Err(VoxpostError::InvalidBuffer {
                reason: format!(
                    "channel {} has {} frames, expected {}",
                    idx,
                    ch.len(),
                    frames
                ),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build a buffer from channel data the caller already shaped correctly
    ///
    /// Used by stages that map a valid buffer sample-for-sample.
    pub(crate) fn from_shaped(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(!channels.is_empty() && sample_rate > 0);
        debug_assert!(channels.iter().all(|c| c.len() == channels[0].len()));
        Self {
            channels,
            sample_rate,
        }
    }

    /// Build a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Build an all-zero buffer
    pub fn silence(channel_count: usize, frame_count: usize, sample_rate: u32) -> Result<Self> {
        Self::from_channels(vec![vec![0.0; frame_count]; channel_count], sample_rate)
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// True when the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if `index >= channel_count()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Iterate over channels in order
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(|c| c.as_slice())
    }

    /// Sample at the given frame and channel
    pub fn get(&self, frame: usize, channel: usize) -> Option<f32> {
        self.channels.get(channel).and_then(|c| c.get(frame)).copied()
    }

    /// Build a new buffer by mapping every channel through `f`
    ///
    /// `f` must return the same number of frames for every channel.
    pub fn map_channels<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&[f32]) -> Vec<f32>,
    {
        let channels = self.channels.iter().map(|c| f(c.as_slice())).collect();
        Self::from_channels(channels, self.sample_rate)
    }

    /// Give up ownership of the channel data
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Maximum absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Peak level in dBFS
    pub fn peak_db(&self) -> f32 {
        linear_to_db(self.peak())
    }

    /// RMS level across all channels (linear)
    pub fn rms(&self) -> f32 {
        let total = self.channel_count() * self.frame_count();
        if total == 0 {
            return 0.0;
        }
        let sum_sq: f64 = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_sq / total as f64).sqrt() as f32
    }

    /// Check that every sample is finite
    pub fn is_finite(&self) -> bool {
        self.channels.iter().flat_map(|c| c.iter()).all(|s| s.is_finite())
    }
}
