//! Echo Effect
//!
//! Feedback delay line mixed with the dry signal:
//!
//! ```text
//! w[n] = x[n] + feedback * w[n - D]
//! y[n] = 0.6 * x[n] + 0.4 * w[n - D]
//! ```
//!
//! Each repetition is `feedback` times the previous one, so the tail decays
//! for any feedback below 1.0.

use crate::dsp::params::EchoIntensity;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxpostError};

/// Dry path weight
pub const DRY_LEVEL: f32 = 0.6;

/// Wet path weight
pub const WET_LEVEL: f32 = 0.4;

/// Feedback delay line for one channel
#[derive(Debug, Clone)]
struct DelayLine {
    /// Circular buffer holding the last `D` delay inputs
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl DelayLine {
    fn new(delay_samples: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback,
        }
    }

    /// Push one input sample, returning the delayed output
    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        // The slot about to be overwritten was written D samples ago
        let delayed = self.buffer[self.write_pos];
        self.buffer[self.write_pos] = input + self.feedback * delayed;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        delayed
    }
}

/// Apply echo with explicit delay time and feedback
///
/// A delay at or beyond the buffer length leaves only the dry mix.
///
/// # Errors
/// * `Render` - feedback outside [0, 1), or a delay shorter than one sample
pub fn apply_delay(buffer: &AudioBuffer, delay_secs: f64, feedback: f32) -> Result<AudioBuffer> {
    if !(0.0..1.0).contains(&feedback) {
        return Err(VoxpostError::Render {
            reason: format!("echo feedback {} must be in [0, 1)", feedback),
        });
    }
    let delay_samples = (delay_secs * buffer.sample_rate() as f64).round() as usize;
    if delay_samples == 0 {
        return Err(VoxpostError::Render {
            reason: format!("echo delay {}s is shorter than one sample", delay_secs),
        });
    }

    // Echoes landing past the last frame are never heard
    let line_len = delay_samples.min(buffer.frame_count().max(1));

    let channels: Vec<Vec<f32>> = buffer
        .channels()
        .map(|c| {
            let mut line = DelayLine::new(line_len, feedback);
            c.iter()
                .map(|&x| DRY_LEVEL * x + WET_LEVEL * line.tick(x))
                .collect()
        })
        .collect();

    Ok(AudioBuffer::from_shaped(channels, buffer.sample_rate()))
}

/// Apply the echo preset for `intensity`
///
/// `EchoIntensity::None` returns a copy.
pub fn apply_echo(buffer: &AudioBuffer, intensity: EchoIntensity) -> Result<AudioBuffer> {
    match intensity.settings() {
        Some((delay_secs, feedback)) => apply_delay(buffer, delay_secs, feedback),
        None => Ok(buffer.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_impulse(frames: usize, sample_rate: u32) -> AudioBuffer {
        let mut samples = vec![0.0; frames];
        samples[0] = 1.0;
        AudioBuffer::mono(samples, sample_rate).unwrap()
    }

    #[test]
    fn test_delay_line_repeats() {
        let mut line = DelayLine::new(3, 0.5);
        let out: Vec<f32> = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|&x| line.tick(x))
            .collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_strong_echo_decays_monotonically() {
        let sr = 1000;
        let buf = unit_impulse(5000, sr);
        let out = apply_echo(&buf, EchoIntensity::Strong).unwrap();
        let d = 500;

        assert_eq!(out.frame_count(), buf.frame_count());
        assert_relative_eq!(out.channel(0)[0], DRY_LEVEL);

        let repeats: Vec<f32> = (1..10).map(|k| out.channel(0)[k * d]).collect();
        assert_relative_eq!(repeats[0], 0.4);
        assert_relative_eq!(repeats[1], 0.2);
        for pair in repeats.windows(2) {
            assert!(pair[1] < pair[0], "echo grew: {:?}", repeats);
        }
        assert!(out.channel(0).iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_subtle_echo_timing() {
        let sr = 8000;
        let out = apply_echo(&unit_impulse(8000, sr), EchoIntensity::Subtle).unwrap();
        let d = 2000;
        assert_relative_eq!(out.channel(0)[d], WET_LEVEL);
        assert_relative_eq!(out.channel(0)[2 * d], WET_LEVEL * 0.3, epsilon = 1e-6);
        // Nothing between the repeats
        assert_eq!(out.channel(0)[d - 1], 0.0);
        assert_eq!(out.channel(0)[d + 1], 0.0);
    }

    #[test]
    fn test_long_normalized_input_stays_bounded() {
        // Worst case: constant full-level input accumulates 0.98 / (1 - 0.5)
        let buf = AudioBuffer::mono(vec![0.98; 20000], 1000).unwrap();
        let out = apply_echo(&buf, EchoIntensity::Strong).unwrap();
        assert!(out.is_finite());
        let limit = DRY_LEVEL * 0.98 + WET_LEVEL * 0.98 / 0.5;
        assert!(out.peak() <= limit + 1e-4);
    }

    #[test]
    fn test_rejects_unstable_feedback() {
        let buf = unit_impulse(100, 1000);
        assert!(apply_delay(&buf, 0.01, 1.0).is_err());
        assert!(apply_delay(&buf, 0.0, 0.5).is_err());
    }

    #[test]
    fn test_none_is_copy() {
        let buf = unit_impulse(10, 1000);
        assert_eq!(apply_echo(&buf, EchoIntensity::None).unwrap(), buf);
    }

    #[test]
    fn test_delay_longer_than_buffer_is_dry_only() {
        let buf = AudioBuffer::mono(vec![0.5; 10], 44100).unwrap();
        let out = apply_delay(&buf, 1e12, 0.5).unwrap();
        assert_eq!(out.frame_count(), 10);
        for &s in out.channel(0) {
            assert_relative_eq!(s, DRY_LEVEL * 0.5);
        }

        // Exactly one buffer length behaves the same
        let out = apply_delay(&buf, 10.0 / 44100.0, 0.5).unwrap();
        assert!(out.channel(0).iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }
}
