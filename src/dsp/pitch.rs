//! Pitch stage
//!
//! Changes pitch the way a faster or slower playback rate would: the signal
//! is read at fractional positions advancing by the rate per output frame,
//! so duration scales by `1 / rate`.

use crate::dsp::params::PitchShift;
use crate::engine::AudioBuffer;

/// Resample `buffer` for the given pitch shift
///
/// `PitchShift::Normal` returns an exact copy.
pub fn apply_pitch(buffer: &AudioBuffer, shift: PitchShift) -> AudioBuffer {
    if shift == PitchShift::Normal {
        return buffer.clone();
    }

    let (num, den) = shift.rate_ratio();
    let out_frames = shift.output_frames(buffer.frame_count());
    let channels: Vec<Vec<f32>> = buffer
        .channels()
        .map(|c| resample_linear(c, num, den, out_frames))
        .collect();

    AudioBuffer::from_shaped(channels, buffer.sample_rate())
}

/// Linear interpolation at positions `i * num / den`
///
/// Positions are kept as exact rationals so long signals do not drift.
fn resample_linear(samples: &[f32], num: u64, den: u64, out_frames: usize) -> Vec<f32> {
    let len = samples.len();
    let mut output = Vec::with_capacity(out_frames);

    for i in 0..out_frames as u64 {
        let pos = i * num;
        let idx = (pos / den) as usize;
        let frac = (pos % den) as f32 / den as f32;

        let sample = if idx + 1 < len {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < len {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(frames: usize) -> AudioBuffer {
        AudioBuffer::mono((0..frames).map(|i| i as f32 / frames as f32).collect(), 44100).unwrap()
    }

    #[test]
    fn test_normal_is_identity() {
        let buf = AudioBuffer::from_channels(vec![vec![0.1, -0.7, 0.33], vec![1.0, 0.0, -1.0]], 22050)
            .unwrap();
        let out = apply_pitch(&buf, PitchShift::Normal);
        assert_eq!(out, buf);
    }

    #[test]
    fn test_low_lengthens_signal() {
        let out = apply_pitch(&ramp(44100), PitchShift::Low);
        assert_eq!(out.frame_count(), 55125);
        assert_eq!(out.sample_rate(), 44100);
    }

    #[test]
    fn test_high_shortens_signal() {
        let out = apply_pitch(&ramp(44100), PitchShift::High);
        assert_eq!(out.frame_count(), 35280);
    }

    #[test]
    fn test_linear_interpolation_values() {
        let buf = AudioBuffer::mono(vec![0.0, 1.0, 0.0, -1.0, 0.0], 8000).unwrap();
        let out = apply_pitch(&buf, PitchShift::Low);

        // Read positions 0, 0.8, 1.6, 2.4, 3.2, 4.0, 4.8
        assert_eq!(out.frame_count(), 7);
        let expected = [0.0, 0.8, 0.4, -0.4, -0.8, 0.0, 0.0];
        for (got, want) in out.channel(0).iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_channels_resampled_independently() {
        let buf = AudioBuffer::from_channels(vec![vec![1.0; 8], vec![-1.0; 8]], 8000).unwrap();
        let out = apply_pitch(&buf, PitchShift::High);
        assert!(out.channel(0).iter().all(|&s| (s - 1.0).abs() < 1e-6));
        assert!(out.channel(1).iter().all(|&s| (s + 1.0).abs() < 1e-6));
    }
}
