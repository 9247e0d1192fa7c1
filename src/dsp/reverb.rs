//! Convolution reverb
//!
//! The room is a synthesized impulse response: exponentially decaying white
//! noise, one independent noise burst per channel. The signal is convolved
//! with it via FFT and the result truncated to the requested length.

use rand::Rng;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::dsp::params::ReverbSize;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxpostError};

// ============================================================================
// Convolver normalization constants
// ============================================================================

/// Overall gain applied to a unit-power impulse
const GAIN_CALIBRATION: f64 = 0.00125;

/// Sample rate the calibration gain was tuned at
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;

/// Floor on impulse power, so a near-silent impulse is not boosted wildly
const MIN_POWER: f64 = 0.000125;

// ============================================================================
// Impulse Response
// ============================================================================

/// Synthesized room impulse
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    /// Normalization applied when convolving
    scale: f64,
}

impl ImpulseResponse {
    /// Synthesize decaying noise for `size` at `sample_rate`
    ///
    /// Each of the `channels` bursts is `sample_rate × seconds` long with
    /// amplitude `uniform(-1, 1) × (1 − i/len)^seconds`.
    ///
    /// # Errors
    /// * `Render` - `size` is `ReverbSize::None`, or no channels requested
    pub fn synthesize<R: Rng + ?Sized>(
        size: ReverbSize,
        sample_rate: u32,
        channels: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let seconds = size.seconds().ok_or_else(|| VoxpostError::Render {
            reason: "cannot synthesize an impulse for a disabled reverb".to_string(),
        })?;
        if channels == 0 {
            return Err(VoxpostError::Render {
                reason: "impulse needs at least one channel".to_string(),
            });
        }

        let len = sample_rate as usize * seconds as usize;
        let decay = seconds as i32;
        let bursts: Vec<Vec<f32>> = (0..channels)
            .map(|_| {
                (0..len)
                    .map(|i| {
                        let envelope = (1.0 - i as f64 / len as f64).powi(decay);
                        rng.gen_range(-1.0f32..1.0) * envelope as f32
                    })
                    .collect()
            })
            .collect();

        Ok(Self::from_channels(bursts, sample_rate))
    }

    /// Wrap existing impulse data, computing its normalization
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let scale = normalization_scale(&channels, sample_rate);
        Self {
            channels,
            sample_rate,
            scale,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples of one impulse channel
    ///
    /// # Panics
    /// Panics if `index >= channel_count()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Gain applied to the impulse during convolution
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Scale that brings a noise impulse of any length near unity loudness
fn normalization_scale(channels: &[Vec<f32>], sample_rate: u32) -> f64 {
    let total: usize = channels.iter().map(|c| c.len()).sum();
    if total == 0 {
        return 1.0;
    }
    let sum_sq: f64 = channels
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let power = (sum_sq / total as f64).sqrt().max(MIN_POWER);

    GAIN_CALIBRATION / power * (GAIN_CALIBRATION_SAMPLE_RATE / sample_rate as f64)
}

// ============================================================================
// Convolution
// ============================================================================

/// Convolve each channel of `buffer` with `impulse`, keeping `out_frames`
///
/// A mono impulse is shared by every channel; otherwise channel counts
/// must match.
///
/// # Errors
/// * `Render` - sample rates differ, or channel counts are incompatible
pub fn convolve(
    buffer: &AudioBuffer,
    impulse: &ImpulseResponse,
    out_frames: usize,
) -> Result<AudioBuffer> {
    if impulse.sample_rate() != buffer.sample_rate() {
        return Err(VoxpostError::Render {
            reason: format!(
                "impulse sample rate {} Hz does not match signal rate {} Hz",
                impulse.sample_rate(),
                buffer.sample_rate()
            ),
        });
    }
    let ir_channels = impulse.channel_count();
    if ir_channels != 1 && ir_channels != buffer.channel_count() {
        return Err(VoxpostError::Render {
            reason: format!(
                "impulse has {} channels, signal has {}",
                ir_channels,
                buffer.channel_count()
            ),
        });
    }

    let mut planner = FftPlanner::<f64>::new();
    let scale = impulse.scale() as f32;
    let channels: Vec<Vec<f32>> = buffer
        .channels()
        .enumerate()
        .map(|(ch, signal)| {
            let ir = impulse.channel(if ir_channels == 1 { 0 } else { ch });
            let mut wet = fft_convolve(&mut planner, signal, ir, out_frames);
            wet.iter_mut().for_each(|s| *s *= scale);
            wet
        })
        .collect();

    AudioBuffer::from_channels(channels, buffer.sample_rate())
}

/// Apply a reverb of `size`, synthesizing the impulse at the signal's rate
pub fn apply_reverb<R: Rng + ?Sized>(
    buffer: &AudioBuffer,
    size: ReverbSize,
    rng: &mut R,
) -> Result<AudioBuffer> {
    let impulse =
        ImpulseResponse::synthesize(size, buffer.sample_rate(), buffer.channel_count(), rng)?;
    log::debug!(
        "[REVERB] {:?}: {} impulse frames x {} channels, scale {:.6}",
        size,
        impulse.len(),
        impulse.channel_count(),
        impulse.scale()
    );
    convolve(buffer, &impulse, buffer.frame_count())
}

/// Overlap-add convolution of `signal` with `ir`, keeping `out_frames`
///
/// The impulse spectrum is computed once; the signal is then processed in
/// blocks of `ir.len().next_power_of_two()` frames, so working memory grows
/// with the impulse length only.
fn fft_convolve(
    planner: &mut FftPlanner<f64>,
    signal: &[f32],
    ir: &[f32],
    out_frames: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; out_frames];
    if signal.is_empty() || ir.is_empty() || out_frames == 0 {
        return out;
    }

    let block = ir.len().next_power_of_two();
    let n = (block + ir.len() - 1).next_power_of_two();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);
    let mut scratch = vec![
        Complex::new(0.0, 0.0);
        fft.get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len())
    ];

    let mut spectrum: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); n];
    for (bin, &h) in spectrum.iter_mut().zip(ir) {
        *bin = Complex::new(h as f64, 0.0);
    }
    fft.process_with_scratch(&mut spectrum, &mut scratch);

    let norm = 1.0 / n as f64;
    let mut work: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); n];
    for (index, chunk) in signal.chunks(block).enumerate() {
        let offset = index * block;
        if offset >= out_frames {
            break;
        }

        work.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
        for (slot, &x) in work.iter_mut().zip(chunk) {
            *slot = Complex::new(x as f64, 0.0);
        }
        fft.process_with_scratch(&mut work, &mut scratch);
        for (x, h) in work.iter_mut().zip(&spectrum) {
            *x *= *h;
        }
        ifft.process_with_scratch(&mut work, &mut scratch);

        let tail = (chunk.len() + ir.len() - 1).min(out_frames - offset);
        for (dst, c) in out[offset..offset + tail].iter_mut().zip(&work) {
            *dst += (c.re * norm) as f32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn direct_convolve(a: &[f32], b: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; a.len() + b.len() - 1];
        for (i, &x) in a.iter().enumerate() {
            for (j, &h) in b.iter().enumerate() {
                out[i + j] += x * h;
            }
        }
        out
    }

    #[test]
    fn test_fft_matches_direct_convolution() {
        let a = [0.5, -1.0, 0.25, 0.0, 0.75];
        let b = [1.0, 0.5, -0.5];
        let mut planner = FftPlanner::new();
        let fast = fft_convolve(&mut planner, &a, &b, a.len() + b.len() - 1);
        let slow = direct_convolve(&a, &b);

        assert_eq!(fast.len(), a.len() + b.len() - 1);
        for (f, s) in fast.iter().zip(slow.iter()) {
            assert_relative_eq!(*f, *s, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_multi_block_signal_matches_direct_convolution() {
        // Impulse of 5 gives 8-frame blocks; 61 frames spans 8 blocks
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let a: Vec<f32> = (0..61).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let b = [0.9, -0.4, 0.3, 0.2, -0.1];
        let slow = direct_convolve(&a, &b);
        let mut planner = FftPlanner::new();

        let full = fft_convolve(&mut planner, &a, &b, slow.len());
        assert_eq!(full.len(), slow.len());
        for (f, s) in full.iter().zip(slow.iter()) {
            assert_relative_eq!(*f, *s, epsilon = 1e-5);
        }

        // Truncated mid-block, and padded past the end
        let short = fft_convolve(&mut planner, &a, &b, 30);
        assert_eq!(short.as_slice(), &full[..30]);
        let long = fft_convolve(&mut planner, &a, &b, slow.len() + 7);
        assert_eq!(&long[..slow.len()], full.as_slice());
        assert!(long[slow.len()..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_impulse_length_and_envelope() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ir = ImpulseResponse::synthesize(ReverbSize::Large, 1000, 2, &mut rng).unwrap();

        assert_eq!(ir.len(), 4000);
        assert_eq!(ir.channel_count(), 2);
        assert_eq!(ir.sample_rate(), 1000);
        assert!(ir.channel(0).iter().all(|s| s.abs() <= 1.0));

        let energy = |s: &[f32]| s.iter().map(|x| x * x).sum::<f32>();
        let head = energy(&ir.channel(0)[..1000]);
        let tail = energy(&ir.channel(0)[3000..]);
        assert!(head > tail * 100.0, "head {} tail {}", head, tail);

        // Channels get independent noise
        assert_ne!(ir.channel(0), ir.channel(1));
    }

    #[test]
    fn test_small_impulse_is_two_seconds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ir = ImpulseResponse::synthesize(ReverbSize::Small, 8000, 1, &mut rng).unwrap();
        assert_eq!(ir.len(), 16000);
    }

    #[test]
    fn test_same_seed_same_impulse() {
        let a = ImpulseResponse::synthesize(ReverbSize::Small, 500, 1, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        let b = ImpulseResponse::synthesize(ReverbSize::Small, 500, 1, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a.channel(0), b.channel(0));
    }

    #[test]
    fn test_disabled_reverb_has_no_impulse() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(ImpulseResponse::synthesize(ReverbSize::None, 44100, 1, &mut rng).is_err());
    }

    #[test]
    fn test_convolve_rejects_rate_mismatch() {
        let buf = AudioBuffer::mono(vec![1.0, 0.0, 0.0], 44100).unwrap();
        let ir = ImpulseResponse::from_channels(vec![vec![1.0, 0.5]], 48000);
        let err = convolve(&buf, &ir, 3).unwrap_err();
        assert!(matches!(err, VoxpostError::Render { .. }));
    }

    #[test]
    fn test_convolve_truncates_and_scales() {
        let buf = AudioBuffer::mono(vec![1.0, 0.0, 0.0, 0.0], 44100).unwrap();
        let ir = ImpulseResponse::from_channels(vec![vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0]], 44100);
        let out = convolve(&buf, &ir, 4).unwrap();

        assert_eq!(out.frame_count(), 4);
        // Unit impulse in -> scaled impulse response out
        let scale = ir.scale() as f32;
        assert_relative_eq!(out.channel(0)[0], scale, epsilon = 1e-6);
        assert_relative_eq!(out.channel(0)[1], -scale, epsilon = 1e-6);
    }

    #[test]
    fn test_reverb_keeps_level_reasonable() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let tone: Vec<f32> = (0..8000)
            .map(|i| 0.98 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 8000.0).sin())
            .collect();
        let buf = AudioBuffer::mono(tone, 8000).unwrap();
        let out = apply_reverb(&buf, ReverbSize::Small, &mut rng).unwrap();

        assert_eq!(out.frame_count(), buf.frame_count());
        assert!(out.is_finite());
        assert!(out.rms() > 0.01);
        assert!(out.peak() < 10.0);
    }
}
