//! Peak normalization
//!
//! Scales a signal so its loudest sample sits at 0.98, leaving headroom
//! below full scale for later stages and re-encoding.

use crate::engine::AudioBuffer;

/// Target peak after normalization
pub const TARGET_PEAK: f32 = 0.98;

/// Normalize `buffer` to [`TARGET_PEAK`]
///
/// A silent buffer is returned as an unchanged copy.
pub fn normalize(buffer: &AudioBuffer) -> AudioBuffer {
    let peak = buffer.peak();
    if peak == 0.0 || !peak.is_finite() {
        return buffer.clone();
    }

    let gain = TARGET_PEAK as f64 / peak as f64;
    log::debug!("[NORMALIZE] peak {:.6} -> gain {:.6}", peak, gain);

    let channels: Vec<Vec<f32>> = buffer
        .channels()
        .map(|c| {
            c.iter()
                .map(|&s| ((s as f64 * gain) as f32).clamp(-TARGET_PEAK, TARGET_PEAK))
                .collect()
        })
        .collect();

    AudioBuffer::from_shaped(channels, buffer.sample_rate())
}
