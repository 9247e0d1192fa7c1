//! Effect parameters
//!
//! Value objects chosen by the caller and consumed once per render.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Reverb room size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReverbSize {
    /// Reverb stage disabled
    #[default]
    None,
    Small,
    Large,
}

impl ReverbSize {
    /// Impulse length in seconds; also used as the decay exponent
    pub fn seconds(self) -> Option<u32> {
        match self {
            ReverbSize::None => None,
            ReverbSize::Small => Some(2),
            ReverbSize::Large => Some(4),
        }
    }
}

/// Echo intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EchoIntensity {
    /// Echo stage disabled
    #[default]
    None,
    Subtle,
    Strong,
}

impl EchoIntensity {
    /// Delay time in seconds and feedback gain
    pub fn settings(self) -> Option<(f64, f32)> {
        match self {
            EchoIntensity::None => None,
            EchoIntensity::Subtle => Some((0.25, 0.3)),
            EchoIntensity::Strong => Some((0.5, 0.5)),
        }
    }
}

/// Pitch shift via playback rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PitchShift {
    Low,
    #[default]
    Normal,
    High,
}

impl PitchShift {
    /// Playback rate as an exact fraction `(numerator, denominator)`
    pub fn rate_ratio(self) -> (u64, u64) {
        match self {
            PitchShift::Low => (4, 5),
            PitchShift::Normal => (1, 1),
            PitchShift::High => (5, 4),
        }
    }

    /// Playback rate as a float (0.8, 1.0, 1.25)
    pub fn rate(self) -> f64 {
        let (num, den) = self.rate_ratio();
        num as f64 / den as f64
    }

    /// Output frame count for `input_frames`: `ceil(input_frames / rate)`
    pub fn output_frames(self, input_frames: usize) -> usize {
        let (num, den) = self.rate_ratio();
        ((input_frames as u64 * den).div_ceil(num)) as usize
    }
}

/// The full set of effect choices for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub reverb: ReverbSize,
    pub echo: EchoIntensity,
    pub pitch: PitchShift,
}

impl EffectParams {
    /// True when no effect changes the signal
    pub fn is_neutral(&self) -> bool {
        self.reverb == ReverbSize::None
            && self.echo == EchoIntensity::None
            && self.pitch == PitchShift::Normal
    }
}
