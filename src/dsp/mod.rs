//! DSP Stages
//!
//! Pure buffer-to-buffer transformations. Every stage takes `&AudioBuffer`
//! and returns a new buffer; none mutates its input.

pub mod echo;
pub mod graph;
pub mod normalize;
pub mod params;
pub mod pitch;
pub mod reverb;

pub use echo::{apply_delay, apply_echo};
pub use graph::{RenderGraph, Stage};
pub use normalize::{normalize, TARGET_PEAK};
pub use params::{EchoIntensity, EffectParams, PitchShift, ReverbSize};
pub use pitch::apply_pitch;
pub use reverb::{apply_reverb, convolve, ImpulseResponse};
