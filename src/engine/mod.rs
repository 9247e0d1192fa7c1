//! Audio Engine Module
//!
//! Signal representation and the edges of the pipeline:
//! - Audio buffer type
//! - PCM container codec
//! - Raw signal sources

pub mod buffer;
pub mod codec;
pub mod source;

pub use buffer::AudioBuffer;
pub use codec::{decode, encode, inspect, ContainerInfo, MIME_TYPE};
pub use source::{
    clamp_duration, generate_test_tone, PlaceholderSource, SignalSource, ToneSource,
    WavFileSource,
};
