//! Offline Render Graph
//!
//! An ordered list of enabled stages rendered to completion. Disabled
//! effects never appear in the list; there are no pass-through nodes.
//!
//! Stage order is fixed: Pitch → Reverb → Echo.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dsp::echo::apply_echo;
use crate::dsp::params::{EchoIntensity, EffectParams, PitchShift, ReverbSize};
use crate::dsp::pitch::apply_pitch;
use crate::dsp::reverb::apply_reverb;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxpostError};

/// One enabled processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "setting", rename_all = "lowercase")]
pub enum Stage {
    Pitch(PitchShift),
    Reverb(ReverbSize),
    Echo(EchoIntensity),
}

impl Stage {
    /// Position in the fixed processing order
    fn order(&self) -> u8 {
        match self {
            Stage::Pitch(_) => 0,
            Stage::Reverb(_) => 1,
            Stage::Echo(_) => 2,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Pitch(_) => "pitch",
            Stage::Reverb(_) => "reverb",
            Stage::Echo(_) => "echo",
        }
    }

    /// Run this stage on `buffer`
    fn render<R: Rng + ?Sized>(&self, buffer: &AudioBuffer, rng: &mut R) -> Result<AudioBuffer> {
        match *self {
            Stage::Pitch(shift) => Ok(apply_pitch(buffer, shift)),
            Stage::Reverb(size) => apply_reverb(buffer, size, rng),
            Stage::Echo(intensity) => apply_echo(buffer, intensity),
        }
    }
}

/// Ordered set of stages for one render
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderGraph {
    stages: Vec<Stage>,
}

impl RenderGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a request, keeping only the enabled effects
    pub fn from_params(params: &EffectParams) -> Self {
        let mut graph = Self::new();
        if params.pitch != PitchShift::Normal {
            graph.push(Stage::Pitch(params.pitch));
        }
        if params.reverb != ReverbSize::None {
            graph.push(Stage::Reverb(params.reverb));
        }
        if params.echo != EchoIntensity::None {
            graph.push(Stage::Echo(params.echo));
        }
        graph
    }

    /// Insert a stage at its place in the fixed order
    ///
    /// Adding a stage kind that is already present replaces it.
    pub fn push(&mut self, stage: Stage) {
        if let Some(existing) = self.stages.iter_mut().find(|s| s.order() == stage.order()) {
            *existing = stage;
            return;
        }
        let position = self
            .stages
            .iter()
            .position(|s| s.order() > stage.order())
            .unwrap_or(self.stages.len());
        self.stages.insert(position, stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Frames the render will produce for `input_frames`
    pub fn output_frames(&self, input_frames: usize) -> usize {
        self.stages.iter().fold(input_frames, |frames, stage| match stage {
            Stage::Pitch(shift) => shift.output_frames(frames),
            _ => frames,
        })
    }

    /// Render `input` through every stage
    ///
    /// Each intermediate buffer is dropped as soon as the next stage has
    /// consumed it.
    ///
    /// # Errors
    /// * `Render` - the output would have no frames, or a stage failed
    pub fn render<R: Rng + ?Sized>(&self, input: &AudioBuffer, rng: &mut R) -> Result<AudioBuffer> {
        let out_frames = self.output_frames(input.frame_count());
        if out_frames == 0 {
            return Err(VoxpostError::Render {
                reason: "requested output length is zero frames".to_string(),
            });
        }

        let mut current: Option<AudioBuffer> = None;
        for stage in &self.stages {
            let source = current.as_ref().unwrap_or(input);
            log::debug!(
                "[RENDER] {} on {} frames x {} channels",
                stage.name(),
                source.frame_count(),
                source.channel_count()
            );
            let next = stage.render(source, rng)?;
            current = Some(next);
        }

        let output = current.unwrap_or_else(|| input.clone());
        debug_assert_eq!(output.frame_count(), out_frames);
        Ok(output)
    }
}
