//! Pipeline Orchestrator
//!
//! Runs one request end to end:
//!
//! 1. Synthesize - pull the raw signal from the source and encode it
//! 2. Decode
//! 3. Normalize
//! 4. Render - only when an effect is requested
//! 5. Encode
//!
//! Each stage is announced to the progress observer before it starts. The
//! first failure aborts the run and comes back tagged with its stage; no
//! partial output is returned.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dsp::{normalize, EffectParams, RenderGraph};
use crate::engine::{clamp_duration, decode, encode, AudioBuffer, SignalSource, MIME_TYPE};
use crate::error::{Result, VoxpostError};

/// Named step of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Synthesize,
    Decode,
    Normalize,
    Render,
    Encode,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Synthesize => "synthesize",
            PipelineStage::Decode => "decode",
            PipelineStage::Normalize => "normalize",
            PipelineStage::Render => "render",
            PipelineStage::Encode => "encode",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives a notification before each stage starts
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, request_id: Uuid, stage: PipelineStage);
}

impl<F> ProgressObserver for F
where
    F: Fn(Uuid, PipelineStage) + Send + Sync,
{
    fn stage_started(&self, request_id: Uuid, stage: PipelineStage) {
        self(request_id, stage)
    }
}

/// Observer that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn stage_started(&self, request_id: Uuid, stage: PipelineStage) {
        log::info!("[PIPELINE {}] {}", request_id, stage);
    }
}

/// Where the raw signal comes from
pub enum PipelineInput<'a> {
    /// Pull a fresh signal from a source
    Source(&'a dyn SignalSource),
    /// Container bytes produced elsewhere
    Encoded(Vec<u8>),
    /// A signal that is already decoded
    Decoded(AudioBuffer),
}

impl fmt::Debug for PipelineInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineInput::Source(s) => write!(f, "Source({})", s.name()),
            PipelineInput::Encoded(b) => write!(f, "Encoded({} bytes)", b.len()),
            PipelineInput::Decoded(buf) => write!(
                f,
                "Decoded({} frames x {} channels)",
                buf.frame_count(),
                buf.channel_count()
            ),
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub request_id: Uuid,
    /// Encoded container
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub channels: usize,
    pub sample_rate: u32,
    pub frame_count: usize,
    /// Peak of the final buffer before quantization
    pub peak: f32,
    /// SHA-256 of `bytes`, hex encoded
    pub sha256: String,
    /// Seed used for impulse-response noise
    pub seed: u64,
    pub effects: EffectParams,
    /// Stages that actually ran, in order
    pub stages: Vec<PipelineStage>,
}

/// Hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Per-run bookkeeping
struct RunContext<'p> {
    request_id: Uuid,
    deadline: Option<Instant>,
    observer: &'p dyn ProgressObserver,
    stages: Vec<PipelineStage>,
}

impl RunContext<'_> {
    /// Check the deadline, then announce `stage`
    fn enter(&mut self, stage: PipelineStage) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                log::warn!("[PIPELINE {}] deadline passed before {}", self.request_id, stage);
                return Err(VoxpostError::DeadlineExceeded { stage });
            }
        }
        self.observer.stage_started(self.request_id, stage);
        self.stages.push(stage);
        Ok(())
    }
}

/// Stateless orchestrator; safe to share across threads
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Create a pipeline that reports progress to the log
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            observer: Arc::new(LogProgress),
        }
    }

    /// Replace the progress observer
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request using the configured deadline, if any
    pub fn run(
        &self,
        input: PipelineInput<'_>,
        duration_secs: f64,
        effects: &EffectParams,
    ) -> Result<RenderOutput> {
        let deadline = self.config.deadline().map(|d| Instant::now() + d);
        self.run_until(input, duration_secs, effects, deadline)
    }

    /// Run one request, aborting between stages once `deadline` passes
    pub fn run_until(
        &self,
        input: PipelineInput<'_>,
        duration_secs: f64,
        effects: &EffectParams,
        deadline: Option<Instant>,
    ) -> Result<RenderOutput> {
        let mut ctx = RunContext {
            request_id: Uuid::new_v4(),
            deadline,
            observer: self.observer.as_ref(),
            stages: Vec::with_capacity(5),
        };
        let duration_secs = clamp_duration(duration_secs);
        let seed = self.config.seed.unwrap_or_else(rand::random);
        log::debug!(
            "[PIPELINE {}] input {:?}, {:.2}s, effects {:?}, seed {}",
            ctx.request_id,
            input,
            duration_secs,
            effects,
            seed
        );

        // 1 + 2: obtain a decoded signal
        let decoded = match input {
            PipelineInput::Source(source) => {
                ctx.enter(PipelineStage::Synthesize)?;
                let bytes = source
                    .generate(duration_secs)
                    .and_then(|raw| encode(&raw))
                    .map_err(|e| e.at_stage(PipelineStage::Synthesize))?;
                Self::decode_stage(&mut ctx, &bytes)?
            }
            PipelineInput::Encoded(bytes) => Self::decode_stage(&mut ctx, &bytes)?,
            PipelineInput::Decoded(buffer) => buffer,
        };

        // 3: normalize
        ctx.enter(PipelineStage::Normalize)?;
        let normalized = normalize(&decoded);
        drop(decoded);

        // 4: effects
        let processed = if effects.is_neutral() {
            normalized
        } else {
            ctx.enter(PipelineStage::Render)?;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            RenderGraph::from_params(effects)
                .render(&normalized, &mut rng)
                .map_err(|e| e.at_stage(PipelineStage::Render))?
        };

        // 5: encode
        ctx.enter(PipelineStage::Encode)?;
        let bytes = encode(&processed).map_err(|e| e.at_stage(PipelineStage::Encode))?;

        let output = RenderOutput {
            request_id: ctx.request_id,
            mime_type: MIME_TYPE,
            channels: processed.channel_count(),
            sample_rate: processed.sample_rate(),
            frame_count: processed.frame_count(),
            peak: processed.peak(),
            sha256: sha256_hex(&bytes),
            bytes,
            seed,
            effects: *effects,
            stages: ctx.stages,
        };
        log::info!(
            "[PIPELINE {}] done: {} frames, {} bytes",
            output.request_id,
            output.frame_count,
            output.bytes.len()
        );
        Ok(output)
    }

    fn decode_stage(ctx: &mut RunContext<'_>, bytes: &[u8]) -> Result<AudioBuffer> {
        ctx.enter(PipelineStage::Decode)?;
        decode(bytes).map_err(|e| e.at_stage(PipelineStage::Decode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{EchoIntensity, PitchShift, ReverbSize};
    use crate::engine::{PlaceholderSource, ToneSource};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FailingSource;

    impl SignalSource for FailingSource {
        fn generate(&self, _duration_secs: f64) -> Result<AudioBuffer> {
            Err(VoxpostError::UpstreamGeneration {
                message: "quota exceeded".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn seeded() -> Pipeline {
        Pipeline::new(PipelineConfig {
            seed: Some(1),
            ..Default::default()
        })
    }

    #[test]
    fn test_neutral_run_skips_render() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = seeded().with_observer(move |_: Uuid, stage: PipelineStage| {
            sink.lock().unwrap().push(stage)
        });

        let tone = ToneSource::new(440.0);
        let out = pipeline
            .run(PipelineInput::Source(&tone), 1.0, &EffectParams::default())
            .unwrap();

        let expected = vec![
            PipelineStage::Synthesize,
            PipelineStage::Decode,
            PipelineStage::Normalize,
            PipelineStage::Encode,
        ];
        assert_eq!(*seen.lock().unwrap(), expected);
        assert_eq!(out.stages, expected);
        assert_eq!(out.bytes.len(), 44 + 88200);
        assert_relative_eq!(out.peak, 0.98, epsilon = 1e-6);
        assert_eq!(out.mime_type, "audio/wav");
        assert_eq!(out.sha256, sha256_hex(&out.bytes));
        assert_eq!(out.sha256.len(), 64);
    }

    #[test]
    fn test_effects_run_render_stage() {
        let tone = ToneSource::new(440.0);
        let effects = EffectParams {
            reverb: ReverbSize::None,
            echo: EchoIntensity::Subtle,
            pitch: PitchShift::High,
        };
        let out = seeded()
            .run(PipelineInput::Source(&tone), 1.0, &effects)
            .unwrap();
        assert!(out.stages.contains(&PipelineStage::Render));
        assert_eq!(out.frame_count, 35280);
    }

    #[test]
    fn test_upstream_failure_is_tagged() {
        let err = seeded()
            .run(PipelineInput::Source(&FailingSource), 1.0, &EffectParams::default())
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(PipelineStage::Synthesize));
        assert!(matches!(err.root_cause(), VoxpostError::UpstreamGeneration { .. }));
        assert!(err.friendly_message().contains("quota"));
    }

    #[test]
    fn test_malformed_input_fails_at_decode() {
        let err = seeded()
            .run(
                PipelineInput::Encoded(b"not a container at all".to_vec()),
                1.0,
                &EffectParams::default(),
            )
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(PipelineStage::Decode));
        assert_eq!(err.error_code(), "MALFORMED_CONTAINER");
    }

    #[test]
    fn test_empty_signal_fails_at_render() {
        let empty = AudioBuffer::silence(1, 0, 44100).unwrap();
        let effects = EffectParams {
            echo: EchoIntensity::Strong,
            ..Default::default()
        };
        let err = seeded()
            .run(PipelineInput::Decoded(empty), 1.0, &effects)
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(PipelineStage::Render));
        assert_eq!(err.error_code(), "RENDER_ERROR");
    }

    #[test]
    fn test_expired_deadline_aborts_before_first_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = seeded().with_observer(move |_: Uuid, stage: PipelineStage| {
            sink.lock().unwrap().push(stage)
        });

        let past = Instant::now() - Duration::from_millis(1);
        let err = pipeline
            .run_until(
                PipelineInput::Source(&PlaceholderSource::default()),
                1.0,
                &EffectParams::default(),
                Some(past),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            VoxpostError::DeadlineExceeded {
                stage: PipelineStage::Synthesize
            }
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_silent_placeholder_survives_pipeline() {
        let out = seeded()
            .run(
                PipelineInput::Source(&PlaceholderSource::default()),
                0.1, // clamped up to 1s
                &EffectParams::default(),
            )
            .unwrap();
        assert_eq!(out.frame_count, 44100);
        assert_eq!(out.peak, 0.0);
        assert!(out.bytes[44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }
}
