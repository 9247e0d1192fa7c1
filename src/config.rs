//! Pipeline configuration
//!
//! Defaults for the CLI and for embedding callers, loadable from a JSON
//! file. Missing fields take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dsp::EffectParams;
use crate::engine::source::{DEFAULT_SAMPLE_RATE, MAX_DURATION_SECS, MIN_DURATION_SECS};
use crate::error::{Result, VoxpostError};

/// Settings shared by every request a [`Pipeline`](crate::Pipeline) serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Duration requested from the signal source when the caller gives none
    pub default_duration_secs: f64,
    /// Sample rate of generated placeholder and test signals
    pub sample_rate: u32,
    /// Seed for impulse-response noise; `None` draws a fresh seed per request
    pub seed: Option<u64>,
    /// Per-request time limit, checked between stages
    pub deadline_secs: Option<f64>,
    /// Effects applied when the caller does not choose any
    pub default_effects: EffectParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: MIN_DURATION_SECS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            seed: None,
            deadline_secs: None,
            default_effects: EffectParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("[CONFIG] loaded {}", path.display());
        Ok(config)
    }

    /// Check all values are usable
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.default_duration_secs) {
            return Err(VoxpostError::Config {
                reason: format!(
                    "default_duration_secs {} outside {}..={}",
                    self.default_duration_secs, MIN_DURATION_SECS, MAX_DURATION_SECS
                ),
            });
        }
        if self.sample_rate == 0 {
            return Err(VoxpostError::Config {
                reason: "sample_rate must be positive".to_string(),
            });
        }
        if let Some(secs) = self.deadline_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(VoxpostError::Config {
                    reason: format!("deadline_secs {} must be a positive number", secs),
                });
            }
        }
        Ok(())
    }

    /// Deadline as a `Duration`
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{EchoIntensity, ReverbSize};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.deadline(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voxpost.json");
        std::fs::write(
            &path,
            r#"{ "seed": 42, "deadline_secs": 2.5, "default_effects": { "reverb": "small", "echo": "strong" } }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.deadline(), Some(Duration::from_millis(2500)));
        assert_eq!(config.default_effects.reverb, ReverbSize::Small);
        assert_eq!(config.default_effects.echo, EchoIntensity::Strong);
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = PipelineConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VoxpostError::Config { .. })));

        let config = PipelineConfig {
            deadline_secs: Some(-1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::load(Path::new("/nonexistent/voxpost.json")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
