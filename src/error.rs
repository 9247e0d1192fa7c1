//! Error handling for Voxpost
//!
//! Pipeline failures are never retried. The orchestrator wraps the first
//! failure with the stage it came from.

use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Result type alias for Voxpost operations
pub type Result<T> = std::result::Result<T, VoxpostError>;

/// Generic text shown when the upstream signal source fails
pub const GENERIC_UPSTREAM_MESSAGE: &str = "Failed to generate audio. Please try again.";

/// Main error type for Voxpost operations
#[derive(Error, Debug)]
pub enum VoxpostError {
    // Container Errors
    #[error("Malformed container: {reason}")]
    MalformedContainer { reason: String },

    #[error("Encoding error: {reason}")]
    Encoding { reason: String },

    // Buffer Errors
    #[error("Invalid audio buffer: {reason}")]
    InvalidBuffer { reason: String },

    // Processing Errors
    #[error("Render error: {reason}")]
    Render { reason: String },

    #[error("Upstream generation failed: {message}")]
    UpstreamGeneration { message: String },

    // Pipeline Errors
    #[error("Pipeline stage '{stage}' failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<VoxpostError>,
    },

    #[error("Deadline exceeded before stage '{stage}'")]
    DeadlineExceeded { stage: PipelineStage },

    // Configuration Errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VoxpostError {
    /// Wrap an error with the pipeline stage it occurred in
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            // Already tagged by an inner stage; keep the innermost tag.
            tagged @ VoxpostError::StageFailed { .. } => tagged,
            tagged @ VoxpostError::DeadlineExceeded { .. } => tagged,
            other => VoxpostError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage that failed, if this error came out of the pipeline
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            VoxpostError::StageFailed { stage, .. } => Some(*stage),
            VoxpostError::DeadlineExceeded { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Strip stage tags and return the underlying error
    pub fn root_cause(&self) -> &VoxpostError {
        match self {
            VoxpostError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VoxpostError::MalformedContainer { .. } => "MALFORMED_CONTAINER",
            VoxpostError::Encoding { .. } => "ENCODING_ERROR",
            VoxpostError::InvalidBuffer { .. } => "INVALID_BUFFER",
            VoxpostError::Render { .. } => "RENDER_ERROR",
            VoxpostError::UpstreamGeneration { .. } => "UPSTREAM_GENERATION_ERROR",
            VoxpostError::StageFailed { source, .. } => source.error_code(),
            VoxpostError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            VoxpostError::Config { .. } => "CONFIG_ERROR",
            VoxpostError::Io(_) => "IO_ERROR",
            VoxpostError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller may reasonably try the same request again
    ///
    /// The pipeline itself never retries.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VoxpostError::StageFailed { source, .. } => source.is_recoverable(),
            VoxpostError::UpstreamGeneration { .. } => true,
            VoxpostError::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self.root_cause() {
            VoxpostError::UpstreamGeneration { message } => upstream_message(message).to_string(),
            VoxpostError::MalformedContainer { .. } => {
                "The generated audio could not be read. Please try again.".to_string()
            }
            VoxpostError::DeadlineExceeded { .. } => {
                "Audio processing took too long and was cancelled.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Map known upstream failure text to something a listener can act on
fn upstream_message(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("api key not valid") {
        "The API key is invalid. Please check the application configuration."
    } else if lower.contains("prompt was blocked") {
        "Your prompt was blocked for safety reasons. Please modify your prompt and try again."
    } else if lower.contains("quota") || lower.contains("resource_exhausted") {
        "The API quota has been exceeded. Please try again later."
    } else {
        GENERIC_UPSTREAM_MESSAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_codes() {
        let err = VoxpostError::MalformedContainer {
            reason: "missing RIFF".to_string(),
        };
        assert_eq!(err.error_code(), "MALFORMED_CONTAINER");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_stage_tag_keeps_root_cause() {
        let err = VoxpostError::Render {
            reason: "zero-length output".to_string(),
        }
        .at_stage(PipelineStage::Render);

        assert_eq!(err.failed_stage(), Some(PipelineStage::Render));
        assert_eq!(err.error_code(), "RENDER_ERROR");
        assert!(matches!(err.root_cause(), VoxpostError::Render { .. }));

        // Re-tagging does not hide the original stage
        let retagged = err.at_stage(PipelineStage::Encode);
        assert_eq!(retagged.failed_stage(), Some(PipelineStage::Render));
    }

    #[test_case("API key not valid. Please pass a valid API key.", "The API key is invalid" ; "api key")]
    #[test_case("Prompt was blocked by policy", "blocked for safety" ; "blocked")]
    #[test_case("RESOURCE_EXHAUSTED: try later", "quota has been exceeded" ; "exhausted")]
    #[test_case("socket hang up", "Failed to generate audio" ; "generic")]
    fn test_upstream_friendly_message(raw: &str, expected: &str) {
        let err = VoxpostError::UpstreamGeneration {
            message: raw.to_string(),
        }
        .at_stage(PipelineStage::Synthesize);

        assert!(err.friendly_message().contains(expected));
        // The verbatim upstream text survives in the Display output
        assert!(err.to_string().contains(raw));
    }
}
