//! Runner errors.

use container_engine_interface::{ContainerId, EngineError};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Container engine unavailable")]
    EngineUnavailable(#[source] EngineError),

    #[error("Failed to query images for {image}")]
    EngineQueryFailed { image: String, source: EngineError },

    #[error("Failed to pull image {image}")]
    ImagePullFailed { image: String, source: EngineError },

    #[error("Failed to create container {guid} from {image}")]
    ContainerCreateFailed {
        guid: String,
        image: String,
        source: EngineError,
    },

    #[error("Failed to start container {container_id} ({guid})")]
    ContainerStartFailed {
        guid: String,
        container_id: ContainerId,
        source: EngineError,
    },

    #[error("Cleanup failed to {step} {target}")]
    CleanupFailed {
        step: &'static str,
        target: String,
        source: EngineError,
    },

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("A browser container for {0} is already tracked")]
    AlreadyRunning(String),
}

impl RunnerError {
    /// The underlying engine error, if the failure came from the engine.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            RunnerError::EngineUnavailable(source)
            | RunnerError::EngineQueryFailed { source, .. }
            | RunnerError::ImagePullFailed { source, .. }
            | RunnerError::ContainerCreateFailed { source, .. }
            | RunnerError::ContainerStartFailed { source, .. }
            | RunnerError::CleanupFailed { source, .. } => Some(source),
            RunnerError::InvalidRequest(_) | RunnerError::AlreadyRunning(_) => None,
        }
    }

    /// True when the lifetime token was cancelled while the step was in flight.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.engine_error(), Some(EngineError::Cancelled))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.engine_error(), Some(EngineError::Timeout(_)))
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_engine_cause_is_source_not_message() {
        let err = RunnerError::ImagePullFailed {
            image: "selenoid/vnc:chrome_90.0".to_string(),
            source: EngineError::Pull("manifest unknown".to_string()),
        };

        assert_eq!(err.to_string(), "Failed to pull image selenoid/vnc:chrome_90.0");
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("manifest unknown"));
    }

    #[test]
    fn test_cancelled_and_timeout_helpers() {
        let cancelled = RunnerError::EngineUnavailable(EngineError::Cancelled);
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());
        assert!(RunnerError::AlreadyRunning("g".to_string()).engine_error().is_none());
    }
}
