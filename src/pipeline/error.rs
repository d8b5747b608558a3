//! Pipeline-specific error types.

use thiserror::Error;

/// Errors raised by a single element's lifecycle hooks.
///
/// None of these escape the element's own runner except a failed `prepare`,
/// which the scheduler turns into [`PipelineError::StartupFailure`].
#[derive(Error, Debug)]
pub enum ElementError {
    /// A resource needed by this instance could not be acquired.
    #[error("Resource unavailable: {0}")]
    Resource(String),

    /// An external collaborator (device, model, player) failed for one item.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    /// A finite source has nothing more to produce.
    #[error("Source exhausted")]
    Exhausted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ElementError {
    pub fn resource(message: impl Into<String>) -> Self {
        ElementError::Resource(message.into())
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        ElementError::Collaborator(message.into())
    }
}

pub type ElementResult<T> = std::result::Result<T, ElementError>;

/// Errors that can occur while building or running the pipeline graph.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Element '{element}' failed to start: {source}")]
    StartupFailure {
        element: String,
        #[source]
        source: ElementError,
    },

    #[error("Startup interrupted by a stop request")]
    StartupInterrupted,

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Pipeline has no elements")]
    EmptyPipeline,

    #[error("Stage '{0}' was added twice")]
    DuplicateStage(String),

    #[error("Timed out waiting for {pending} element(s) to stop")]
    StopTimeout { pending: usize },

    #[error("Failed to spawn element thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failure_names_element() {
        let err = PipelineError::StartupFailure {
            element: "blink_detector#2".to_string(),
            source: ElementError::resource("model file missing"),
        };
        let text = err.to_string();
        assert!(text.contains("blink_detector#2"));
        assert!(text.contains("model file missing"));
    }
}
