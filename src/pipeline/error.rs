use super::stages::Stage;
use super::Outcome;

/// Why a pipeline run stopped early.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required tool could not be resolved.
    #[error("{message}")]
    Configuration { tool: String, message: String },

    /// A stage's tool exited with an unacceptable code.
    #[error("{stage} failed: {tool} exited with code {exit_code}")]
    Stage {
        stage: Stage,
        tool: String,
        exit_code: i32,
        output: String,
    },

    /// The tool could not be run at all (spawn failure, timeout).
    #[error(transparent)]
    Tool(dvfix_av::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Host result code for this failure.
    pub fn outcome(&self) -> Outcome {
        match self {
            PipelineError::Configuration { .. } => Outcome::ConfigurationError,
            _ => Outcome::ProcessingFailure,
        }
    }

    /// Captured tool output, for stage failures.
    pub fn output(&self) -> Option<&str> {
        match self {
            PipelineError::Stage { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<dvfix_av::Error> for PipelineError {
    fn from(err: dvfix_av::Error) -> Self {
        match err {
            dvfix_av::Error::ToolNotFound { tool, message } => {
                PipelineError::Configuration { tool, message }
            }
            other => PipelineError::Tool(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unresolved_tool_is_configuration_error() {
        let err = PipelineError::from(dvfix_av::Error::tool_not_found("mkvinfo", "install it"));
        assert_eq!(err.outcome(), Outcome::ConfigurationError);
        assert_eq!(err.to_string(), "install it");
    }

    #[test]
    fn test_timeout_is_processing_failure() {
        let err = PipelineError::from(dvfix_av::Error::TimedOut {
            tool: "dovi_tool".into(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(err.outcome(), Outcome::ProcessingFailure);
        assert!(err.output().is_none());
    }

    #[test]
    fn test_stage_failure_message() {
        let err = PipelineError::Stage {
            stage: Stage::InjectMetadata,
            tool: "dovi_tool".into(),
            exit_code: 1,
            output: "Error: invalid RPU".into(),
        };
        assert_eq!(err.to_string(), "Replacing RPU failed: dovi_tool exited with code 1");
        assert_eq!(err.output(), Some("Error: invalid RPU"));
        assert_eq!(err.outcome(), Outcome::ProcessingFailure);
    }
}
