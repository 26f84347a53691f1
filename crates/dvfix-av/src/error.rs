//! Error types for dvfix-av.

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while locating, running or interpreting external tools.
///
/// A tool that runs and exits non-zero is not an error at this level; see
/// [`crate::CommandRunner`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tool could not be located. `message` tells the operator how to
    /// make it available.
    #[error("tool not found: {tool}: {message}")]
    ToolNotFound { tool: String, message: String },

    /// A probing tool reported failure.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// The process could not be started at all.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its configured timeout and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    #[error("unexpected {tool} output: {message}")]
    ParseError { tool: String, message: String },

    #[error("no such file: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Scratch directory setup or final hand-off failed.
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl Error {
    pub fn tool_not_found(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
