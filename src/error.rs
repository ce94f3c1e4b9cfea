//! Error taxonomy shared by the router, handlers and startup code.

use thiserror::Error;

/// Central error type for GENGAR
#[derive(Error, Debug)]
pub enum GengarError {
    /// Invalid config value or a required credential is missing
    #[error("configuration error: {0}")]
    Config(String),

    /// A handler's external API call or process failed
    #[error("{command} failed: {reason}")]
    Handler { command: String, reason: String },

    #[error("empty input")]
    EmptyInput,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GengarError {
    /// Wrap a handler error, keeping the full context chain in the reason
    pub fn handler(command: &str, err: &anyhow::Error) -> Self {
        GengarError::Handler {
            command: command.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn is_handler_failure(&self) -> bool {
        matches!(self, GengarError::Handler { .. })
    }
}

/// Result type alias for GENGAR operations
pub type GengarResult<T> = Result<T, GengarError>;
