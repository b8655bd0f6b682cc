use crate::config::ConfigError;

/// Error type shared by the driver, the binary and internal soft failures.
///
/// The decoders themselves never fail on input; [`DecodeError::ToolCall`] is
/// produced internally for a dropped tool-call payload and only logged.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Tool call payload error: {0}")]
    ToolCall(String),
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    /// Whether the error came from the input stream rather than local setup.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, DecodeError::Transport(_) | DecodeError::Io(_))
    }
}
