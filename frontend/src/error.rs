use shared::WireError;
use thiserror::Error;

/// Failures surfaced by the engine. Cancellation is not one of them: a
/// superseded request simply reports that nothing was applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Rejected before any request was issued.
    #[error("{0}")]
    Validation(String),
    /// Network failure or non-success HTTP status.
    #[error("request failed: {message}")]
    Transport { status: Option<u16>, message: String },
    /// `{error: ...}` payload delivered with a success status.
    #[error("{0}")]
    Backend(String),
    /// Response that could not be decoded into any accepted shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no dataset is loaded")]
    NoDataset,
}

impl EngineError {
    pub fn transport(message: impl Into<String>) -> Self {
        EngineError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        EngineError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Raw message for display, without the variant prefix.
    pub fn raw_message(&self) -> String {
        match self {
            EngineError::Validation(message)
            | EngineError::Backend(message)
            | EngineError::Decode(message) => message.clone(),
            EngineError::Transport {
                status: Some(status),
                message,
            } => format!("HTTP {status}: {message}"),
            EngineError::Transport { status: None, message } => message.clone(),
            EngineError::NoDataset => self.to_string(),
        }
    }
}

impl From<WireError> for EngineError {
    fn from(error: WireError) -> Self {
        EngineError::Decode(error.to_string())
    }
}
