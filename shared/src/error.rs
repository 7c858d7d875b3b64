use thiserror::Error;

/// Payloads that could not be normalized into the canonical shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WireError {
    #[error("record is missing the `_id` row identifier")]
    MissingRowId,
    #[error("row identifier `{0}` is not a non-negative integer")]
    InvalidRowId(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("invalid engine config: {0}")]
    Config(String),
}

impl From<serde_json::Error> for WireError {
    fn from(error: serde_json::Error) -> Self {
        WireError::Malformed(error.to_string())
    }
}
