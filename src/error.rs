use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// Zero capacity, zero bucket count or a zero duration.
    #[error("invalid window configuration: {0}")]
    InvalidConfig(String),

    /// The windows keep insertion order and time as their only keys; they
    /// never remove individual elements.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty event line")]
    Empty,
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("missing code after `{0}`")]
    MissingCode(String),
    #[error("invalid code `{0}`")]
    BadCode(String),
    #[error("unexpected trailing input `{0}`")]
    Trailing(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] WindowError),
}
