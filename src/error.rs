use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Every failure the connect flow can surface to the user.
///
/// Display strings are user-facing: the dispatcher shows them verbatim in
/// its failure state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{description}")]
    Provider { error: String, description: String },

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("No authentication code found")]
    MissingCode,

    #[error("Unrecognized authentication callback: {0}")]
    Unrecognized(String),

    #[error("Authentication state mismatch. Please try connecting again.")]
    StateMismatch,

    #[error("Authentication already in progress")]
    InProgress,

    #[error("Please wait a moment before trying to authenticate again")]
    TooSoon,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from server: {0}")]
    Decode(String),

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidRequest(String),
}

impl AuthError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        AuthError::Storage(format!("{err:#}"))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Decode(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Config(format!("invalid url: {err}"))
    }
}
