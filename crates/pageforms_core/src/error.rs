use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutocompleteError>;

#[derive(Debug, Error)]
pub enum AutocompleteError {
    #[error("the substring must be specified")]
    MissingSubstring,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    #[error("query failed: {message}")]
    QueryFailed { code: String, message: String },

    #[error("{0}")]
    UnknownError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl AutocompleteError {
    pub fn query_failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::MissingSubstring => "param_substr",
            Self::InvalidSelector(_) => "invalid_selector",
            Self::BackingStoreUnavailable(_) => "backend_unavailable",
            Self::QueryFailed { code, .. } => code,
            Self::UnknownError(_) => "unknownerror",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Engine failures are query failures; row decoding and API misuse are
/// passed through as unknown errors.
impl From<rusqlite::Error> for AutocompleteError {
    fn from(error: rusqlite::Error) -> Self {
        if error.sqlite_error_code().is_some() || matches!(error, rusqlite::Error::InvalidQuery) {
            Self::query_failed("sqlite_error", error.to_string())
        } else {
            Self::UnknownError(error.to_string())
        }
    }
}

impl From<reqwest::Error> for AutocompleteError {
    fn from(error: reqwest::Error) -> Self {
        Self::query_failed("http_error", error.to_string())
    }
}
