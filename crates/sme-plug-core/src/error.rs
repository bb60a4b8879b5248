//! Error types for the SME-Plug core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to the SME backend.
///
/// Every REST call folds into one of these shapes; panels render them
/// through [`ApiError::user_message`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No response at all (connection refused, timeout, DNS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}{}", detail_suffix(.detail))]
    Server { status: u16, detail: Option<String> },

    /// The body did not match the shape the endpoint promises.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request could not be built locally; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// Short message for a response panel. A server-supplied detail wins.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server {
                detail: Some(detail),
                ..
            } => format!("Error: {detail}"),
            ApiError::Server { status, .. } => {
                format!("Error: the expert backend failed (HTTP {status}).")
            }
            ApiError::Transport(_) => {
                "Error: could not reach the expert backend. Is it running?".to_string()
            }
            ApiError::Malformed(_) => {
                "Error: the expert backend sent an unexpected response.".to_string()
            }
            ApiError::InvalidRequest(reason) => format!("Error: {reason}"),
        }
    }

    /// The explanation the backend supplied, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Server { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Server {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Failure loading or saving the on-disk configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid base URL {0:?}")]
    BaseUrl(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors surfaced by the orchestration layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failure of one stage of the custom-role pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("role name must not be empty")]
    EmptyName,

    #[error("a custom role is already being created")]
    Busy,

    #[error("failed to read {path}: {message}")]
    Attachment { path: String, message: String },

    #[error("text extraction failed: {0}")]
    Extraction(ApiError),

    #[error("rule generation failed: {0}")]
    Generation(ApiError),

    #[error("saving the role failed: {0}")]
    Persistence(ApiError),

    #[error("reloading custom roles failed: {0}")]
    Refresh(ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ApiError::Server {
            status: 429,
            detail: Some("rate limited".to_string()),
        };
        assert_eq!(err.user_message(), "Error: rate limited");
        assert_eq!(err.detail(), Some("rate limited"));
    }

    #[test]
    fn test_user_message_falls_back_without_detail() {
        let err = ApiError::Server {
            status: 500,
            detail: None,
        };
        assert!(err.user_message().starts_with("Error: "));
        assert!(err.user_message().contains("500"));

        let err = ApiError::Transport("connection refused".to_string());
        assert!(err.user_message().starts_with("Error: "));
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ApiError::Server {
            status: 404,
            detail: Some("Unknown role: Pilot".to_string()),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 404: Unknown role: Pilot");
    }
}
