//! Error types for energy-scanline

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::types::ProviderKind;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for energy-scanline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage {
        language: String,
        supported: Vec<&'static str>,
    },

    #[error("Code is required")]
    MissingCode,

    #[error("Code exceeds maximum size limit ({limit} characters, got {len})")]
    CodeTooLarge { len: usize, limit: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} credentials not configured")]
    MissingCredentials { provider: ProviderKind },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} timed out after {after:?}")]
    Timeout { provider: ProviderKind, after: Duration },

    #[error("{provider} returned HTTP {status}: {message}")]
    ProviderStatus {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{service} service unavailable: {reason}")]
    CollaboratorUnavailable {
        service: &'static str,
        reason: String,
    },

    /// The service answered but reported that the run itself failed.
    #[error("{service} service error (HTTP {status}): {message}")]
    CollaboratorFailed {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-stable error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ProviderUnavailable,
    CollaboratorUnavailable,
    CollaboratorError,
    InternalError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedLanguage { .. }
            | Error::MissingCode
            | Error::CodeTooLarge { .. }
            | Error::InvalidRequest(_)
            | Error::Config(_) => ErrorKind::ValidationError,
            Error::MissingCredentials { .. }
            | Error::Transport { .. }
            | Error::Timeout { .. }
            | Error::ProviderStatus { .. }
            | Error::MalformedResponse { .. } => ErrorKind::ProviderUnavailable,
            Error::CollaboratorUnavailable { .. } => ErrorKind::CollaboratorUnavailable,
            Error::CollaboratorFailed { .. } => ErrorKind::CollaboratorError,
            Error::Io(_) | Error::Json(_) => ErrorKind::InternalError,
        }
    }

    /// How to restore availability, for failures the user can act on.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::MissingCredentials { provider: ProviderKind::Judge0 } => {
                Some("Set JUDGE0_API_KEY (and optionally JUDGE0_API_URL) to use Judge0".to_string())
            }
            Error::MissingCredentials { provider: ProviderKind::Jdoodle } => Some(
                "Set JDOODLE_CLIENT_ID and JDOODLE_CLIENT_SECRET to use JDoodle".to_string(),
            ),
            Error::MissingCredentials { .. } => None,
            Error::Transport { provider, .. } => Some(format!(
                "Check network connectivity to the {provider} endpoint or configure its URL"
            )),
            Error::Timeout { .. } => Some(
                "Shorten the program's running time or raise timeout_secs in the config".to_string(),
            ),
            Error::ProviderStatus { status: 429, .. } => {
                Some("The provider is rate limiting requests; retry later".to_string())
            }
            Error::ProviderStatus { .. } | Error::MalformedResponse { .. } => {
                Some("Try another provider with --provider".to_string())
            }
            Error::CollaboratorUnavailable { .. } => Some(
                "Start the measurement service (python energy_service.py) or set PYTHON_SERVICE_URL"
                    .to_string(),
            ),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::ValidationError
    }
}

/// Serializable form of an [`Error`] for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Full source chain; only populated in development mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn from_error(err: &Error, development: bool) -> Self {
        let supported = match err {
            Error::UnsupportedLanguage { supported, .. } => Some(supported.clone()),
            _ => None,
        };
        let details = development.then(|| source_chain(err));
        ErrorBody {
            error: err.kind(),
            message: err.to_string(),
            supported,
            hint: err.hint(),
            details,
        }
    }
}

fn source_chain(err: &Error) -> String {
    let mut parts = vec![format!("{err:?}")];
    let mut source = std::error::Error::source(err);
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join("\ncaused by: ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        assert_eq!(Error::MissingCode.kind(), ErrorKind::ValidationError);
        assert_eq!(
            Error::CodeTooLarge { len: 10, limit: 5 }.kind(),
            ErrorKind::ValidationError
        );
        assert!(Error::Config("bad".into()).is_validation());
    }

    #[test]
    fn test_provider_failures_are_unavailable() {
        let err = Error::MissingCredentials { provider: ProviderKind::Judge0 };
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        let hint = err.hint().expect("missing credentials should carry a hint");
        assert!(hint.contains("JUDGE0_API_KEY"), "Hint should name the env var: {hint}");
    }

    #[test]
    fn test_error_body_lists_supported_languages() {
        let err = Error::UnsupportedLanguage {
            language: "cobol".into(),
            supported: vec!["javascript", "python", "cpp"],
        };
        let body = ErrorBody::from_error(&err, false);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["supported"].as_array().map(|a| a.len()), Some(3));
        assert!(json.get("details").is_none(), "details must be hidden outside development mode");
    }

    #[test]
    fn test_error_body_details_only_in_development() {
        let err = Error::Timeout { provider: ProviderKind::Piston, after: Duration::from_secs(30) };
        let body = ErrorBody::from_error(&err, true);
        assert!(body.details.is_some(), "development mode should include details");
        assert_eq!(body.error, ErrorKind::ProviderUnavailable);
    }

    #[test]
    fn test_sub_second_timeout_keeps_precision() {
        let err = Error::Timeout { provider: ProviderKind::Judge0, after: Duration::from_millis(250) };
        assert_eq!(err.to_string(), "judge0 timed out after 250ms");
    }

    #[test]
    fn test_collaborator_failure_is_not_an_outage() {
        let err = Error::CollaboratorFailed {
            service: "measurement",
            status: 400,
            message: "Compilation failed".into(),
        };
        assert_eq!(err.kind(), ErrorKind::CollaboratorError);
        assert!(err.hint().is_none(), "A reachable service needs no start hint");
        let json = serde_json::to_value(ErrorBody::from_error(&err, false)).unwrap();
        assert_eq!(json["error"], "collaborator_error");
    }
}
