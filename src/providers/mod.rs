//! Remote compile-and-run backends behind one interface

pub mod jdoodle;
pub mod judge0;
pub mod piston;

use async_trait::async_trait;
use reqwest::Response;

use crate::error::{Error, Result};
use crate::types::{ExecStatus, Language, ProviderKind};

pub use jdoodle::JdoodleProvider;
pub use judge0::Judge0Provider;
pub use piston::PistonProvider;

/// Placeholder output for a successful run that printed nothing.
pub const NO_OUTPUT: &str = "No output";

/// A provider's answer, normalized. `status` reflects what the executed code
/// did; transport and decoding problems are `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub output: String,
    pub status: ExecStatus,
    /// Seconds, when the provider measures the run itself.
    pub reported_time: Option<f64>,
    pub memory_kb: Option<u64>,
}

impl ProviderReply {
    pub fn success(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            output: if output.is_empty() { NO_OUTPUT.to_string() } else { output },
            status: ExecStatus::Success,
            reported_time: None,
            memory_kb: None,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status: ExecStatus::Error,
            reported_time: None,
            memory_kb: None,
        }
    }
}

/// Trait for execution backends
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Compile (if needed) and run `code`, feeding it `stdin`.
    async fn invoke(&self, language: Language, code: &str, stdin: Option<&str>) -> Result<ProviderReply>;
}

/// Joins a configured base URL and an endpoint path.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Turns a non-2xx response into [`Error::ProviderStatus`], keeping a short
/// excerpt of the body.
pub(crate) async fn ensure_success(provider: ProviderKind, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no body").to_string()
    } else {
        body.chars().take(200).collect()
    };
    Err(Error::ProviderStatus { provider, status: status.as_u16(), message })
}

/// A numeric field that some providers send as a JSON string.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|n| n.is_finite() && *n >= 0.0)
    }

    pub(crate) fn as_kb(&self) -> Option<u64> {
        self.as_f64().map(|n| n.round() as u64)
    }
}

pub(crate) fn transport(provider: ProviderKind) -> impl FnOnce(reqwest::Error) -> Error {
    move |source| Error::Transport { provider, source }
}

/// Decodes a response body, reporting undecodable JSON as malformed rather
/// than as a transport failure.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(provider: ProviderKind, response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(transport(provider))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::MalformedResponse {
        provider,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_success_output_becomes_placeholder() {
        assert_eq!(ProviderReply::success("").output, NO_OUTPUT);
        assert_eq!(ProviderReply::success("hi\n").output, "hi\n");
    }

    #[test]
    fn test_error_output_kept_verbatim() {
        let reply = ProviderReply::error("");
        assert_eq!(reply.status, ExecStatus::Error);
        assert_eq!(reply.output, "");
    }

    #[test]
    fn test_numeric_accepts_strings_and_numbers() {
        let n: Numeric = serde_json::from_str("\"0.012\"").unwrap();
        assert_eq!(n.as_f64(), Some(0.012));
        let n: Numeric = serde_json::from_str("3456").unwrap();
        assert_eq!(n.as_kb(), Some(3456));
        let n: Numeric = serde_json::from_str("\"n/a\"").unwrap();
        assert_eq!(n.as_f64(), None, "Unparseable text yields no value");
        let n: Numeric = serde_json::from_str("-1").unwrap();
        assert_eq!(n.as_kb(), None, "Negative values are discarded");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(endpoint("https://emkc.org/api/v2/piston/", "/execute"),
            "https://emkc.org/api/v2/piston/execute");
        assert_eq!(endpoint("http://localhost:2000", "/execute"), "http://localhost:2000/execute");
    }
}
