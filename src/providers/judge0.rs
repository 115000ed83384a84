//! Judge0 CE via RapidAPI; payloads travel base64-encoded

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, endpoint, ensure_success, transport, ExecutionProvider, Numeric, ProviderReply};
use crate::error::{Error, Result};
use crate::types::{Language, ProviderKind};

pub const DEFAULT_URL: &str = "https://judge0-ce.p.rapidapi.com";
const DEFAULT_HOST: &str = "judge0-ce.p.rapidapi.com";

/// Status ids up to this value (In Queue, Processing, Accepted) are not failures.
const LAST_OK_STATUS: i64 = 3;

pub struct Judge0Provider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Judge0Provider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Value for `X-RapidAPI-Host`: the configured host, or the public CE host.
    fn rapidapi_host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }
}

fn language_id(language: Language) -> u32 {
    match language {
        Language::JavaScript => 63, // Node.js
        Language::Python     => 71, // Python 3
        Language::Cpp        => 54, // C++ (GCC)
    }
}

#[derive(Debug, Serialize)]
struct Submission {
    language_id: u32,
    source_code: String,
    stdin: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmissionResult {
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    time: Option<Numeric>,
    memory: Option<Numeric>,
    status: Option<SubmissionStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmissionStatus {
    id: i64,
    description: Option<String>,
}

/// Decodes an optional base64 field; empty or absent fields yield `None`.
fn decode_field(name: &str, value: Option<&str>) -> Result<Option<String>> {
    let Some(encoded) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    // Judge0 wraps long payloads at 76 columns
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| Error::MalformedResponse {
        provider: ProviderKind::Judge0,
        reason: format!("invalid base64 in {name}: {e}"),
    })?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Some(text).filter(|t| !t.is_empty()))
}

impl SubmissionResult {
    fn into_reply(self) -> Result<ProviderReply> {
        let stdout = decode_field("stdout", self.stdout.as_deref())?;
        let stderr = decode_field("stderr", self.stderr.as_deref())?;
        let compile_output = decode_field("compile_output", self.compile_output.as_deref())?;

        let status_id = self.status.as_ref().map_or(0, |s| s.id);
        let mut reply = if status_id > LAST_OK_STATUS {
            let message = stderr
                .or(compile_output)
                .or_else(|| self.status.and_then(|s| s.description).filter(|d| !d.is_empty()))
                .unwrap_or_else(|| "Execution error".to_string());
            ProviderReply::error(message)
        } else {
            ProviderReply::success(stdout.unwrap_or_default())
        };

        reply.reported_time = self.time.as_ref().and_then(Numeric::as_f64);
        reply.memory_kb = self.memory.as_ref().and_then(Numeric::as_kb);
        Ok(reply)
    }
}

#[async_trait]
impl ExecutionProvider for Judge0Provider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Judge0
    }

    async fn invoke(&self, language: Language, code: &str, stdin: Option<&str>) -> Result<ProviderReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(Error::MissingCredentials { provider: ProviderKind::Judge0 })?;

        let body = Submission {
            language_id: language_id(language),
            source_code: STANDARD.encode(code),
            stdin: stdin.filter(|s| !s.is_empty()).map(|s| STANDARD.encode(s)).unwrap_or_default(),
        };

        debug!(%language, language_id = body.language_id, "submitting to judge0");
        let response = self
            .client
            .post(endpoint(&self.base_url, "/submissions?base64_encoded=true&wait=true"))
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", self.rapidapi_host())
            .json(&body)
            .send()
            .await
            .map_err(transport(ProviderKind::Judge0))?;
        let response = ensure_success(ProviderKind::Judge0, response).await?;

        let parsed: SubmissionResult = decode(ProviderKind::Judge0, response).await?;
        parsed.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    fn provider(server: &MockServer) -> Judge0Provider {
        Judge0Provider::new(Client::new(), server.uri(), Some("test-key".to_string()))
    }

    #[tokio::test]
    async fn test_accepted_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions"))
            .and(query_param("base64_encoded", "true"))
            .and(query_param("wait", "true"))
            .and(header("X-RapidAPI-Key", "test-key"))
            .and(header("X-RapidAPI-Host", "127.0.0.1"))
            .and(body_partial_json(json!({
                "language_id": 71,
                "source_code": b64("print(input())"),
                "stdin": b64("hi")
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stdout": b64("hi\n"),
                "stderr": null,
                "compile_output": null,
                "time": "0.021",
                "memory": 3456,
                "status": { "id": 3, "description": "Accepted" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .invoke(Language::Python, "print(input())", Some("hi"))
            .await
            .unwrap();
        assert_eq!(reply.status, ExecStatus::Success);
        assert_eq!(reply.output, "hi\n");
        assert_eq!(reply.reported_time, Some(0.021), "Judge0's own timing is authoritative");
        assert_eq!(reply.memory_kb, Some(3456));
    }

    #[tokio::test]
    async fn test_empty_stdin_sent_as_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "language_id": 63, "stdin": "" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stdout": null,
                "status": { "id": 3, "description": "Accepted" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server).invoke(Language::JavaScript, "1", None).await.unwrap();
        assert_eq!(reply.output, "No output");
    }

    #[tokio::test]
    async fn test_runtime_error_prefers_stderr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stdout": null,
                "stderr": b64("ZeroDivisionError: division by zero\n"),
                "compile_output": b64("ignored"),
                "status": { "id": 11, "description": "Runtime Error (NZEC)" }
            })))
            .mount(&server)
            .await;

        let reply = provider(&server).invoke(Language::Python, "1/0", None).await.unwrap();
        assert_eq!(reply.status, ExecStatus::Error);
        assert_eq!(reply.output, "ZeroDivisionError: division by zero\n");
    }

    #[tokio::test]
    async fn test_compile_error_falls_back_to_compile_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "compile_output": b64("main.cpp:1: error"),
                "status": { "id": 6, "description": "Compilation Error" }
            })))
            .mount(&server)
            .await;

        let reply = provider(&server).invoke(Language::Cpp, "x", None).await.unwrap();
        assert_eq!(reply.output, "main.cpp:1: error");
    }

    #[tokio::test]
    async fn test_error_without_text_uses_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": { "id": 5, "description": "Time Limit Exceeded" }
            })))
            .mount(&server)
            .await;

        let reply = provider(&server).invoke(Language::Cpp, "for(;;);", None).await.unwrap();
        assert_eq!(reply.output, "Time Limit Exceeded");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": { "id": 13 } })))
            .mount(&server)
            .await;
        let reply = provider(&server).invoke(Language::Cpp, "x", None).await.unwrap();
        assert_eq!(reply.output, "Execution error");
    }

    #[tokio::test]
    async fn test_missing_key_is_failure_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let provider = Judge0Provider::new(Client::new(), server.uri(), None);
        let err = provider.invoke(Language::Python, "print(1)", None).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { provider: ProviderKind::Judge0 }));
    }

    #[tokio::test]
    async fn test_invalid_base64_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stdout": "%%% not base64 %%%",
                "status": { "id": 3 }
            })))
            .mount(&server)
            .await;

        let err = provider(&server).invoke(Language::Python, "print(1)", None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }), "got {err:?}");
    }

    #[test]
    fn test_wrapped_base64_decodes() {
        let wrapped = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_field("stdout", Some(wrapped)).unwrap().as_deref(), Some("hello world"));
        assert_eq!(decode_field("stdout", Some("")).unwrap(), None);
    }

    #[test]
    fn test_rapidapi_host_derivation() {
        let p = Judge0Provider::new(Client::new(), DEFAULT_URL, None);
        assert_eq!(p.rapidapi_host(), "judge0-ce.p.rapidapi.com");
        let p = Judge0Provider::new(Client::new(), "not a url", None);
        assert_eq!(p.rapidapi_host(), DEFAULT_HOST);
    }
}
