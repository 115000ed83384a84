//! JDoodle: client id/secret travel in the request body

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, endpoint, ensure_success, transport, ExecutionProvider, Numeric, ProviderReply};
use crate::error::{Error, Result};
use crate::types::{Language, ProviderKind};

pub const DEFAULT_URL: &str = "https://api.jdoodle.com/v1";

#[derive(Clone)]
pub struct JdoodleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

// Keep the secret out of debug logs.
impl std::fmt::Debug for JdoodleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JdoodleCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

pub struct JdoodleProvider {
    client: Client,
    base_url: String,
    credentials: Option<JdoodleCredentials>,
}

impl JdoodleProvider {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: Option<JdoodleCredentials>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
        }
    }
}

/// JDoodle language name and version index.
fn target(language: Language) -> (&'static str, &'static str) {
    match language {
        Language::JavaScript => ("nodejs", "4"),
        Language::Python     => ("python3", "3"),
        Language::Cpp        => ("cpp17", "0"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    script: &'a str,
    stdin: &'a str,
    language: &'a str,
    version_index: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExecuteResponse {
    output: Option<String>,
    error: Option<String>,
    memory: Option<Numeric>,
}

impl ExecuteResponse {
    fn into_reply(self) -> ProviderReply {
        let mut reply = match self.error.filter(|e| !e.is_empty()) {
            Some(error) => ProviderReply::error(error),
            None => ProviderReply::success(self.output.unwrap_or_default()),
        };
        reply.memory_kb = self.memory.as_ref().and_then(Numeric::as_kb);
        reply
    }
}

#[async_trait]
impl ExecutionProvider for JdoodleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Jdoodle
    }

    async fn invoke(&self, language: Language, code: &str, stdin: Option<&str>) -> Result<ProviderReply> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(Error::MissingCredentials { provider: ProviderKind::Jdoodle })?;

        let (name, version_index) = target(language);
        let body = ExecuteRequest {
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            script: code,
            stdin: stdin.unwrap_or(""),
            language: name,
            version_index,
        };

        debug!(%language, target = name, version_index, "submitting to jdoodle");
        let response = self
            .client
            .post(endpoint(&self.base_url, "/execute"))
            .json(&body)
            .send()
            .await
            .map_err(transport(ProviderKind::Jdoodle))?;
        let response = ensure_success(ProviderKind::Jdoodle, response).await?;

        let parsed: ExecuteResponse = decode(ProviderKind::Jdoodle, response).await?;
        Ok(parsed.into_reply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Option<JdoodleCredentials> {
        Some(JdoodleCredentials {
            client_id: "id-123".to_string(),
            client_secret: "secret-456".to_string(),
        })
    }

    #[tokio::test]
    async fn test_successful_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_partial_json(json!({
                "clientId": "id-123",
                "clientSecret": "secret-456",
                "script": "console.log(1)",
                "stdin": "",
                "language": "nodejs",
                "versionIndex": "4"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "1\n",
                "statusCode": 200,
                "memory": "7408",
                "cpuTime": "0.04"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = JdoodleProvider::new(Client::new(), server.uri(), credentials());
        let reply = provider.invoke(Language::JavaScript, "console.log(1)", None).await.unwrap();
        assert_eq!(reply.status, ExecStatus::Success);
        assert_eq!(reply.output, "1\n");
        assert_eq!(reply.memory_kb, Some(7408), "String memory should be parsed");
        assert!(reply.reported_time.is_none());
    }

    #[tokio::test]
    async fn test_error_field_is_error_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "language": "cpp17", "versionIndex": "0" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "Daily limit reached",
                "statusCode": 429
            })))
            .mount(&server)
            .await;

        let provider = JdoodleProvider::new(Client::new(), server.uri(), credentials());
        let reply = provider.invoke(Language::Cpp, "int main(){}", None).await.unwrap();
        assert_eq!(reply.status, ExecStatus::Error);
        assert_eq!(reply.output, "Daily limit reached");
    }

    #[tokio::test]
    async fn test_numeric_memory_and_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "",
                "memory": 1024
            })))
            .mount(&server)
            .await;

        let provider = JdoodleProvider::new(Client::new(), server.uri(), credentials());
        let reply = provider.invoke(Language::Python, "pass", None).await.unwrap();
        assert_eq!(reply.output, "No output");
        assert_eq!(reply.memory_kb, Some(1024));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let provider = JdoodleProvider::new(Client::new(), "http://127.0.0.1:9", None);
        let err = provider.invoke(Language::Python, "pass", None).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { provider: ProviderKind::Jdoodle }));
        assert!(err.hint().unwrap().contains("JDOODLE_CLIENT_ID"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = JdoodleProvider::new(Client::new(), server.uri(), credentials());
        let err = provider.invoke(Language::Python, "pass", None).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { provider: ProviderKind::Jdoodle, .. }));
    }

    #[test]
    fn test_debug_hides_secret() {
        let dbg = format!("{:?}", credentials().unwrap());
        assert!(!dbg.contains("secret-456"));
        assert!(dbg.contains("id-123"));
    }
}
