//! Piston: free public runner, no credentials

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, endpoint, ensure_success, transport, ExecutionProvider, ProviderReply};
use crate::error::{Error, Result};
use crate::types::{Language, ProviderKind};

pub const DEFAULT_URL: &str = "https://emkc.org/api/v2/piston";

pub struct PistonProvider {
    client: Client,
    base_url: String,
    run_timeout_ms: u64,
}

impl PistonProvider {
    pub fn new(client: Client, base_url: impl Into<String>, run_timeout_ms: u64) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            run_timeout_ms,
        }
    }
}

/// Piston runtime name and pinned version.
fn runtime(language: Language) -> (&'static str, &'static str) {
    match language {
        Language::JavaScript => ("javascript", "18.15.0"),
        Language::Python     => ("python", "3.10.0"),
        Language::Cpp        => ("c++", "10.2.0"),
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: [SourceFile<'a>; 1],
    stdin: &'a str,
    run_timeout: u64,
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    name: String,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExecuteResponse {
    run: Option<Stage>,
    compile: Option<Stage>,
    /// Set instead of `run` when Piston rejects the request.
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Stage {
    stderr: String,
    output: String,
    code: Option<i64>,
}

impl ExecuteResponse {
    fn into_reply(self) -> Result<ProviderReply> {
        if let Some(run) = self.run {
            return Ok(if run.stderr.is_empty() {
                ProviderReply::success(run.output)
            } else {
                ProviderReply::error(run.stderr)
            });
        }
        match self.compile {
            Some(compile) if compile.code.unwrap_or(0) != 0 || !compile.stderr.is_empty() => {
                let text = if compile.stderr.is_empty() { compile.output } else { compile.stderr };
                Ok(ProviderReply::error(text))
            }
            _ => Err(Error::MalformedResponse {
                provider: ProviderKind::Piston,
                reason: self.message.unwrap_or_else(|| "response has no run stage".to_string()),
            }),
        }
    }
}

#[async_trait]
impl ExecutionProvider for PistonProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Piston
    }

    async fn invoke(&self, language: Language, code: &str, stdin: Option<&str>) -> Result<ProviderReply> {
        let (runtime, version) = runtime(language);
        let body = ExecuteRequest {
            language: runtime,
            version,
            files: [SourceFile {
                name: format!("main{}", language.extension()),
                content: code,
            }],
            stdin: stdin.unwrap_or(""),
            run_timeout: self.run_timeout_ms,
        };

        debug!(%language, runtime, version, "submitting to piston");
        let response = self
            .client
            .post(endpoint(&self.base_url, "/execute"))
            .json(&body)
            .send()
            .await
            .map_err(transport(ProviderKind::Piston))?;
        let response = ensure_success(ProviderKind::Piston, response).await?;

        let parsed: ExecuteResponse = decode(ProviderKind::Piston, response).await?;
        parsed.into_reply()
    }
}
