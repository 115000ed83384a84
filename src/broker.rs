//! Dispatches code to a provider and falls back to the primary once

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::providers::{
    ExecutionProvider, JdoodleProvider, Judge0Provider, PistonProvider, ProviderReply,
};
use crate::types::{ExecStatus, ExecutionResult, Language, ProviderKind};

/// What a run produced and which provider produced it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: ExecutionResult,
    pub provider: ProviderKind,
    pub fell_back: bool,
}

pub struct Broker {
    providers: HashMap<ProviderKind, Arc<dyn ExecutionProvider>>,
    default_provider: ProviderKind,
    timeout: Duration,
}

impl Broker {
    /// An empty broker; register adapters with [`Broker::with_provider`].
    pub fn new(default_provider: ProviderKind, timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
            timeout,
        }
    }

    /// All three adapters sharing one HTTP client.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("energy-scanline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Broker::new(settings.provider, settings.timeout)
            .with_provider(PistonProvider::new(
                client.clone(),
                &settings.piston_url,
                settings.run_timeout_ms,
            ))
            .with_provider(Judge0Provider::new(
                client.clone(),
                &settings.judge0_url,
                settings.judge0_api_key.clone(),
            ))
            .with_provider(JdoodleProvider::new(
                client,
                &settings.jdoodle_url,
                settings.jdoodle.clone(),
            )))
    }

    pub fn with_provider<P: ExecutionProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.insert(provider.kind(), Arc::new(provider));
        self
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Runs `code` on `preferred` (or the configured default). A failing
    /// non-primary provider is retried once on the primary. Never returns an
    /// error: a terminal failure becomes an `error` result with a hint.
    pub async fn run(
        &self,
        language: Language,
        code: &str,
        stdin: Option<&str>,
        preferred: Option<ProviderKind>,
    ) -> RunOutcome {
        let started = Instant::now();
        let selected = preferred.unwrap_or(self.default_provider);
        info!(provider = %selected, %language, chars = code.len(), "running code");

        match self.attempt(selected, language, code, stdin).await {
            Ok(result) => RunOutcome { result, provider: selected, fell_back: false },
            Err(err) if !selected.is_primary() => {
                warn!(
                    provider = %selected,
                    error = %err,
                    "provider failed, falling back to {}",
                    ProviderKind::PRIMARY
                );
                match self.attempt(ProviderKind::PRIMARY, language, code, stdin).await {
                    Ok(result) => RunOutcome {
                        result,
                        provider: ProviderKind::PRIMARY,
                        fell_back: true,
                    },
                    Err(err) => terminal_failure(err, ProviderKind::PRIMARY, true, started),
                }
            }
            Err(err) => terminal_failure(err, selected, false, started),
        }
    }

    async fn attempt(
        &self,
        kind: ProviderKind,
        language: Language,
        code: &str,
        stdin: Option<&str>,
    ) -> Result<ExecutionResult> {
        let provider = self
            .providers
            .get(&kind)
            .ok_or_else(|| Error::Config(format!("No {kind} adapter registered")))?;

        let started = Instant::now();
        let reply = tokio::time::timeout(self.timeout, provider.invoke(language, code, stdin))
            .await
            .map_err(|_| Error::Timeout { provider: kind, after: self.timeout })??;

        Ok(into_result(reply, started.elapsed()))
    }
}

/// Provider timing wins over wall-clock time when the provider reports it.
fn into_result(reply: ProviderReply, elapsed: Duration) -> ExecutionResult {
    ExecutionResult {
        output: reply.output,
        status: reply.status,
        execution_time: reply.reported_time.unwrap_or_else(|| elapsed.as_secs_f64()),
        memory_used: reply.memory_kb,
    }
}

fn terminal_failure(err: Error, provider: ProviderKind, fell_back: bool, started: Instant) -> RunOutcome {
    error!(provider = %provider, error = %err, "execution failed");
    let mut output = format!("Execution failed: {err}");
    if let Some(hint) = err.hint() {
        output.push_str("\nHint: ");
        output.push_str(&hint);
    }
    RunOutcome {
        result: ExecutionResult {
            output,
            status: ExecStatus::Error,
            execution_time: started.elapsed().as_secs_f64(),
            memory_used: None,
        },
        provider,
        fell_back,
    }
}
