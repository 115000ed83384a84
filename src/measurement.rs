//! Client for the energy measurement / optimization service

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Hotspot, Language};

const SERVICE: &str = "measurement";

/// Measured energy for one run. Every field tolerates being absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurement {
    pub status: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "executionTime_ms", alias = "executionTime", alias = "time_ms")]
    pub execution_time_ms: f64,
    pub energy: EnergyBreakdown,
    pub hardware: HardwareInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyBreakdown {
    pub total_kwh: f64,
    pub total_wh: f64,
    pub total_mj: f64,
    pub co2_emissions_kg: f64,
    pub co2_emissions_g: f64,
}

/// How each component was measured, as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareInfo {
    #[serde(deserialize_with = "lenient_text")]
    pub cpu_energy: String,
    #[serde(deserialize_with = "lenient_text")]
    pub gpu_energy: String,
    #[serde(deserialize_with = "lenient_text")]
    pub ram_energy: String,
}

/// Accepts strings, numbers or null.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Liveness of the service, as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServiceHealth {
    Available { service: Value, url: String },
    Unavailable { message: String, hint: String, url: String },
}

impl ServiceHealth {
    pub fn is_available(&self) -> bool {
        matches!(self, ServiceHealth::Available { .. })
    }
}

pub struct MeasurementClient {
    client: Client,
    base_url: String,
}

impl MeasurementClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Runs `code` on the service and returns its energy measurement.
    pub async fn measure(&self, language: Language, code: &str, stdin: Option<&str>) -> Result<Measurement> {
        let body = json!({
            "language": language,
            "code": code,
            "stdin": stdin.unwrap_or(""),
        });
        debug!(%language, url = %self.base_url, "requesting measurement");
        let value = self.post_json("/measure", &body).await?;
        serde_json::from_value(value).map_err(|e| unavailable(format!("undecodable measurement: {e}")))
    }

    /// Like [`measure`](Self::measure), but an unreachable or failing service
    /// yields `None` so callers can carry on with static analysis alone.
    pub async fn measure_or_absent(&self, language: Language, code: &str, stdin: Option<&str>) -> Option<Measurement> {
        match self.measure(language, code, stdin).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "no energy measurement, continuing with static analysis");
                None
            }
        }
    }

    pub async fn health(&self) -> ServiceHealth {
        let url = self.base_url.clone();
        let response = match self.client.get(self.url("/health")).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "health check failed");
                return ServiceHealth::Unavailable {
                    message: "Service not running".to_string(),
                    hint: start_hint(),
                    url,
                };
            }
        };
        if !response.status().is_success() {
            return ServiceHealth::Unavailable {
                message: format!("Service not responding (HTTP {})", response.status().as_u16()),
                hint: start_hint(),
                url,
            };
        }
        let service = response.json::<Value>().await.unwrap_or(Value::Null);
        ServiceHealth::Available { service, url }
    }

    /// Asks the service for optimization suggestions. The response is passed
    /// through untouched.
    pub async fn optimize(&self, language: Language, code: &str, hotspots: &[Hotspot], use_ai: bool) -> Result<Value> {
        let body = json!({
            "language": language,
            "code": code,
            "hotspots": hotspots,
            "use_ai": use_ai,
        });
        debug!(%language, use_ai, hotspots = hotspots.len(), "requesting optimization");
        self.post_json("/optimize", &body).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        // a reachable service reports failed runs as non-2xx with an `error` field
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(Error::CollaboratorFailed {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| unavailable(format!("undecodable response: {e}")))
    }
}

fn unavailable(reason: String) -> Error {
    Error::CollaboratorUnavailable { service: SERVICE, reason }
}

fn start_hint() -> String {
    "Start with: cd python-service && python energy_service.py".to_string()
}
