//! Request validation and the operations the CLI exposes

use serde::Serialize;
use serde_json::Value;

use crate::analyzers::rules::CATALOG_VERSION;
use crate::broker::{Broker, RunOutcome};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::measurement::{Measurement, MeasurementClient, ServiceHealth};
use crate::scoring;
use crate::types::*;

/// A validated scan request.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub language: Language,
    pub code: String,
}

/// A validated run request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub language: Language,
    pub code: String,
    pub stdin: Option<String>,
}

fn parse_language(language: &str) -> Result<Language> {
    language.parse().map_err(|_| Error::UnsupportedLanguage {
        language: language.to_string(),
        supported: Language::supported_names(),
    })
}

fn require_code(code: String) -> Result<String> {
    if code.is_empty() {
        return Err(Error::MissingCode);
    }
    Ok(code)
}

fn field_str(body: &Value, name: &str) -> Result<Option<String>> {
    match body.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::InvalidRequest(format!("'{name}' must be a string"))),
    }
}

fn language_field(body: &Value) -> Result<Language> {
    let language = field_str(body, "language")?
        .ok_or_else(|| Error::InvalidRequest("'language' is required".to_string()))?;
    parse_language(&language)
}

impl ScanRequest {
    pub fn new(language: &str, code: String) -> Result<Self> {
        Ok(ScanRequest {
            language: parse_language(language)?,
            code: require_code(code)?,
        })
    }

    /// Validates a `{language, code}` JSON body.
    pub fn from_value(body: &Value) -> Result<Self> {
        let language = language_field(body)?;
        let code = field_str(body, "code")?.ok_or(Error::MissingCode)?;
        Ok(ScanRequest { language, code: require_code(code)? })
    }
}

impl RunRequest {
    /// Rejects code longer than `max_chars` characters; it is never truncated.
    pub fn new(language: &str, code: String, stdin: Option<String>, max_chars: usize) -> Result<Self> {
        let language = parse_language(language)?;
        let code = require_code(code)?;
        let len = code.chars().count();
        if len > max_chars {
            return Err(Error::CodeTooLarge { len, limit: max_chars });
        }
        Ok(RunRequest { language, code, stdin })
    }

    /// Validates a `{language, code, stdin?}` JSON body.
    pub fn from_value(body: &Value, max_chars: usize) -> Result<Self> {
        let language = language_field(body)?;
        let code = field_str(body, "code")?.ok_or(Error::MissingCode)?;
        let stdin = field_str(body, "stdin")?;
        RunRequest::new(language.as_str(), code, stdin, max_chars)
    }
}

/// Body of the status command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: &'static str,
    pub model: &'static str,
    pub supported_languages: Vec<&'static str>,
    pub pattern_types: Vec<&'static str>,
    pub compiler: ProviderKind,
    pub configured_providers: Vec<ProviderKind>,
}

pub struct EnergyService {
    settings: Settings,
    broker: Broker,
    measurement: MeasurementClient,
}

impl EnergyService {
    pub fn new(settings: Settings) -> Result<Self> {
        let broker = Broker::from_settings(&settings)?;
        let measurement = MeasurementClient::new(&settings.measurement_url, settings.timeout)?;
        Ok(Self::with_parts(settings, broker, measurement))
    }

    pub fn with_parts(settings: Settings, broker: Broker, measurement: MeasurementClient) -> Self {
        Self { settings, broker, measurement }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn analyze(&self, req: &ScanRequest) -> EnergyAnalysis {
        scoring::analyze(req.language.as_str(), &req.code)
    }

    /// Static analysis plus, when asked, a measurement. A measurement service
    /// that is down leaves `measurement` empty instead of failing the scan.
    pub async fn scan_report(&self, file: &str, req: &ScanRequest, measure: bool) -> ScanReport {
        let analysis = self.analyze(req);
        self.report_with(file, req, analysis, measure).await
    }

    /// Builds a report around an analysis computed elsewhere.
    pub async fn report_with(&self, file: &str, req: &ScanRequest, analysis: EnergyAnalysis, measure: bool) -> ScanReport {
        let measurement = if measure {
            self.measurement.measure_or_absent(req.language, &req.code, None).await
        } else {
            None
        };
        ScanReport {
            meta: report_meta(file, req.language),
            analysis,
            measurement,
        }
    }

    pub async fn run(&self, req: &RunRequest, preferred: Option<ProviderKind>) -> RunOutcome {
        self.broker
            .run(req.language, &req.code, req.stdin.as_deref(), preferred)
            .await
    }

    pub async fn measure(&self, req: &RunRequest) -> Result<Measurement> {
        self.measurement
            .measure(req.language, &req.code, req.stdin.as_deref())
            .await
    }

    /// Sends the code and its top hotspots to the optimization service.
    pub async fn optimize(&self, req: &ScanRequest, use_ai: bool) -> Result<Value> {
        let analysis = self.analyze(req);
        self.measurement
            .optimize(req.language, &req.code, &analysis.hotspots, use_ai)
            .await
    }

    pub fn status(&self) -> StatusBody {
        StatusBody {
            status: "ok",
            model: CATALOG_VERSION,
            supported_languages: Language::supported_names(),
            pattern_types: HotspotType::ALL.iter().map(|t| t.as_str()).collect(),
            compiler: self.broker.default_provider(),
            configured_providers: [ProviderKind::Piston, ProviderKind::Judge0, ProviderKind::Jdoodle]
                .into_iter()
                .filter(|k| self.settings.is_configured(*k))
                .collect(),
        }
    }

    pub async fn measurement_health(&self) -> ServiceHealth {
        self.measurement.health().await
    }
}

impl From<RunOutcome> for RunResponse {
    fn from(outcome: RunOutcome) -> Self {
        RunResponse {
            output: outcome.result.output,
            execution_time: outcome.result.execution_time,
            memory_used: outcome.result.memory_used,
            status: outcome.result.status,
            compiler: outcome.provider,
        }
    }
}

pub fn report_meta(file: &str, language: Language) -> ReportMeta {
    ReportMeta {
        file: file.to_string(),
        language,
        model: CATALOG_VERSION.to_string(),
        analyzed_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn service() -> EnergyService {
        let settings = Settings {
            measurement_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..Settings::default()
        };
        EnergyService::new(settings).unwrap()
    }

    #[test]
    fn test_unsupported_language_lists_supported() {
        let err = ScanRequest::from_value(&json!({ "language": "cobol", "code": "x" })).unwrap_err();
        match &err {
            Error::UnsupportedLanguage { language, supported } => {
                assert_eq!(language, "cobol");
                assert_eq!(supported, &vec!["javascript", "python", "cpp"]);
            }
            other => panic!("expected UnsupportedLanguage, got {other:?}"),
        }
        assert!(err.is_validation());
    }

    #[test]
    fn test_code_must_be_present_string_and_non_empty() {
        let missing = ScanRequest::from_value(&json!({ "language": "python" })).unwrap_err();
        assert!(matches!(missing, Error::MissingCode));

        let wrong_type = ScanRequest::from_value(&json!({ "language": "python", "code": 42 })).unwrap_err();
        assert!(matches!(wrong_type, Error::InvalidRequest(_)), "got {wrong_type:?}");

        let empty = ScanRequest::from_value(&json!({ "language": "python", "code": "" })).unwrap_err();
        assert!(matches!(empty, Error::MissingCode));
    }

    #[test]
    fn test_missing_language_rejected() {
        let err = ScanRequest::from_value(&json!({ "code": "x" })).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn test_run_request_size_cap() {
        let at_limit = "a".repeat(10);
        assert!(RunRequest::new("python", at_limit, None, 10).is_ok());

        let err = RunRequest::new("python", "a".repeat(11), None, 10).unwrap_err();
        assert!(matches!(err, Error::CodeTooLarge { len: 11, limit: 10 }), "got {err:?}");
    }

    #[test]
    fn test_run_request_counts_characters_not_bytes() {
        // four chars, twelve bytes
        assert!(RunRequest::new("python", "ééé€".to_string(), None, 4).is_ok());
    }

    #[test]
    fn test_run_request_stdin_must_be_string() {
        let ok = RunRequest::from_value(
            &json!({ "language": "cpp", "code": "int main(){}", "stdin": "1 2" }),
            100,
        )
        .unwrap();
        assert_eq!(ok.stdin.as_deref(), Some("1 2"));

        let err = RunRequest::from_value(
            &json!({ "language": "cpp", "code": "int main(){}", "stdin": [1] }),
            100,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_status_body() {
        let body = serde_json::to_value(service().status()).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "static-pattern-analyzer-v1");
        assert_eq!(body["supportedLanguages"], json!(["javascript", "python", "cpp"]));
        assert_eq!(body["patternTypes"], json!(["loop", "recursion", "io", "memory", "algorithm"]));
        assert_eq!(body["compiler"], "piston");
        assert_eq!(body["configuredProviders"], json!(["piston"]));
    }

    #[tokio::test]
    async fn test_scan_report_survives_measurement_outage() {
        let req = ScanRequest::new("javascript", "for (a) {\n  for (b) {}\n}".to_string()).unwrap();
        let report = service().scan_report("dup.js", &req, true).await;
        assert!(report.measurement.is_none(), "Unreachable service means no measurement");
        assert!(!report.analysis.hotspots.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["meta"]["file"], "dup.js");
        assert!(json.get("fileScore").is_some(), "analysis fields are flattened");
        assert!(json.get("measurement").is_none());
    }

    #[test]
    fn test_run_response_names_producing_provider() {
        let outcome = RunOutcome {
            result: ExecutionResult {
                output: "hi".to_string(),
                status: ExecStatus::Success,
                execution_time: 0.5,
                memory_used: None,
            },
            provider: ProviderKind::Piston,
            fell_back: true,
        };
        let body = serde_json::to_value(RunResponse::from(outcome)).unwrap();
        assert_eq!(body["compiler"], "piston");
        assert_eq!(body["executionTime"], 0.5);
        assert!(body.get("memoryUsed").is_none());
    }
}
