use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::jdoodle::JdoodleCredentials;
use crate::providers::{jdoodle, judge0, piston};
use crate::types::ProviderKind;

pub const DEFAULT_TIMEOUT_SECS:   u64   = 30;
pub const DEFAULT_RUN_TIMEOUT_MS: u64   = 10_000;
pub const DEFAULT_MAX_CODE_CHARS: usize = 100_000;
pub const DEFAULT_MEASUREMENT_URL: &str = "http://localhost:5001";

/// All settings that can be placed in a config.yml file.
/// Every field is optional: omitted fields fall back to the environment or
/// the built-in defaults. CLI flags always take precedence over values set here.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyConfig {
    // Execution
    pub provider: Option<String>,
    pub timeout_secs: Option<u64>,
    pub run_timeout_ms: Option<u64>,
    pub max_code_chars: Option<usize>,

    // Endpoints
    pub piston_url: Option<String>,
    pub judge0_url: Option<String>,
    pub jdoodle_url: Option<String>,
    pub measurement_url: Option<String>,

    // Output
    pub format: Option<String>,
    pub development: Option<bool>,
}

impl EnergyConfig {
    /// Validates semantic constraints that serde cannot enforce.
    ///
    /// Returns a human-readable error describing exactly what is wrong and what
    /// values are accepted. Called automatically by [`load_config`].
    pub fn validate(&self) -> Result<(), String> {
        if let Some(p) = &self.provider {
            p.parse::<ProviderKind>()
                .map_err(|e| format!("Invalid 'provider' value: {e}"))?;
        }

        if let Some(fmt) = &self.format {
            match fmt.as_str() {
                "terminal" | "json" => {}
                other => {
                    return Err(format!(
                        "Invalid 'format' value: \"{other}\". \
                         Expected one of: \"terminal\", \"json\""
                    ))
                }
            }
        }

        if let Some(0) = self.timeout_secs {
            return Err("Invalid 'timeout_secs' value: 0. Must be 1 or greater".to_string());
        }
        if let Some(0) = self.run_timeout_ms {
            return Err("Invalid 'run_timeout_ms' value: 0. Must be 1 or greater".to_string());
        }
        // the remote run limit is part of the overall request budget
        if let (Some(run_ms), Some(secs)) = (self.run_timeout_ms, self.timeout_secs) {
            if run_ms > secs * 1000 {
                return Err(format!(
                    "Invalid 'run_timeout_ms' value: {run_ms}. \
                     Must not exceed timeout_secs ({secs}s = {}ms)",
                    secs * 1000
                ));
            }
        }
        if let Some(0) = self.max_code_chars {
            return Err("Invalid 'max_code_chars' value: 0. Must be 1 or greater".to_string());
        }

        let urls: &[(&str, &Option<String>)] = &[
            ("piston_url", &self.piston_url),
            ("judge0_url", &self.judge0_url),
            ("jdoodle_url", &self.jdoodle_url),
            ("measurement_url", &self.measurement_url),
        ];
        for (name, val) in urls {
            if let Some(url) = val {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!(
                        "Invalid '{name}' value: \"{url}\". Must start with http:// or https://"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Values read from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub judge0_api_key: Option<String>,
    pub judge0_api_url: Option<String>,
    /// Set whenever `JDOODLE_CLIENT_ID` is, even without a secret.
    pub jdoodle_client_id: Option<String>,
    pub jdoodle: Option<JdoodleCredentials>,
    pub measurement_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let jdoodle_client_id = get("JDOODLE_CLIENT_ID");
        let jdoodle = match (jdoodle_client_id.clone(), get("JDOODLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(JdoodleCredentials { client_id, client_secret }),
            _ => None,
        };
        EnvOverrides {
            judge0_api_key: get("JUDGE0_API_KEY"),
            judge0_api_url: get("JUDGE0_API_URL"),
            jdoodle_client_id,
            jdoodle,
            measurement_url: get("NEXT_PUBLIC_PYTHON_SERVICE_URL").or_else(|| get("PYTHON_SERVICE_URL")),
        }
    }

    /// judge0 when its key is present, else jdoodle when its client id is,
    /// else the primary. A jdoodle pick without a secret fails its call and
    /// falls back to the primary.
    pub fn auto_provider(&self) -> ProviderKind {
        if self.judge0_api_key.is_some() {
            ProviderKind::Judge0
        } else if self.jdoodle_client_id.is_some() {
            ProviderKind::Jdoodle
        } else {
            ProviderKind::PRIMARY
        }
    }
}

/// Fully resolved settings: CLI > config file > environment > defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub timeout: Duration,
    pub run_timeout_ms: u64,
    pub max_code_chars: usize,
    pub piston_url: String,
    pub judge0_url: String,
    pub jdoodle_url: String,
    pub measurement_url: String,
    pub judge0_api_key: Option<String>,
    pub jdoodle: Option<JdoodleCredentials>,
    pub development: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::resolve(&EnergyConfig::default(), EnvOverrides::default())
    }
}

impl Settings {
    /// Merges a validated config file with the environment.
    pub fn resolve(cfg: &EnergyConfig, env: EnvOverrides) -> Self {
        let provider = cfg
            .provider
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| env.auto_provider());

        Settings {
            provider,
            timeout: Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            run_timeout_ms: cfg.run_timeout_ms.unwrap_or(DEFAULT_RUN_TIMEOUT_MS),
            max_code_chars: cfg.max_code_chars.unwrap_or(DEFAULT_MAX_CODE_CHARS),
            piston_url: cfg.piston_url.clone().unwrap_or_else(|| piston::DEFAULT_URL.to_string()),
            judge0_url: cfg
                .judge0_url
                .clone()
                .or(env.judge0_api_url)
                .unwrap_or_else(|| judge0::DEFAULT_URL.to_string()),
            jdoodle_url: cfg.jdoodle_url.clone().unwrap_or_else(|| jdoodle::DEFAULT_URL.to_string()),
            measurement_url: cfg
                .measurement_url
                .clone()
                .or(env.measurement_url)
                .unwrap_or_else(|| DEFAULT_MEASUREMENT_URL.to_string()),
            judge0_api_key: env.judge0_api_key,
            jdoodle: env.jdoodle,
            development: cfg.development.unwrap_or(false),
        }
    }

    /// Whether `kind` has the credentials it needs.
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Piston  => true,
            ProviderKind::Judge0  => self.judge0_api_key.is_some(),
            ProviderKind::Jdoodle => self.jdoodle.is_some(),
        }
    }
}

/// `<config dir>/energy-scanline/config.yml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("energy-scanline").join("config.yml"))
}

/// Reads, parses, and validates a YAML config file from `path`.
pub fn load_config(path: &Path) -> Result<EnergyConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config file '{}': {e}", path.display()))?;
    let cfg: EnergyConfig = serde_yaml::from_str(&content)
        .map_err(|e| format!("Invalid config file '{}': {e}", path.display()))?;
    cfg.validate()
        .map_err(|e| format!("Config file '{}': {e}", path.display()))?;
    Ok(cfg)
}

/// Loads `explicit` if given; otherwise the default location if a file
/// exists there; otherwise an empty config.
pub fn load_or_default(explicit: Option<&Path>) -> Result<EnergyConfig, String> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => load_config(&path),
        _ => Ok(EnergyConfig::default()),
    }
}

/// Annotated YAML template, printed by `generate-config`.
pub static TEMPLATE: &str = r#"# energy-scanline configuration file
# Generated by: energy-scanline generate-config
#
# All settings are optional. Omit any field to use the built-in default.
# CLI flags always take precedence over values in this file.
# Save this file as ~/.config/energy-scanline/config.yml, or pass it with:
#
#   energy-scanline --config config.yml run main.py
#
# Credentials are never read from this file. Set them in the environment:
#   JUDGE0_API_KEY, JUDGE0_API_URL, JDOODLE_CLIENT_ID, JDOODLE_CLIENT_SECRET

# ── Execution ──────────────────────────────────────────────────────────────────

# Execution provider: piston, judge0, jdoodle.
# When omitted: judge0 if JUDGE0_API_KEY is set, else jdoodle if
# JDOODLE_CLIENT_ID is set, else piston (free, no key required).
# A failing judge0/jdoodle run is retried once on piston.
# provider: "piston"

# Overall ceiling for one provider call, in seconds.
# timeout_secs: 30

# Run limit sent to piston, in milliseconds.
# run_timeout_ms: 10000

# Programs longer than this many characters are rejected before dispatch.
# max_code_chars: 100000

# ── Endpoints ──────────────────────────────────────────────────────────────────

# piston_url:      "https://emkc.org/api/v2/piston"
# judge0_url:      "https://judge0-ce.p.rapidapi.com"
# jdoodle_url:     "https://api.jdoodle.com/v1"

# Energy measurement service. Falls back to PYTHON_SERVICE_URL.
# measurement_url: "http://localhost:5001"

# ── Output ─────────────────────────────────────────────────────────────────────

# Output format: terminal, json
# format: "terminal"

# Include full error chains in JSON error bodies.
# development: false
"#;

/// Prints the config template to stdout, or writes it to `output_path` if given.
pub fn print_template(output_path: Option<&Path>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(path, TEMPLATE)
            .map_err(|e| format!("Cannot write config template to '{}': {e}", path.display())),
        None => {
            print!("{TEMPLATE}");
            Ok(())
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
