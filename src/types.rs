use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::measurement::Measurement;

// ─── Languages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::Python, Language::Cpp];

    /// Machine name used in requests and in the rule catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python     => "python",
            Language::Cpp        => "cpp",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::Python     => "Python",
            Language::Cpp        => "C++",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Language::JavaScript => ".js",
            Language::Python     => ".py",
            Language::Cpp        => ".cpp",
        }
    }

    /// Detects the language from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs"                   => Some(Language::JavaScript),
            "py"                                   => Some(Language::Python),
            "cpp" | "cc" | "cxx" | "hpp" | "h"     => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn supported_names() -> Vec<&'static str> {
        Language::ALL.iter().map(|l| l.as_str()).collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("Unsupported language: {s}"))
    }
}

// ─── Static Analysis ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotType {
    Loop,
    Recursion,
    Io,
    Memory,
    Algorithm,
}

impl HotspotType {
    pub const ALL: [HotspotType; 5] = [
        HotspotType::Loop,
        HotspotType::Recursion,
        HotspotType::Io,
        HotspotType::Memory,
        HotspotType::Algorithm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HotspotType::Loop      => "loop",
            HotspotType::Recursion => "recursion",
            HotspotType::Io        => "io",
            HotspotType::Memory    => "memory",
            HotspotType::Algorithm => "algorithm",
        }
    }
}

impl fmt::Display for HotspotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line range flagged by a rule, with its severity and estimated cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    #[serde(rename = "startLine")]
    pub start_line: usize,
    #[serde(rename = "endLine")]
    pub end_line: usize,
    pub score: f64,
    #[serde(rename = "estimate_mJ")]
    pub estimate_mj: f64,
    pub suggestion: String,
    #[serde(rename = "type")]
    pub kind: HotspotType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAnalysis {
    #[serde(rename = "fileScore")]
    pub file_score: f64,
    pub hotspots: Vec<Hotspot>,
    #[serde(rename = "totalEstimate_mJ")]
    pub total_estimate_mj: f64,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
    Efficient,
    Moderate,
    Wasteful,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Efficient => write!(f, "EFFICIENT"),
            Rating::Moderate  => write!(f, "MODERATE"),
            Rating::Wasteful  => write!(f, "WASTEFUL"),
        }
    }
}

// ─── Remote Execution ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Primary: needs no credentials.
    Piston,
    Judge0,
    Jdoodle,
}

impl ProviderKind {
    pub const PRIMARY: ProviderKind = ProviderKind::Piston;

    pub fn is_primary(&self) -> bool {
        *self == ProviderKind::PRIMARY
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Piston  => "piston",
            ProviderKind::Judge0  => "judge0",
            ProviderKind::Jdoodle => "jdoodle",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "piston"  => Ok(ProviderKind::Piston),
            "judge0"  => Ok(ProviderKind::Judge0),
            "jdoodle" => Ok(ProviderKind::Jdoodle),
            other => Err(format!(
                "Unknown provider \"{other}\". Expected one of: \"piston\", \"judge0\", \"jdoodle\""
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub status: ExecStatus,
    /// Seconds.
    #[serde(rename = "executionTime")]
    pub execution_time: f64,
    /// Kilobytes, when the provider reports it.
    #[serde(rename = "memoryUsed", skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        self.status == ExecStatus::Error
    }
}

/// Response body for a run request.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub output: String,
    #[serde(rename = "executionTime")]
    pub execution_time: f64,
    #[serde(rename = "memoryUsed", skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
    pub status: ExecStatus,
    pub compiler: ProviderKind,
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub file: String,
    pub language: Language,
    pub model: String,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub meta: ReportMeta,
    #[serde(flatten)]
    pub analysis: EnergyAnalysis,
    /// Absent when measurement was not requested or the service was down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
}
