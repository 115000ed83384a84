use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::Value;

use crate::error::Error;
use crate::measurement::{Measurement, ServiceHealth};
use crate::scoring::get_rating;
use crate::service::StatusBody;
use crate::types::{ExecStatus, Hotspot, HotspotType, Rating, RunResponse, ScanReport};

pub fn report_scan(report: &ScanReport) {
    let analysis = &report.analysis;
    println!();
    println!(
        "{} {} ({}, {})",
        "⚡ energy-scanline".green().bold(),
        report.meta.file.cyan(),
        report.meta.language.label().bright_black(),
        report.meta.model.bright_black(),
    );
    println!(
        "   File score {}  {}   Estimated {}",
        color_score(analysis.file_score),
        rating_label(get_rating(analysis.file_score)),
        format!("{:.2} mJ", analysis.total_estimate_mj).bold(),
    );
    println!();

    if analysis.hotspots.is_empty() {
        println!("{}", "  No energy hotspots found.".green());
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["RANK", "LINES", "TYPE", "SCORE", "EST. mJ", "SUGGESTION"]);

        for (i, h) in analysis.hotspots.iter().enumerate() {
            table.add_row(vec![
                format!("{:3}", i + 1),
                line_range(h),
                type_label(h.kind),
                severity(h.score),
                format!("{:.2}", h.estimate_mj),
                truncate(&h.suggestion, 60),
            ]);
        }
        println!("{table}");
    }

    if !analysis.suggestions.is_empty() {
        println!();
        println!("{}", "💡 Suggestions:".cyan());
        for s in &analysis.suggestions {
            println!("    {} {}", "•".white(), s);
        }
    }

    if let Some(m) = &report.measurement {
        println!();
        report_measurement(m);
    }
    println!();
}

pub fn report_run(file: &str, response: &RunResponse, fell_back: bool) {
    println!();
    let status = match response.status {
        ExecStatus::Success => "✓ success".green().bold(),
        ExecStatus::Error   => "✗ error".red().bold(),
    };
    println!(
        "{} {} via {}{}",
        status,
        file.cyan(),
        response.compiler.to_string().bold(),
        if fell_back { " (fallback)".yellow().to_string() } else { String::new() },
    );

    let mut stats = format!("{:.3}s", response.execution_time);
    if let Some(kb) = response.memory_used {
        stats.push_str(&format!(", {kb} KB"));
    }
    println!("   {}", stats.bright_black());
    println!();

    match response.status {
        ExecStatus::Success => println!("{}", response.output.trim_end()),
        ExecStatus::Error   => println!("{}", response.output.trim_end().red()),
    }
    println!();
}

pub fn report_measurement(m: &Measurement) {
    println!(
        "{} {}",
        "🔋 Measured energy".cyan().bold(),
        m.measurement_method.as_deref().unwrap_or("unknown method").bright_black(),
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["METRIC", "VALUE"]);
    table.add_row(vec!["status".to_string(), m.status.clone()]);
    table.add_row(vec!["time".to_string(), format!("{:.2} ms", m.execution_time_ms)]);
    table.add_row(vec!["energy".to_string(), format!("{:.2} mJ", m.energy.total_mj)]);
    table.add_row(vec!["energy (Wh)".to_string(), format!("{:.6}", m.energy.total_wh)]);
    table.add_row(vec!["CO₂".to_string(), format!("{:.6} g", m.energy.co2_emissions_g)]);
    for (name, how) in [
        ("cpu", &m.hardware.cpu_energy),
        ("gpu", &m.hardware.gpu_energy),
        ("ram", &m.hardware.ram_energy),
    ] {
        if !how.is_empty() {
            table.add_row(vec![name.to_string(), how.clone()]);
        }
    }
    println!("{table}");

    if let Some(err) = m.error.as_deref().filter(|e| !e.is_empty()) {
        println!("{}", err.trim_end().red());
    }
}

pub fn report_status(status: &StatusBody, health: &ServiceHealth) {
    println!();
    println!("{} {}", "⚡ energy-scanline".green().bold(), status.model.bright_black());
    println!("   languages:  {}", status.supported_languages.join(", "));
    println!("   patterns:   {}", status.pattern_types.join(", "));
    println!("   provider:   {}", status.compiler.to_string().bold());
    let configured: Vec<String> = status.configured_providers.iter().map(|p| p.to_string()).collect();
    println!("   configured: {}", configured.join(", "));
    match health {
        ServiceHealth::Available { url, .. } => {
            println!("   measurement: {} {}", "available".green(), url.bright_black());
        }
        ServiceHealth::Unavailable { message, hint, url } => {
            println!("   measurement: {} {} {}", "unavailable".yellow(), message, url.bright_black());
            println!("                {}", hint.bright_black());
        }
    }
    println!();
}

/// Optimization responses are opaque; show the common fields, else the raw JSON.
pub fn report_optimization(value: &Value) {
    println!();
    println!("{}", "🛠  Optimization".cyan().bold());
    let mut shown = false;
    for key in ["suggestions", "improvements"] {
        if let Some(items) = value.get(key).and_then(Value::as_array) {
            for item in items {
                let text = item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string());
                println!("    {} {}", "•".white(), text);
            }
            shown = true;
        }
    }
    if let Some(code) = value.get("optimized_code").and_then(Value::as_str) {
        println!();
        println!("{code}");
        shown = true;
    }
    if !shown {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
    }
    println!();
}

pub fn report_error(err: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let Error::UnsupportedLanguage { supported, .. } = err {
        eprintln!("       Supported languages: {}", supported.join(", "));
    }
    if let Some(hint) = err.hint() {
        eprintln!("       {}", hint.bright_black());
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn line_range(h: &Hotspot) -> String {
    if h.start_line == h.end_line {
        h.start_line.to_string()
    } else {
        format!("{}-{}", h.start_line, h.end_line)
    }
}

fn severity(score: f64) -> String {
    let text = format!("{score:.2}");
    if score >= 0.8 { text.red().bold().to_string() }
    else if score >= 0.6 { text.yellow().to_string() }
    else { text.white().to_string() }
}

fn color_score(file_score: f64) -> String {
    let text = format!("{file_score:.2}");
    match get_rating(file_score) {
        Rating::Efficient => text.green().bold().to_string(),
        Rating::Moderate  => text.yellow().bold().to_string(),
        Rating::Wasteful  => text.red().bold().to_string(),
    }
}

fn rating_label(rating: Rating) -> String {
    match rating {
        Rating::Efficient => "🟢 EFFICIENT".green().to_string(),
        Rating::Moderate  => "🟡 MODERATE".yellow().to_string(),
        Rating::Wasteful  => "🔴 WASTEFUL".red().to_string(),
    }
}

fn type_label(kind: HotspotType) -> String {
    match kind {
        HotspotType::Loop      => "loop".yellow().to_string(),
        HotspotType::Recursion => "recursion".magenta().to_string(),
        HotspotType::Io        => "io".blue().to_string(),
        HotspotType::Memory    => "memory".cyan().to_string(),
        HotspotType::Algorithm => "algorithm".red().to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max - 1).collect();
    format!("{head}…")
}
