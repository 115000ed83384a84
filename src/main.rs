use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use energy_scanline::config::{self, EnvOverrides, Settings};
use energy_scanline::error::{Error, ErrorBody, Result};
use energy_scanline::reporters::{json, terminal};
use energy_scanline::service::{EnergyService, RunRequest, ScanRequest};
use energy_scanline::types::{EnergyAnalysis, Language, ProviderKind, RunResponse, ScanReport};

#[derive(Parser, Debug)]
#[command(
    name = "energy-scanline",
    about = "⚡ Find energy hotspots in code and run it on remote compilers",
    version,
    long_about = "Scans JavaScript, Python and C++ sources for energy-hungry patterns\n\
                  (nested loops, recursion, I/O in loops, wasteful allocations) and\n\
                  scores each file. Can also run code on Piston, Judge0 or JDoodle,\n\
                  falling back to Piston when the chosen provider fails."
)]
struct Cli {
    /// Config file (default: <config dir>/energy-scanline/config.yml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format: terminal, json
    #[arg(long, global = true, value_parser = ["terminal", "json"])]
    format: Option<String>,

    /// Write JSON output (or the generated config) to this file
    #[arg(long, global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Statically score source files for energy hotspots
    Scan {
        #[arg(value_name = "FILES", required_unless_present = "request")]
        files: Vec<PathBuf>,

        /// Override language detection (javascript, python, cpp)
        #[arg(long)]
        language: Option<String>,

        /// Also measure real energy via the measurement service
        #[arg(long)]
        measure: bool,

        /// Read a {language, code} JSON request instead of files
        #[arg(long, value_name = "REQ.json", conflicts_with = "files")]
        request: Option<PathBuf>,
    },

    /// Run a program on a remote execution provider
    Run {
        #[arg(value_name = "FILE", required_unless_present = "request")]
        file: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,

        #[command(flatten)]
        input: StdinArgs,

        /// piston, judge0 or jdoodle
        #[arg(long, value_parser = parse_provider)]
        provider: Option<ProviderKind>,

        /// Read a {language, code, stdin?} JSON request instead of a file
        #[arg(long, value_name = "REQ.json", conflicts_with = "file")]
        request: Option<PathBuf>,
    },

    /// Measure real energy use via the measurement service
    Measure {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        language: Option<String>,

        #[command(flatten)]
        input: StdinArgs,
    },

    /// Ask the optimization service for a rewrite of the hotspots
    Optimize {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        use_ai: bool,
    },

    /// Show the analyzer model, providers and measurement service health
    Status,

    /// Print an annotated config template (or write it with --output)
    GenerateConfig,
}

#[derive(clap::Args, Debug)]
struct StdinArgs {
    /// Text fed to the program's standard input
    #[arg(long, conflicts_with = "stdin_file")]
    stdin: Option<String>,

    /// File fed to the program's standard input
    #[arg(long, value_name = "FILE")]
    stdin_file: Option<PathBuf>,
}

fn parse_provider(s: &str) -> std::result::Result<ProviderKind, String> {
    s.parse()
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "energy_scanline=debug" } else { "energy_scanline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenerateConfig = cli.command {
        return match config::print_template(cli.output.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&Error::Config(e), cli.format.as_deref() == Some("json"), false),
        };
    }

    let cfg = match config::load_or_default(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => return fail(&Error::Config(e), cli.format.as_deref() == Some("json"), false),
    };

    let json_mode = cli.format.as_deref().or(cfg.format.as_deref()) == Some("json");
    let settings = Settings::resolve(&cfg, EnvOverrides::from_env());
    let development = settings.development;
    debug!(provider = %settings.provider, measurement = %settings.measurement_url, "settings resolved");

    let ctx = Context {
        json_mode,
        output: cli.output.clone(),
    };
    match dispatch(cli.command, settings, &ctx).await {
        Ok(code) => code,
        Err(e) => fail(&e, json_mode, development),
    }
}

struct Context {
    json_mode: bool,
    output: Option<PathBuf>,
}

impl Context {
    fn emit_json<T: serde::Serialize + ?Sized>(&self, body: &T) -> Result<()> {
        json::report_json(body, self.output.as_deref()).map_err(|e| Error::Io(std::io::Error::other(e)))
    }

    fn spinner(&self, msg: &str) -> Option<ProgressBar> {
        if self.json_mode {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    }
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

/// Prints `err` in the active format and maps it to an exit code:
/// 2 for validation failures, 1 otherwise.
fn fail(err: &Error, json_mode: bool, development: bool) -> ExitCode {
    if json_mode {
        let body = ErrorBody::from_error(err, development);
        match serde_json::to_string_pretty(&body) {
            Ok(s) => println!("{s}"),
            Err(_) => terminal::report_error(err),
        }
    } else {
        terminal::report_error(err);
    }
    if err.is_validation() { ExitCode::from(2) } else { ExitCode::FAILURE }
}

async fn dispatch(command: Command, settings: Settings, ctx: &Context) -> Result<ExitCode> {
    let max_chars = settings.max_code_chars;
    let service = EnergyService::new(settings)?;

    match command {
        Command::Scan { files, language, measure, request } => {
            if let Some(req_path) = request {
                let req = ScanRequest::from_value(&read_request(&req_path)?)?;
                let pb = if measure { ctx.spinner("Measuring energy...") } else { None };
                let report = service.scan_report(&req_path.display().to_string(), &req, measure).await;
                finish(pb);
                emit_reports(ctx, &[report])?;
                return Ok(ExitCode::SUCCESS);
            }
            scan_files(&service, ctx, &files, language.as_deref(), measure).await
        }

        Command::Run { file, language, input, provider, request } => {
            let (label, req) = match (request, file) {
                (Some(req_path), _) => (
                    req_path.display().to_string(),
                    RunRequest::from_value(&read_request(&req_path)?, max_chars)?,
                ),
                (None, Some(path)) => {
                    let lang = detect_language(&path, language.as_deref())?;
                    let req = RunRequest::new(&lang, read_source(&path)?, input.read()?, max_chars)?;
                    (path.display().to_string(), req)
                }
                (None, None) => return Err(Error::InvalidRequest("a FILE or --request is required".to_string())),
            };

            let pb = ctx.spinner(&format!("Running {label}..."));
            let outcome = service.run(&req, provider).await;
            finish(pb);

            let fell_back = outcome.fell_back;
            let response = RunResponse::from(outcome);
            if ctx.json_mode {
                ctx.emit_json(&response)?;
            } else {
                terminal::report_run(&label, &response, fell_back);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Measure { file, language, input } => {
            let lang = detect_language(&file, language.as_deref())?;
            let req = RunRequest::new(&lang, read_source(&file)?, input.read()?, max_chars)?;

            let pb = ctx.spinner("Measuring energy...");
            let measured = service.measure(&req).await;
            finish(pb);

            let measurement = measured?;
            if ctx.json_mode {
                ctx.emit_json(&measurement)?;
            } else {
                println!();
                terminal::report_measurement(&measurement);
                println!();
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Optimize { file, language, use_ai } => {
            let lang = detect_language(&file, language.as_deref())?;
            let req = ScanRequest::new(&lang, read_source(&file)?)?;

            let pb = ctx.spinner("Requesting optimization...");
            let optimized = service.optimize(&req, use_ai).await;
            finish(pb);

            let value = optimized?;
            if ctx.json_mode {
                ctx.emit_json(&value)?;
            } else {
                terminal::report_optimization(&value);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Status => {
            let status = service.status();
            let pb = ctx.spinner("Checking measurement service...");
            let health = service.measurement_health().await;
            finish(pb);

            if ctx.json_mode {
                let body = serde_json::json!({ "analyzer": status, "measurement": health });
                ctx.emit_json(&body)?;
            } else {
                terminal::report_status(&status, &health);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::GenerateConfig => Ok(ExitCode::SUCCESS),
    }
}

// ── Scanning ───────────────────────────────────────────────────────────────────

async fn scan_files(
    service:  &EnergyService,
    ctx:      &Context,
    files:    &[PathBuf],
    language: Option<&str>,
    measure:  bool,
) -> Result<ExitCode> {
    // reading and scanning are CPU-bound and independent per file
    let scanned: Vec<(String, Result<(ScanRequest, EnergyAnalysis)>)> = files
        .par_iter()
        .map(|path| {
            let label = path.display().to_string();
            let result = detect_language(path, language)
                .and_then(|lang| ScanRequest::new(&lang, read_source(path)?))
                .map(|req| {
                    let analysis = service.analyze(&req);
                    (req, analysis)
                });
            (label, result)
        })
        .collect();

    let mut reports: Vec<ScanReport> = Vec::with_capacity(scanned.len());
    let mut exit = ExitCode::SUCCESS;
    let pb = if measure { ctx.spinner("Measuring energy...") } else { None };
    for (label, result) in scanned {
        match result {
            Ok((req, analysis)) => reports.push(service.report_with(&label, &req, analysis, measure).await),
            Err(e) => {
                if let Some(pb) = &pb {
                    pb.suspend(|| eprintln!("Error scanning {label}: {e}"));
                } else {
                    eprintln!("Error scanning {label}: {e}");
                }
                exit = if e.is_validation() { ExitCode::from(2) } else { ExitCode::FAILURE };
            }
        }
    }
    finish(pb);

    if !reports.is_empty() {
        emit_reports(ctx, &reports)?;
    }
    Ok(exit)
}

fn emit_reports(ctx: &Context, reports: &[ScanReport]) -> Result<()> {
    if ctx.json_mode {
        match reports {
            [single] => ctx.emit_json(single),
            many => ctx.emit_json(many),
        }
    } else {
        reports.iter().for_each(terminal::report_scan);
        Ok(())
    }
}

// ── Input helpers ──────────────────────────────────────────────────────────────

impl StdinArgs {
    fn read(&self) -> Result<Option<String>> {
        match (&self.stdin, &self.stdin_file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(path)) => read_source(path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidRequest(format!("Cannot read '{}': {e}", path.display())))
}

fn read_request(path: &Path) -> Result<serde_json::Value> {
    let text = read_source(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::InvalidRequest(format!("Invalid request JSON in '{}': {e}", path.display())))
}

/// `--language` if given, else the file extension.
fn detect_language(path: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(lang) = explicit {
        return Ok(lang.to_string());
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Language::from_extension)
        .map(|l| l.as_str().to_string())
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "Cannot detect the language of '{}'. Pass --language ({})",
                path.display(),
                Language::supported_names().join(", ")
            ))
        })
}
