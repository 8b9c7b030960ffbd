//! Gluon conformance suite runner CLI.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use gluon::{
    loader, schema::EmptySchemaRegistry, CheckStatus, SchemaRegistry, SimulatedAdapter,
    StaticSchemaRegistry, StepStatus, SuiteResult, SuiteRunner, TestSequence, Value,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Gluon - YAML-based device conformance test runner.
#[derive(Parser, Debug)]
#[command(name = "gluon", version, about)]
struct Cli {
    /// Suite file or directory path.
    #[arg(short = 'p', long = "path", default_value = ".")]
    suite_path: String,

    /// Filter suites by name (partial match).
    #[arg(short = 'f', long = "filter")]
    suite_filter: Option<String>,

    /// Enable verbose logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Schema definition file mapping clusters to field types.
    #[arg(short = 's', long = "schema")]
    schema_path: Option<String>,

    /// Keep running later steps after a step fails.
    #[arg(long = "continue-on-failure")]
    continue_on_failure: bool,

    /// Directory to save result report files.
    #[arg(short = 'r', long = "report-dir")]
    report_dir: Option<String>,

    /// Report output format.
    #[arg(long = "report-format", default_value = "json")]
    report_format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum ReportFormat {
    Json,
    Yaml,
    Text,
}

fn init_tracing(verbose: bool) {
    if std::env::var_os("RUST_LOG").is_none() {
        let level = if verbose { "debug" } else { "info" };
        std::env::set_var("RUST_LOG", level);
    }

    if tracing::dispatcher::has_been_set() {
        return;
    }

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

fn load_schema(path: Option<&str>) -> Result<Box<dyn SchemaRegistry>> {
    let Some(path) = path else {
        return Ok(Box::new(EmptySchemaRegistry));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {path}"))?;
    let doc: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse schema file: {path}"))?;
    Ok(Box::new(StaticSchemaRegistry::from_value(&doc)))
}

fn print_suite_result(result: &SuiteResult) {
    let status = if result.success {
        "\x1b[32mPASS\x1b[0m"
    } else {
        "\x1b[31mFAIL\x1b[0m"
    };
    info!(
        "{} suite: {} ({} ms)",
        status, result.name, result.duration_ms
    );

    for (i, step) in result.steps.iter().enumerate() {
        let marker = match step.status {
            StepStatus::Passed => "\x1b[32m✓\x1b[0m",
            StepStatus::Failed => "\x1b[31m✗\x1b[0m",
            StepStatus::Skipped => "\x1b[33m-\x1b[0m",
        };
        info!(
            "  {}. {} {} ({} ms)",
            i + 1,
            marker,
            step.label,
            step.duration_ms
        );

        for entry in &step.entries {
            if entry.status == CheckStatus::Error {
                error!("     \x1b[31m{}: {}\x1b[0m", entry.category, entry.message);
            }
        }
    }
}

fn save_report(result: &SuiteResult, report_dir: &Path, format: ReportFormat) -> Result<PathBuf> {
    if !report_dir.exists() {
        fs::create_dir_all(report_dir)?;
    }

    let timestamp = Utc::now().timestamp();
    let sanitized_name = result.name.replace([' ', '/'], "_");

    let (filename, content) = match format {
        ReportFormat::Json => {
            let filename = format!("{sanitized_name}-{timestamp}.json");
            let content = serde_json::to_string_pretty(result)?;
            (filename, content)
        }
        ReportFormat::Yaml => {
            let filename = format!("{sanitized_name}-{timestamp}.yaml");
            let content = serde_yaml::to_string(result)?;
            (filename, content)
        }
        ReportFormat::Text => {
            let filename = format!("{sanitized_name}-{timestamp}.txt");
            let mut content = String::new();
            content.push_str(&format!("Suite result: {}\n", result.name));
            content.push_str(&format!(
                "Status: {}\n",
                if result.success { "PASS" } else { "FAIL" }
            ));
            content.push_str(&format!("Duration: {} ms\n\n", result.duration_ms));
            content.push_str("Steps:\n");
            for (i, step) in result.steps.iter().enumerate() {
                let status = match step.status {
                    StepStatus::Passed => "PASS",
                    StepStatus::Failed => "FAIL",
                    StepStatus::Skipped => "SKIP",
                };
                content.push_str(&format!("  {}. {} ({})\n", i + 1, step.label, status));
                for entry in &step.entries {
                    if entry.status == CheckStatus::Error {
                        content.push_str(&format!(
                            "     {}: {}\n",
                            entry.category, entry.message
                        ));
                    }
                }
                content.push_str(&format!("     Duration: {} ms\n", step.duration_ms));
            }
            (filename, content)
        }
    };

    let file_path = report_dir.join(filename);
    let mut file = File::create(&file_path)?;
    file.write_all(content.as_bytes())?;

    Ok(file_path)
}

async fn run_all_suites(
    suites: Vec<TestSequence>,
    continue_on_failure: bool,
    report_dir: Option<&Path>,
    report_format: ReportFormat,
) -> Result<bool> {
    let runner = SuiteRunner::new(Arc::new(SimulatedAdapter))
        .with_default_pseudo_clusters()
        .continue_on_failure(continue_on_failure);

    let mut all_success = true;
    let mut passed = 0;
    let mut failed = 0;
    let total_start = Instant::now();
    let total = suites.len();

    info!("Running {} suite(s)...", total);

    for (idx, suite) in suites.iter().enumerate() {
        info!("Suite {}/{}: {}", idx + 1, total, suite.name);
        match runner.run(suite).await {
            Ok(result) => {
                print_suite_result(&result);

                if let Some(dir) = report_dir {
                    match save_report(&result, dir, report_format) {
                        Ok(path) => info!("Report saved: {}", path.display()),
                        Err(e) => error!("Failed to save report: {}", e),
                    }
                }

                if result.success {
                    passed += 1;
                } else {
                    all_success = false;
                    failed += 1;
                }
            }
            Err(e) => {
                error!("\x1b[31mSuite execution error: {} - {}\x1b[0m", suite.name, e);
                all_success = false;
                failed += 1;
            }
        }
    }

    let total_duration = total_start.elapsed().as_millis();
    info!(
        "Summary:\n  Total: {}\n  \x1b[32mPassed: {}\x1b[0m\n  \x1b[31mFailed: {}\x1b[0m\n  Duration: {} ms",
        passed + failed,
        passed,
        failed,
        total_duration
    );

    Ok(all_success)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.verbose);

    let schema = load_schema(args.schema_path.as_deref())?;
    let mut suites = loader::load_suites(Path::new(&args.suite_path), schema.as_ref())?;

    if let Some(filter) = &args.suite_filter {
        let filter = filter.to_lowercase();
        suites.retain(|s| s.name.to_lowercase().contains(&filter));
        if suites.is_empty() {
            anyhow::bail!("No suites matching the filter were found");
        }
    }

    let report_dir = args.report_dir.map(PathBuf::from);

    let success = run_all_suites(
        suites,
        args.continue_on_failure,
        report_dir.as_deref(),
        args.report_format,
    )
    .await?;

    if !success {
        exit(1);
    }

    Ok(())
}
