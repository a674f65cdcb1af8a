use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgGroup, Parser};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use infoviz::config::Config;
use infoviz::pipeline::{AnalysisReport, Analyzer, DASHBOARD_KEY};
use infoviz::prompting::{ExtractionType, PromptTemplates};
use infoviz::visualization::HtmlRenderer;
use infoviz::{io, preprocess, progress, tokenizer};

/// InfoViz - structured summaries and visualization plans for Chinese text
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["text", "file", "payload"])))]
struct Args {
    /// Text to analyze
    #[arg(short, long)]
    text: Option<String>,

    /// Text file to analyze (plain or .gz)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Plan an externally supplied JSON payload instead of analyzing text
    #[arg(long)]
    payload: Option<PathBuf>,

    /// What the provider is asked to extract
    #[arg(short, long, default_value = "comprehensive", value_parser = parse_extraction_type)]
    extraction_type: ExtractionType,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider API key (overrides the config file and environment)
    #[arg(long)]
    api_key: Option<String>,

    /// Skip the text insight provider
    #[arg(long)]
    local_only: bool,

    /// Do not write the HTML dashboard
    #[arg(long)]
    no_html: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_extraction_type(value: &str) -> Result<ExtractionType, String> {
    ExtractionType::try_from(value)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn init_tokenizer(config: &Config) {
    match &config.analysis.user_dictionary {
        Some(path) => {
            if let Err(e) = tokenizer::initialize_with_dictionary(path) {
                warn!(path = %path.display(), error = %e, "user dictionary not loaded, using the bundled one");
                tokenizer::initialize();
            }
        }
        None => {
            tokenizer::initialize();
        }
    }
}

/// Build the analyzer for this run. Setup problems that do not stop the run are
/// returned so they can be recorded in the report.
fn build_analyzer(config: &Config, args: &Args) -> (Analyzer, Option<String>, Vec<String>) {
    let analyzer = Analyzer::new(config.summary_builder(), config.planner(), config.authenticity_checker())
        .with_extraction_type(args.extraction_type)
        .with_provider_timeout(Duration::from_secs(config.provider.timeout_secs));

    if args.local_only {
        info!("running local analysis only");
        return (analyzer, None, Vec::new());
    }

    let mut setup_errors = Vec::new();
    let templates = config.prompt_templates().unwrap_or_else(|e| {
        warn!(error = %e, "prompt templates not loaded, using the built-in ones");
        setup_errors.push(format!("提示词模板加载失败，已使用内置模板: {}", e));
        PromptTemplates::default()
    });
    let api_key = config.resolve_api_key(args.api_key.as_deref());
    match config.build_provider(api_key, templates) {
        Ok(model) => {
            let model_id = model.model_id().to_string();
            (analyzer.with_provider(Arc::new(model)), Some(model_id), setup_errors)
        }
        Err(e) => {
            warn!(error = %e, "provider unavailable, continuing local-only");
            (analyzer.with_provider_error(e), None, setup_errors)
        }
    }
}

/// Render the dashboard for `report` and record its path. Failures end up in `report.errors`.
fn write_dashboard(report: &mut AnalysisReport, output_dir: &Path) -> Option<PathBuf> {
    let outcome = HtmlRenderer::default().render_page(report.item_sets());
    report.errors.extend(outcome.errors.into_iter().map(|e| format!("渲染失败: {}", e)));

    match io::write_html(output_dir, &report.processing_time, &outcome.html) {
        Ok(path) => {
            report.record_artifact(DASHBOARD_KEY, path.clone());
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "dashboard not written");
            report.errors.push(format!("渲染失败: {}", e));
            None
        }
    }
}

fn run_payload(args: &Args, analyzer: &Analyzer, path: &Path, output_dir: &Path) -> Result<()> {
    let (plan, authenticity) = analyzer.plan_payload_file(path);
    let time = Local::now();

    let mut artifacts = vec![io::write_plan(output_dir, &time, &plan)?];
    if !args.no_html {
        let outcome = HtmlRenderer::default().render_page([("payload", plan.visualizations.as_slice())]);
        artifacts.push(io::write_html(output_dir, &time, &outcome.html)?);
    }

    println!("可视化项: {}", plan.total_items);
    if let Some(message) = plan.error() {
        println!("✗ {}", message);
    }
    for warning in &authenticity.warnings {
        println!("! {}", warning);
    }
    for path in artifacts {
        println!("✓ 已保存 {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_tokenizer(&config);

    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    debug!(output_dir = %output_dir.display(), "output directory ready");

    if let Some(payload) = &args.payload {
        let analyzer = Analyzer::new(config.summary_builder(), config.planner(), config.authenticity_checker());
        return run_payload(&args, &analyzer, payload, &output_dir);
    }

    let (analyzer, model_id, setup_errors) = build_analyzer(&config, &args);
    let spinner_chars = args.text.as_ref().map(|text| text.chars().count());
    let spinner = progress::create_analysis_spinner(model_id.as_deref(), spinner_chars, model_id.is_none());
    let started = Instant::now();
    let mut report = match (&args.text, &args.file) {
        (Some(text), _) => analyzer.analyze(&preprocess(text)).await,
        (None, Some(path)) => analyzer.analyze_file(path).await,
        (None, None) => anyhow::bail!("one of --text, --file or --payload is required"),
    };
    spinner.finish_and_clear();
    report.errors.extend(setup_errors);
    progress::print_analysis_complete(started.elapsed(), report.input_text.chars().count());

    let mut artifacts = Vec::new();
    if !args.no_html {
        artifacts.extend(write_dashboard(&mut report, &output_dir));
    }
    artifacts.insert(0, io::write_report(&output_dir, &report)?);

    progress::print_summary(&report, &artifacts);
    Ok(())
}
