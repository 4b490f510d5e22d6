//! Colloquy command line.
//!
//! Four subcommands:
//! - `ask` runs one query through the full pipeline
//! - `batch` evaluates a query set and writes the report
//! - `gate` screens text through the safety gate, no provider needed
//! - `validate` checks a configuration file

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use colloquy_core::{
    Config, JsonlFileSink, Phase, Query, QuerySet, SafetyGate, Session, Verdict,
};
use colloquy_runtime::{
    load_config, AdmissionGate, AgentOrchestrator, BatchEvaluator, BudgetTracker,
    CompletionService, JudgeEngine, ProviderRegistry, ProviderSettings, ScoreCache,
};

/// Colloquy research assistant
#[derive(Parser)]
#[command(name = "colloquy", version)]
#[command(about = "Multi-agent research pipeline with safety gating and LLM-as-judge scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query through the full pipeline and print the response
    Ask {
        /// Research query text
        query: String,

        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also print the step trace, safety events, and token usage
        #[arg(short, long)]
        verbose: bool,
    },

    /// Evaluate a query set and write the JSON report
    Batch {
        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Query set as a JSON array, overrides evaluation.queries_path
        #[arg(short, long)]
        queries: Option<PathBuf>,

        /// Report path, defaults to <output_dir>/evaluation_report.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Screen text through the safety gate and print the event as JSON
    Gate {
        /// Text to screen
        text: String,

        /// Which phase's detectors to run: input or output
        #[arg(short, long, default_value = "input")]
        phase: String,

        /// Configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ask {
            query,
            config,
            verbose,
        } => ask(&query, config.as_deref(), verbose).await,
        Commands::Batch {
            config,
            queries,
            output,
        } => batch(config.as_deref(), queries.as_deref(), output.as_deref()).await,
        Commands::Gate {
            text,
            phase,
            config,
        } => gate(&text, &phase, config.as_deref()),
        Commands::Validate { config } => validate(&config),
    }
}

fn load_or_default(path: Option<&Path>) -> Result<(Config, ProviderSettings)> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok((Config::default(), ProviderSettings::default())),
    }
}

fn build_service(settings: &ProviderSettings) -> Result<Arc<dyn CompletionService>> {
    let registry = ProviderRegistry::with_defaults();
    registry
        .create(settings)
        .with_context(|| format!("creating provider '{}'", settings.name))
}

async fn ask(query_text: &str, config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let (config, settings) = load_or_default(config_path)?;
    let service = build_service(&settings)?;

    let orchestrator = AgentOrchestrator::builder()
        .service(service)
        .gate(Arc::new(SafetyGate::new(config.safety.clone())))
        .pipeline(config.pipeline.clone())
        .completion(settings.completion_config())
        .admission(AdmissionGate::new(settings.max_concurrent_requests))
        .budget(Arc::new(BudgetTracker::from_settings(&settings.budgets)))
        .build()?;

    let session = orchestrator.run_session(Query::new(1, query_text)).await;

    println!("{}", session.response_text);

    if verbose {
        print_session_detail(&session)?;
        let usage = orchestrator.usage();
        println!(
            "\nUsage: {} calls, {} tokens ({} prompt / {} completion), est. ${:.4}",
            usage.llm_calls,
            usage.total_tokens,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.estimated_cost
        );
    }

    Ok(())
}

fn print_session_detail(session: &Session) -> Result<()> {
    println!("\nState: {:?}", session.state);
    if session.unresolved_critique {
        println!("Note: critique unresolved after the revision limit");
    }
    if let Some(failure) = &session.failure {
        println!("Failure: {:?}: {}", failure.category, failure.detail);
    }

    if !session.steps.is_empty() {
        println!(
            "\nTrace ({} steps, {} tool calls):",
            session.steps.len(),
            session.tool_call_count()
        );
        for step in &session.steps {
            println!("  [{}] {}", step.step_index, step.role);
            for call in &step.tool_calls {
                println!("      tool {}: {}", call.tool_name, call.result_summary);
            }
        }
    }

    for (label, event) in [
        ("Input safety event", &session.input_event),
        ("Output safety event", &session.output_event),
    ] {
        if let Some(event) = event {
            println!("\n{}:\n{}", label, serde_json::to_string_pretty(event)?);
        }
    }

    Ok(())
}

async fn batch(
    config_path: Option<&Path>,
    queries_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let (config, settings) = load_or_default(config_path)?;
    let service = build_service(&settings)?;

    let queries_file = match queries_path {
        Some(path) => path.to_path_buf(),
        None => config
            .evaluation
            .queries_path
            .clone()
            .map(PathBuf::from)
            .context("no query set: pass --queries or set evaluation.queries_path")?,
    };
    let set = QuerySet::from_json_file(&queries_file)
        .with_context(|| format!("loading queries from {}", queries_file.display()))?;
    tracing::info!(count = set.len(), path = %queries_file.display(), "query set loaded");

    let report_path = match output {
        Some(path) => path.to_path_buf(),
        None => Path::new(&config.evaluation.output_dir).join("evaluation_report.json"),
    };
    let report_dir = report_path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = report_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    // Every gate decision in the batch lands in one audit log next to
    // the report.
    let audit_path = report_dir
        .unwrap_or_else(|| Path::new("."))
        .join("safety_events.jsonl");
    let sink = JsonlFileSink::create(&audit_path)
        .with_context(|| format!("opening audit log {}", audit_path.display()))?;
    let gate = SafetyGate::new(config.safety.clone()).with_sink(Arc::new(sink));

    let admission = AdmissionGate::new(settings.max_concurrent_requests);
    let orchestrator = AgentOrchestrator::builder()
        .service(service.clone())
        .gate(Arc::new(gate))
        .pipeline(config.pipeline.clone())
        .completion(settings.completion_config())
        .admission(admission.clone())
        .budget(Arc::new(BudgetTracker::from_settings(&settings.budgets)))
        .build()?;

    let mut judge = JudgeEngine::new(service, config.judge.clone())
        .with_completion(settings.completion_config())
        .with_admission(admission);
    if let Some(cache) = ScoreCache::from_settings(&settings.cache) {
        judge = judge.with_cache(cache);
    }

    let evaluator = BatchEvaluator::new(
        Arc::new(orchestrator),
        Arc::new(judge),
        config.evaluation.clone(),
    )
    .with_thresholds(config.thresholds.clone());

    let report = evaluator.run(set.queries).await;

    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("writing report to {}", report_path.display()))?;
    let summary = report.render_text();
    let summary_path = report_path.with_file_name("evaluation_summary.txt");
    fs::write(&summary_path, &summary)
        .with_context(|| format!("writing summary to {}", summary_path.display()))?;

    println!("{}", summary);
    println!("Report written to {}", report_path.display());
    println!("Summary written to {}", summary_path.display());

    Ok(())
}

fn gate(text: &str, phase_arg: &str, config_path: Option<&Path>) -> Result<()> {
    let phase = match phase_arg {
        "input" => Phase::Input,
        "output" => Phase::Output,
        other => bail!("unknown phase '{}', expected 'input' or 'output'", other),
    };

    let safety = match config_path {
        Some(path) => {
            Config::from_yaml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?
                .safety
        }
        None => Default::default(),
    };

    let event = SafetyGate::new(safety).evaluate(text, phase);
    println!("{}", serde_json::to_string_pretty(&event)?);

    if event.verdict == Verdict::Blocked {
        std::process::exit(2);
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let (config, settings) =
        load_config(path).with_context(|| format!("{} is invalid", path.display()))?;

    println!("{} is valid", path.display());
    println!("  provider: {} ({})", settings.name, settings.model);
    println!(
        "  judge: {} perspectives, {} criteria",
        config.judge.perspectives.len(),
        config.judge.criteria.len()
    );
    println!(
        "  pipeline: max_revisions={}, max_tool_rounds={}, max_steps={}",
        config.pipeline.max_revisions, config.pipeline.max_tool_rounds, config.pipeline.max_steps
    );

    let registry = ProviderRegistry::with_defaults();
    if let Err(error) = registry.validate(&settings) {
        tracing::warn!(%error, "provider backend is not usable in this environment");
    }

    Ok(())
}
