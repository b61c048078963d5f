//! CLI binary for sow: plan term timelines and generate Schemes of Work.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sow_core::allocator::allocate_with;
use sow_core::breaks::{materialize_timeline, teaching_slots};
use sow_core::config::SowConfig;
use sow_core::curriculum::CurriculumCatalog;
use sow_core::model::{HIGH_CONFIDENCE, LessonContent, SchemeStatus};
use sow_core::storage;
use sow_gen::progress::SchemeProgress;
use sow_gen::{CancelToken, SchemeConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sow", about = "Scheme of Work planner and generator")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the term timeline and the topic allocation for a request
    Timeline {
        /// Scheme request file (.toml or .json)
        request: PathBuf,
    },

    /// Generate a full scheme of work
    Generate {
        /// Scheme request file (.toml or .json)
        request: PathBuf,

        /// Curriculum catalog JSON consulted before any generation
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Output path (defaults to .sow/scheme.json under the project root)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Text backend provider (overrides config)
        #[arg(long)]
        provider: Option<String>,

        /// Model name (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Backend base URL (overrides config)
        #[arg(long)]
        base_url: Option<String>,

        /// Number of slots resolved in parallel (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Check a lesson JSON file against the pedagogical rules
    Validate {
        /// Lesson content JSON file
        lesson: PathBuf,

        /// Substrand the lesson must align with
        #[arg(long)]
        substrand: Option<String>,
    },

    /// List compiled-in text backend providers
    Providers,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    // Logs are written above the progress bars.
    let progress = SchemeProgress::new();
    let log_progress = progress.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(move || log_progress.log_writer())
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Timeline { request } => cmd_timeline(&project_root, &request),
        Commands::Generate {
            request,
            catalog,
            output,
            provider,
            model,
            base_url,
            workers,
        } => cmd_generate(
            &project_root,
            &progress,
            &request,
            catalog.as_deref(),
            output,
            ProviderOverrides {
                provider,
                model,
                base_url,
                workers,
            },
        ),
        Commands::Validate { lesson, substrand } => cmd_validate(&lesson, substrand.as_deref()),
        Commands::Providers => {
            cmd_providers();
            Ok(())
        }
    }
}

fn cmd_timeline(project_root: &Path, request_path: &Path) -> Result<()> {
    let config = SowConfig::load(project_root)?;
    let request = storage::load_request(request_path)?;
    let calendar = request.build_calendar()?;
    let schedule = request.build_breaks(&calendar)?;
    let timeline = materialize_timeline(&calendar, schedule.as_slice());
    let slots = teaching_slots(&timeline);

    println!(
        "{} {}: weeks {}-{}, {} lessons per week",
        request.context.learning_area,
        request.context.grade,
        calendar.spec().first_week,
        calendar.spec().last_week,
        calendar.lessons_per_week()
    );

    let mut current_week = 0;
    for slot in &timeline {
        if slot.week != current_week {
            current_week = slot.week;
            println!("\nWeek {}", slot.week);
        }
        match &slot.break_title {
            Some(title) => println!("  Lesson {:<5} [break] {}", slot.lesson.to_string(), title),
            None => println!("  Lesson {:<5}", slot.lesson.to_string()),
        }
    }

    println!(
        "\n{} teaching slots, {} break slots",
        slots.len(),
        timeline.len() - slots.len()
    );

    if request.topics.is_empty() {
        eprintln!("No topics in request; skipping allocation.");
        return Ok(());
    }

    let assignments = allocate_with(&request.topics, &slots, config.allocation.strategy)?;
    println!("\nAllocation ({:?}):", config.allocation.strategy);
    for a in &assignments {
        println!(
            "  Week {:>2} Lesson {:<5} {} / {} ({} of {})",
            a.slot.week,
            a.slot.lesson.to_string(),
            a.topic.strand,
            a.topic.substrand,
            a.position,
            a.topic_total
        );
    }

    Ok(())
}

struct ProviderOverrides {
    provider: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    workers: Option<usize>,
}

fn cmd_generate(
    project_root: &Path,
    progress: &SchemeProgress,
    request_path: &Path,
    catalog_path: Option<&Path>,
    output: Option<PathBuf>,
    overrides: ProviderOverrides,
) -> Result<()> {
    let mut config = SowConfig::load(project_root)?;
    if let Some(name) = overrides.provider {
        config.provider.name = name;
    }
    if overrides.model.is_some() {
        config.provider.model = overrides.model;
    }
    if overrides.base_url.is_some() {
        config.provider.base_url = overrides.base_url;
    }
    if let Some(workers) = overrides.workers {
        config.pipeline.workers = workers;
    }
    config.validate()?;

    let request = storage::load_request(request_path)?;
    let catalog = match catalog_path {
        Some(path) => storage::load_catalog(path)?,
        None => {
            tracing::warn!("No catalog given; every slot will be generated");
            CurriculumCatalog::new(Vec::new())
        }
    };

    let api_key = std::env::var(&config.provider.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        eprintln!(
            "Warning: {} is not set; the backend may reject requests.",
            config.provider.api_key_env
        );
    }
    let backend = sow_gen::create_provider(
        &config.provider.name,
        &api_key,
        config.provider.model.as_deref(),
        config.provider.base_url.as_deref(),
        Duration::from_secs(config.generation.timeout_secs),
    )?;

    let calendar = request.build_calendar()?;

    eprintln!(
        "Generating scheme for {} {} with {} ({})...",
        request.context.learning_area,
        request.context.grade,
        config.provider.name,
        backend.model_name()
    );

    let scheme_config = SchemeConfig {
        backend: backend.as_ref(),
        store: &catalog,
        settings: &config,
        progress,
        cancel: CancelToken::new(),
    };
    let result = sow_gen::generate_scheme(
        &calendar,
        &request.breaks,
        &request.topics,
        &request.context,
        &scheme_config,
    );
    progress.finish();
    let scheme = result?;

    let output = output.unwrap_or_else(|| storage::scheme_file(project_root));
    storage::save_scheme(&output, &scheme)?;

    eprintln!("\nScheme written to {}", output.display());
    eprintln!("{}", scheme.metrics);

    let low: Vec<_> = scheme.low_confidence(HIGH_CONFIDENCE).collect();
    if !low.is_empty() {
        eprintln!("\nLow-confidence lessons ({}):", low.len());
        for lesson in low.iter().take(20) {
            eprintln!(
                "  Week {} Lesson {}: {} [{} {:.2}]",
                lesson.week, lesson.lesson, lesson.substrand, lesson.source, lesson.confidence
            );
        }
        if low.len() > 20 {
            eprintln!("  ... and {} more", low.len() - 20);
        }
    }

    if scheme.status() == SchemeStatus::Partial {
        eprintln!("\nFailed slots ({}):", scheme.failures.len());
        for failure in &scheme.failures {
            eprintln!(
                "  Week {} Lesson {}: {} ({})",
                failure.week, failure.lesson, failure.substrand, failure.reason
            );
        }
    }

    Ok(())
}

fn cmd_validate(lesson_path: &Path, substrand: Option<&str>) -> Result<()> {
    let json = std::fs::read_to_string(lesson_path)
        .with_context(|| format!("failed to read lesson from {}", lesson_path.display()))?;
    let content: LessonContent =
        serde_json::from_str(&json).context("failed to parse lesson content JSON")?;

    let report = sow_gen::validate(&content, substrand);
    if report.is_valid {
        println!("Lesson is valid.");
        return Ok(());
    }

    println!("Lesson failed {} check(s):", report.issues.len());
    for issue in &report.issues {
        println!("  [{:?}] {}", issue.rule, issue.message);
    }
    anyhow::bail!("lesson content did not pass validation")
}

fn cmd_providers() {
    println!("Available providers:");
    for name in sow_gen::available_providers() {
        println!("  {name}");
    }
}
