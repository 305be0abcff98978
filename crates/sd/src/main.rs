mod openapi;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use sd_core::error::EngineError;
use sd_core::types::{AggregatedStatus, BuildId, BuildReport, BuildWithStatus, ProjectId};
use sd_core::{Engine, EngineConfig, RequestContext};
use sd_db::DbStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "sd", about = "Build status and diff aggregation for visual tests")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "SD_DB_PATH", default_value = ".snapdiff/snapdiff.db", global = true)]
    db: PathBuf,
    /// Engine config file.
    #[arg(long, env = "SD_CONFIG", default_value = sd_core::config::DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the database schema.
    Migrate,
    /// List a project's builds with their status, newest first.
    Builds {
        project_id: ProjectId,
        #[arg(long)]
        limit: Option<u32>,
        /// Only builds with an approval or a rejection.
        #[arg(long)]
        reviewed: bool,
    },
    /// Show one build with its stats and diffs.
    Show { build_id: BuildId },
    /// Conclude finished builds that have no conclusion yet.
    Conclude {
        #[arg(required = true)]
        build_ids: Vec<BuildId>,
    },
    /// Print the JSON schemas of the values above.
    Schema,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("database {path}: {message}")]
    Database { path: String, message: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    match run(cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{} {err}", "error:".red());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("SD_LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let engine = || open_engine(&cli.db, &cli.config);
    let ctx = RequestContext::new();
    match cli.command {
        Command::Schema => {
            writeln!(out, "{}", openapi::generate_schema()?)?;
        }
        Command::Migrate => {
            engine()?;
            tracing::info!(path = %cli.db.display(), "database migrated");
            writeln!(out, "migrated {}", cli.db.display())?;
        }
        Command::Builds {
            project_id,
            limit,
            reviewed,
        } => {
            let engine = engine()?;
            let builds = if reviewed {
                engine.builds().list_reviewed(&ctx, &project_id)?
            } else {
                engine.builds().list_for_project(&ctx, &project_id, limit)?
            };
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&builds)?)?;
            } else {
                print_builds(out, &builds)?;
            }
        }
        Command::Show { build_id } => {
            let engine = engine()?;
            let report = engine.builds().report(&ctx, &build_id)?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                print_report(out, &report)?;
            }
        }
        Command::Conclude { build_ids } => {
            let engine = engine()?;
            let builds = engine.builds().get_many(&build_ids)?;
            let concluded = engine.builds().conclude(&ctx, &builds)?;
            let statuses = engine.builds().get_aggregated_statuses(&ctx, &concluded)?;
            let builds: Vec<BuildWithStatus> = concluded
                .into_iter()
                .zip(statuses)
                .map(|(build, status)| BuildWithStatus { build, status })
                .collect();
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&builds)?)?;
            } else {
                print_builds(out, &builds)?;
            }
        }
    }
    Ok(())
}

fn open_engine(db: &Path, config: &Path) -> Result<Engine<DbStore>, CliError> {
    let database_error = |message: String| CliError::Database {
        path: db.display().to_string(),
        message,
    };
    if let Some(parent) = db.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| database_error(err.to_string()))?;
    }
    let conn =
        sd_db::schema::open_and_migrate(db).map_err(|err| database_error(err.to_string()))?;
    let config = EngineConfig::load(config).map_err(EngineError::from)?;
    Ok(Engine::new(DbStore::new(conn), config))
}

fn print_builds(out: &mut impl Write, builds: &[BuildWithStatus]) -> std::io::Result<()> {
    if builds.is_empty() {
        return writeln!(out, "no builds");
    }
    for item in builds {
        let stats = item.build.stats_or_default();
        writeln!(
            out,
            "#{:<5} {} {:>4}/{:<4} {}  {}",
            item.build.number,
            colored(item.status),
            stats.changes(),
            stats.total,
            item.build.name,
            item.build.id.dimmed()
        )?;
    }
    Ok(())
}

fn print_report(out: &mut impl Write, report: &BuildReport) -> std::io::Result<()> {
    let build = &report.build;
    writeln!(out, "build #{} {} ({})", build.number, build.name, build.id)?;
    writeln!(out, "status    {}", colored(report.status))?;
    if let Some(review) = report.review_status {
        writeln!(out, "review    {review:?}")?;
    }
    let stats = &report.stats;
    writeln!(
        out,
        "diffs     {} total, {} changed, {} added, {} removed, {} unchanged, {} failed, {} retried, {} ignored",
        stats.total,
        stats.changed,
        stats.added,
        stats.removed,
        stats.unchanged,
        stats.failure,
        stats.retry_failure,
        stats.ignored
    )?;
    for item in &report.diffs {
        let score = item
            .diff
            .score
            .map_or_else(|| "-".to_string(), |score| format!("{score:.4}"));
        writeln!(
            out,
            "  {:<13} {:>7}  {}",
            item.status,
            score,
            item.name.as_deref().unwrap_or("?")
        )?;
    }
    Ok(())
}

fn colored(status: AggregatedStatus) -> String {
    let label = format!("{status:<16}");
    match status {
        AggregatedStatus::Accepted | AggregatedStatus::NoChanges => label.green().to_string(),
        AggregatedStatus::Rejected | AggregatedStatus::Error => label.red().to_string(),
        AggregatedStatus::ChangesDetected => label.yellow().to_string(),
        AggregatedStatus::Expired | AggregatedStatus::Aborted => label.dimmed().to_string(),
        AggregatedStatus::Pending | AggregatedStatus::Progress => label.blue().to_string(),
    }
}
