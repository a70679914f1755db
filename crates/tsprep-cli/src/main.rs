//! tsprep CLI: inspect, replay and edit stored session snapshots.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::EnvFilter;

use tsprep_core::models::scalar_as_text;
use tsprep_core::{
    storage, time_axis, ClientConfig, HeadlessSurface, RestoreController, SessionSnapshot,
    StageOutcome, TimeKind, TimeSpec, TsprepError, WorkflowProgress, WorkflowStep,
};

#[derive(Parser)]
#[command(
    name = "tsprep",
    about = "tsprep: time-series preparation session tools",
    version,
    author
)]
struct Cli {
    /// Client configuration (YAML)
    #[arg(long, global = true, default_value = "tsprep.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects with their workflow progress
    List {
        /// Path to projects directory
        #[arg(default_value = "./data/projects")]
        dir: PathBuf,
    },
    /// Show one project's progress and stored sub-states
    Inspect {
        project: String,
        #[arg(long, default_value = "./data/projects")]
        dir: PathBuf,
    },
    /// Resolve the stored sample's time axis, optionally under a different time spec
    Resolve {
        project: String,
        #[arg(long, default_value = "./data/projects")]
        dir: PathBuf,
        /// Time column (default: the stored one)
        #[arg(long)]
        column: Option<String>,
        /// index, timestamp_sec, timestamp_ms, datetime_format, iso_date, rfc_2822, human_readable
        #[arg(long)]
        kind: Option<TimeKind>,
        /// Pattern for datetime_format, e.g. %Y-%m-%d %H:%M
        #[arg(long)]
        format: Option<String>,
        /// Rows to print
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },
    /// Replay a snapshot headlessly and print what the page would show
    Restore {
        project: String,
        #[arg(long, default_value = "./data/projects")]
        dir: PathBuf,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge a partial snapshot (JSON file) into a stored one
    Merge {
        project: String,
        partial: PathBuf,
        #[arg(long, default_value = "./data/projects")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)?;

    match cli.command {
        Commands::List { dir } => cmd_list(&dir)?,
        Commands::Inspect { project, dir } => cmd_inspect(&dir, &project)?,
        Commands::Resolve {
            project,
            dir,
            column,
            kind,
            format,
            limit,
        } => cmd_resolve(&dir, &project, column, kind, format, limit)?,
        Commands::Restore {
            project,
            dir,
            output,
        } => cmd_restore(&config, &dir, &project, output)?,
        Commands::Merge {
            project,
            partial,
            dir,
        } => cmd_merge(&dir, &project, &partial)?,
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn cmd_list(dir: &Path) -> Result<()> {
    let projects = storage::list_projects(dir)?;
    if projects.is_empty() {
        println!("No projects found in '{}'", dir.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Project", "Target", "Done", "Next step", "Updated"]);

    for project in &projects {
        let snapshot = match storage::load_snapshot(dir, project) {
            Ok(s) => s,
            Err(TsprepError::SnapshotNotFound(_)) => SessionSnapshot::default(),
            Err(e) => {
                tracing::warn!(project = %project, "skipping unreadable snapshot: {}", e);
                continue;
            }
        };
        let progress = WorkflowProgress::derive(&snapshot);
        let updated = modified(&storage::snapshot_path(dir, project)).unwrap_or_else(|| "-".into());
        table.add_row([
            project.as_str(),
            snapshot.target().unwrap_or("-"),
            &format!("{}/{}", progress.completed(), WorkflowStep::ALL.len()),
            progress.active().map(|s| s.label()).unwrap_or("-"),
            &updated,
        ]);
    }

    println!("Projects in: {}", dir.display());
    println!("{}", table);
    Ok(())
}

fn cmd_inspect(dir: &Path, project: &str) -> Result<()> {
    let snapshot = storage::load_snapshot(dir, project)?;
    let progress = WorkflowProgress::derive(&snapshot);

    println!("Project: {}", project);
    println!("Keys: {}", snapshot.keys().join(", "));
    println!();

    println!("── Progress ────────────────────────────");
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "Step", "Done"]);
    for step in WorkflowStep::ALL {
        let marker = if progress.active() == Some(step) {
            "→"
        } else if progress.is_done(step) {
            "✓"
        } else {
            ""
        };
        let n = (step.index() + 1).to_string();
        table.add_row([n.as_str(), step.label(), marker]);
    }
    println!("{}", table);

    if let Some(selection) = &snapshot.selection {
        println!("── Selection ───────────────────────────");
        println!("  target:   {}", selection.target().unwrap_or("-"));
        println!("  features: {}", selection.features.join(", "));
    }
    if let Some(time) = &snapshot.time {
        println!(
            "  time:     {} ({}{})",
            time.column.as_deref().unwrap_or("row index"),
            time.kind,
            time.pattern().map(|p| format!(", {p}")).unwrap_or_default()
        );
    }
    if let Some(sample) = &snapshot.sample {
        println!("── Sample ({} rows) ─────────────────────", sample.len());
        println!("  columns: {}", sample.columns.join(", "));
    }
    if let Some(pp) = &snapshot.preprocess {
        println!("── Preprocessing ───────────────────────");
        let rows = pp.segment.as_ref().map(|s| s.len()).unwrap_or(0);
        println!("  segment rows: {}", rows);
        let bounds: Vec<String> = pp.bounds.iter().map(|b| b.to_string()).collect();
        println!("  bounds: [{}]", bounds.join(", "));
    }
    if let Some(train) = &snapshot.train {
        println!("── Training ────────────────────────────");
        println!("  {}", train.summary().unwrap_or_else(|| "not trained".into()));
        if let Some(cfg) = &train.cfg {
            println!(
                "  model: {} (window {}, horizon {}, epochs {})",
                cfg.model, cfg.window, cfg.horizon, cfg.epochs
            );
        }
        println!("  prediction: {} points", train.prediction.len());
    }

    Ok(())
}

fn cmd_resolve(
    dir: &Path,
    project: &str,
    column: Option<String>,
    kind: Option<TimeKind>,
    format: Option<String>,
    limit: usize,
) -> Result<()> {
    let snapshot = storage::load_snapshot(dir, project)?;
    let Some(sample) = &snapshot.sample else {
        anyhow::bail!("Project '{}' has no selected sample", project);
    };

    let stored = snapshot.time_spec();
    let spec = TimeSpec {
        column: column.or(stored.column),
        kind: kind.unwrap_or(stored.kind),
        format: format.or(stored.format),
    };
    let axis = time_axis::resolve(sample, &spec);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Row", "Raw", "Resolved"]);
    for (i, x) in axis.iter().enumerate().take(limit) {
        let raw = spec
            .column
            .as_deref()
            .and_then(|c| sample.records[i].get(c))
            .map(scalar_as_text)
            .unwrap_or_default();
        table.add_row([i.to_string(), raw, x.to_string()]);
    }
    println!(
        "Time axis: {} ({})",
        spec.column.as_deref().unwrap_or("row index"),
        spec.kind
    );
    println!("{}", table);
    if axis.len() > limit {
        println!("... {} more rows", axis.len() - limit);
    }
    Ok(())
}

fn cmd_restore(config: &ClientConfig, dir: &Path, project: &str, output: Option<PathBuf>) -> Result<()> {
    let snapshot = storage::load_snapshot(dir, project)?;
    let mut surface = HeadlessSurface::new();
    let report = RestoreController::new(config).restore_snapshot(&mut surface, &snapshot);

    for (stage, outcome) in &report.stages {
        match outcome {
            StageOutcome::Failed(e) => eprintln!("  ✗ {:?}: {}", stage, e),
            StageOutcome::Rendered => eprintln!("  ✓ {:?}", stage),
            StageOutcome::Skipped => eprintln!("  - {:?}", stage),
        }
    }

    let content = serde_json::to_string_pretty(&surface)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &content)?;
            println!("Wrote {} charts to {}", surface.charts.len(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_merge(dir: &Path, project: &str, partial_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(partial_path)?;
    let partial = SessionSnapshot::from_json(&text)?;
    if partial.is_empty() {
        anyhow::bail!("{} contains no snapshot keys", partial_path.display());
    }

    let current = match storage::load_snapshot(dir, project) {
        Ok(s) => s,
        Err(TsprepError::SnapshotNotFound(_)) => SessionSnapshot::default(),
        Err(e) => return Err(e.into()),
    };
    let keys: Vec<String> = partial.keys().into_iter().map(str::to_string).collect();
    let merged = current.merge(partial);
    let path = storage::save_snapshot(dir, project, &merged)?;

    println!("Merged [{}] into {}", keys.join(", "), path.display());
    println!("Keys now: {}", merged.keys().join(", "));
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn modified(path: &Path) -> Option<String> {
    let time = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        chrono::DateTime::<chrono::Local>::from(time)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
    )
}
