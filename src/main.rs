use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

mod cluster;
mod config;
mod fuzzy;
mod load;
mod matcher;
mod models;
mod normalize;
mod report;
mod stats;

use config::MatchConfig;
use matcher::MatchOutcome;
use models::{ExecutionRecord, SummaryRow};

#[derive(Parser)]
#[command(name = "signmatch")]
#[command(about = "Attributes unsigned care visits to the staff who performed them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a batch and write every output table
    Reconcile {
        #[arg(long)]
        planning: PathBuf,
        #[arg(long)]
        execution: PathBuf,
        #[arg(long, default_value = "signmatch-out")]
        out_dir: PathBuf,
        #[command(flatten)]
        config: MatchConfig,
    },
    /// Reconcile a batch and print the per-staff summary
    Summary {
        #[arg(long)]
        planning: PathBuf,
        #[arg(long)]
        execution: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        config: MatchConfig,
    },
}

struct Batch {
    execution: Vec<ExecutionRecord>,
    outcome: MatchOutcome,
    summary: Vec<SummaryRow>,
}

fn run_batch(planning_path: &Path, execution_path: &Path, config: &MatchConfig) -> anyhow::Result<Batch> {
    config.validate().context("invalid matching configuration")?;

    let planning = load::load_planning_file(planning_path, config)?;
    let execution = load::load_execution_file(execution_path, config)?;
    let names = stats::display_names(&planning, &execution);
    let outcome = matcher::match_visits(&planning, &execution, config);
    let summary = stats::summarize(&planning, &outcome, &names, config.merge_score());

    Ok(Batch {
        execution,
        outcome,
        summary,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile {
            planning,
            execution,
            out_dir,
            config,
        } => {
            let batch = run_batch(&planning, &execution, &config)?;
            let registration = stats::registration_stats(&batch.execution);
            let written = report::write_all(&out_dir, &batch.summary, &batch.outcome, &registration)?;

            println!(
                "Reconciled {} unsigned visits ({} attributed, {} exceptions).",
                batch.outcome.processed(),
                batch.outcome.attributions.len(),
                batch.outcome.exceptions.len()
            );
            for path in written {
                println!("- {}", path.display());
            }
        }
        Commands::Summary {
            planning,
            execution,
            limit,
            json,
            config,
        } => {
            let batch = run_batch(&planning, &execution, &config)?;

            if json {
                let rendered = serde_json::to_string_pretty(&batch.summary)
                    .context("failed to render summary as JSON")?;
                println!("{rendered}");
                return Ok(());
            }

            if batch.summary.is_empty() {
                println!("No visits found in this batch.");
                return Ok(());
            }

            println!("Staff by share of unsigned visits:");
            for row in report::worst_offenders(&batch.summary, limit) {
                println!(
                    "- {}: {:.1}% unsigned ({} of {}, {} signed)",
                    row.name, row.unsigned_pct, row.unsigned, row.total, row.signed
                );
            }
            for category in models::ExceptionCategory::ALL {
                let count = batch.outcome.exceptions_in(category).count();
                if count > 0 {
                    println!("- {}: {}", category.label(), count);
                }
            }
        }
    }

    Ok(())
}
