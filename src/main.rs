use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod models;
mod report;
mod rollup;
mod score;
mod trend;

use config::CategoryConfig;

#[derive(Parser)]
#[command(name = "weekly-trends")]
#[command(about = "Weekly checklist scoring and care trend analysis for Carelink", long_about = None)]
struct Cli {
    /// JSON file overriding the default checklist category set
    #[arg(long, global = true)]
    categories: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import checklist sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Analyze a senior's recent weekly trend
    Analyze {
        #[arg(long)]
        guardian: String,
        #[arg(long, default_value_t = trend::DEFAULT_LOOKBACK_WEEKS)]
        weeks: u32,
    },
    /// Generate a markdown trend report for guardians
    Report {
        #[arg(long)]
        guardian: String,
        #[arg(long, default_value_t = trend::DEFAULT_LOOKBACK_WEEKS)]
        weeks: u32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let category_config = match &cli.categories {
        Some(path) => CategoryConfig::from_file(path)?,
        None => CategoryConfig::default(),
    };

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, &category_config).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv, &category_config).await?;
            println!("Recorded {inserted} sessions from {}.", csv.display());
        }
        Commands::Analyze { guardian, weeks } => {
            let senior = db::find_senior(&pool, &guardian).await?;
            let today = Utc::now().date_naive();
            let since = trend::lookback_since(today, weeks);
            let rows = db::list_weekly_scores(&pool, senior.id, since).await?;
            let result = trend::analyze(senior.id, &rows, weeks, &category_config);
            db::save_trend_snapshot(&pool, today, &result).await?;

            println!(
                "Trend for {} over the last {weeks} weeks:",
                senior.full_name
            );
            match &result.message {
                Some(message) => println!("  {message}."),
                None => println!(
                    "  {:?}, strength {:.2}, average {:.2}%, net change {:+.2}",
                    result.trend, result.trend_strength, result.average_score, result.score_change
                ),
            }
            for alert in &result.alerts {
                println!("  alert [{:?}] {}", alert.severity, alert.message);
            }
            for recommendation in &result.recommendations {
                println!("  - {recommendation}");
            }
        }
        Commands::Report {
            guardian,
            weeks,
            out,
        } => {
            let senior = db::find_senior(&pool, &guardian).await?;
            let today = Utc::now().date_naive();
            let since = trend::lookback_since(today, weeks);
            let rows = db::list_weekly_scores(&pool, senior.id, since).await?;
            let result = trend::analyze(senior.id, &rows, weeks, &category_config);
            db::save_trend_snapshot(&pool, today, &result).await?;

            let report = report::build_report(&senior, &result);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
