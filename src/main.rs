use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod analysis;
mod chart;
mod config;
mod db;
mod entry;
mod error;
mod export;
mod models;
mod report;
mod scoring;

use config::AppConfig;
use export::ExportFormat;
use models::Rating;

#[derive(Parser)]
#[command(name = "site-audit")]
#[command(about = "Site audit checklist feedback: record, export, report", long_about = None)]
struct Cli {
    /// TOML file with storage paths and the project/category catalog
    #[arg(long, env = "AUDIT_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[arg(long, env = "AUDIT_DATABASE", global = true)]
    database: Option<PathBuf>,
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// List the configured projects, categories and ratings
    Catalog,
    /// Record ratings for the subcategories of one category
    Entry {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        audit: i64,
        #[arg(long)]
        project: String,
        #[arg(long)]
        category: String,
        /// Repeatable; prompts for every subcategory when omitted
        #[arg(long = "rating", value_name = "SUBCATEGORY=RATING")]
        ratings: Vec<String>,
        #[arg(long = "comment", value_name = "SUBCATEGORY=TEXT")]
        comments: Vec<String>,
    },
    /// Export the whole feedback table
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },
    /// Generate the PDF report for one audit
    Report {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        audit: i64,
    },
    /// Chart an audit against the two audits before it
    Analyse {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        audit: i64,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(domain) = err.downcast_ref::<error::Error>() {
                if domain.is_no_data() {
                    warn!("{err:#}");
                    println!("{domain}");
                    return ExitCode::SUCCESS;
                }
            }
            error!("{err:#}");
            eprintln!("An error occurred: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    match cli.command {
        Commands::InitDb => {
            db::connect(&config.database)
                .await
                .with_context(|| format!("failed to open {}", config.database.display()))?;
            println!("Schema ready.");
        }
        Commands::Catalog => {
            println!("Projects:");
            for project in &config.catalog.projects {
                println!("- {project}");
            }
            println!("Categories:");
            for category in &config.catalog.categories {
                println!("- {}", category.name);
                for subcategory in &category.subcategories {
                    println!("    {subcategory}");
                }
            }
            println!("Ratings:");
            for rating in Rating::ALL {
                println!("- {} ({})", rating, rating.score());
            }
        }
        Commands::Entry {
            audit,
            project,
            category,
            ratings,
            comments,
        } => {
            let ratings = ratings
                .iter()
                .map(|raw| entry::parse_pair(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let comments = comments
                .iter()
                .map(|raw| entry::parse_pair(raw))
                .collect::<Result<Vec<_>, _>>()?;

            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let (ratings, comments) = entry::collect_ratings(
                &config.catalog,
                &project,
                &category,
                ratings,
                comments,
                &mut stdin.lock(),
                &mut stdout.lock(),
            )?;

            let batch =
                entry::build_batch(&config.catalog, audit, &project, &category, &ratings, &comments)?;
            let pool = db::connect(&config.database)
                .await
                .with_context(|| format!("failed to open {}", config.database.display()))?;
            db::upsert_feedback(&pool, &batch)
                .await
                .context("failed to save feedback")?;
            println!(
                "Feedback for Audit No {audit}, {category} in {project} saved successfully!"
            );
        }
        Commands::Export { format } => {
            let pool = db::connect(&config.database)
                .await
                .with_context(|| format!("failed to open {}", config.database.display()))?;
            let entries = db::fetch_all(&pool).await?;
            let path = export::export(&entries, format, &config.output_dir)
                .with_context(|| format!("{format} export failed"))?;
            println!("Data exported to {}!", path.display());
        }
        Commands::Report { audit } => {
            let pool = db::connect(&config.database)
                .await
                .with_context(|| format!("failed to open {}", config.database.display()))?;
            let path = report::generate(&pool, &config, audit).await?;
            println!("Report generated for Audit No: {audit}");
            println!("PDF generated: {}", path.display());
        }
        Commands::Analyse { audit, json } => {
            let pool = db::connect(&config.database)
                .await
                .with_context(|| format!("failed to open {}", config.database.display()))?;
            let summary = analysis::analyse(&pool, &config, audit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                analysis::print_summary(&summary, &mut std::io::stdout().lock())?;
            }
            info!("Analysis complete for audit {audit}");
        }
    }

    Ok(())
}
