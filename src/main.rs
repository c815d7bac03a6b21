use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod analysis;
mod config;
mod db;
mod error;
mod models;
mod notify;
mod pipeline;
mod rank;
mod score;
mod service;
mod store;
#[cfg(test)]
mod testing;

use analysis::HttpAnalysisClient;
use config::Config;
use db::PgStore;
use models::AnalysisRequest;
use notify::{FcmNotifier, LogNotifier, Notifier};
use pipeline::ReportBuilder;
use service::ReportService;

#[derive(Parser)]
#[command(name = "posture-report")]
#[command(about = "Posture analysis reports and cohort rankings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import users from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Submit a video for posture analysis
    Submit {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        video_url: String,
        #[arg(long, default_value_t = 0)]
        alert_count: i32,
        #[arg(long, default_value_t = 0)]
        analysis_time: i32,
        #[arg(long = "type")]
        kind: String,
    },
    /// List every report of a user
    Reports {
        #[arg(long)]
        user: Uuid,
    },
    /// Show one report
    Report { id: Uuid },
    /// Report ids and dates for one month
    Summary {
        #[arg(long)]
        user: Uuid,
        /// Month as YYYYMM, e.g. 202401
        #[arg(long)]
        ym: String,
    },
    /// List all reports
    AllReports,
    /// Rank a user within their age and gender cohort over the last 30 days
    Rank {
        #[arg(long)]
        user: Uuid,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("posture_report=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let service = ReportService::new(store.clone(), store.clone(), store.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let written = db::import_csv(&pool, &csv).await?;
            println!("Imported {written} users from {}.", csv.display());
        }
        Commands::Submit {
            user,
            video_url,
            alert_count,
            analysis_time,
            kind,
        } => {
            let client = HttpAnalysisClient::new(config.require_analysis()?);
            let notifier: Arc<dyn Notifier> = match config.fcm.clone() {
                Some(fcm) => Arc::new(FcmNotifier::new(fcm)),
                None => Arc::new(LogNotifier),
            };
            let service = service.with_builder(ReportBuilder::new(
                Arc::new(client),
                store.clone(),
                notifier,
            ));

            let submission = service
                .analysis(
                    Some(user),
                    AnalysisRequest {
                        video_url,
                        alert_count,
                        analysis_time,
                        kind,
                    },
                )
                .await?;
            println!("{}", submission.message);

            info!("waiting for analysis to finish before exiting");
            submission
                .task
                .await
                .context("analysis task panicked")?;
        }
        Commands::Reports { user } => {
            print_json(&service.find_reports_by_current_user(Some(user)).await?)?;
        }
        Commands::Report { id } => {
            print_json(&service.find_by_id(id).await?)?;
        }
        Commands::Summary { user, ym } => {
            print_json(&service.find_summary_by_month(Some(user), &ym).await?)?;
        }
        Commands::AllReports => {
            print_json(&service.find_all().await?)?;
        }
        Commands::Rank { user } => {
            print_json(&service.find_rank_at_age_and_gender(Some(user)).await?)?;
        }
    }

    Ok(())
}
