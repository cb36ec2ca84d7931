//! # Activity Sync Main Entry Point
//!
//! `serve` runs the HTTP API; `sync`, `cleanup` and `migrate` are one-shot
//! operator commands against the configured database.

use activity_sync::{
    config::{AppConfig, ConfigLoader},
    db,
    server::{build_engine, run_server},
    telemetry::{self, TraceContext, with_trace_context},
};
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "activity-sync",
    version,
    about = "Incremental GitHub activity sync per user and repository"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default).
    Serve,

    /// Sync one user's activity in one or more repositories.
    Sync(SyncArgs),

    /// Remove watermarks older than the retention period.
    Cleanup(CleanupArgs),

    /// Apply pending database migrations and exit.
    Migrate,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Platform login whose activity is counted.
    #[arg(long)]
    username: String,

    /// Repository in owner/name form (repeatable).
    #[arg(long = "repository", short = 'r', required = true)]
    repositories: Vec<String>,

    /// Data source token (default: ACTIVITY_GITHUB_TOKEN).
    #[arg(long)]
    token: Option<String>,
}

#[derive(Args, Debug)]
struct CleanupArgs {
    /// Override ACTIVITY_SYNC_RETENTION_DAYS for this run.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    retention_days: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Loaded configuration");
    }
    tracing::info!(profile = %config.profile, "Configuration loaded");

    let database = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&database).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, database)
            .await
            .map_err(|e| anyhow!("server error: {}", e)),
        Commands::Sync(args) => sync(config, database, args).await,
        Commands::Cleanup(args) => {
            let mut config = config;
            if let Some(days) = args.retention_days {
                config.sync.retention_days = days;
            }
            let engine = build_engine(&config, database)?;
            let deleted = engine.cleanup().await?;
            println!("deleted {} stale watermark(s)", deleted);
            Ok(())
        }
        Commands::Migrate => {
            tracing::info!("Migrations applied");
            Ok(())
        }
    }
}

async fn sync(
    config: AppConfig,
    database: sea_orm::DatabaseConnection,
    args: SyncArgs,
) -> Result<()> {
    let token = args
        .token
        .or_else(|| config.github_token.clone())
        .context("no data source token; pass --token or set ACTIVITY_GITHUB_TOKEN")?;
    let engine = build_engine(&config, database)?;

    let mut failures = 0;
    for repository in &args.repositories {
        let result = with_trace_context(
            TraceContext::generate("cli"),
            engine.sync_user_repo_activity(&args.username, repository, &token),
        )
        .await;

        match result {
            Ok(outcome) => println!("{}: {}", repository, serde_json::to_string(&outcome)?),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", repository, e);
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} repositories failed to sync",
            failures,
            args.repositories.len()
        ));
    }
    Ok(())
}
