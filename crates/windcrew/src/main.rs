use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::Router;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use windcrew_core::{db, import, store::PostgresStore};

mod routes;
mod state;

use state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Windcrew timesheet API server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the Windcrew API server
    Serve,
    /// Run database migrations
    Migrate,
    /// Mark orphaned `processing` import batches as failed
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Batches in `processing` older than this many hours are closed
    #[arg(long, default_value_t = 24)]
    max_age_hours: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let pool = connect_pool().await?;
            db::run_migrations(&pool).await?;
            serve(pool).await
        }
        Command::Migrate => {
            let pool = connect_pool().await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Sweep(args) => {
            let pool = connect_pool().await?;
            let store = PostgresStore::new(pool);
            let swept =
                import::sweep_stale_batches(&store, chrono::Duration::hours(args.max_age_hours))
                    .await?;
            info!(swept, "stale import batches closed");
            Ok(())
        }
    }
}

async fn serve(pool: db::DbPool) -> Result<()> {
    let state = Arc::new(AppState::new(PostgresStore::new(pool)));

    let app = Router::new()
        .route("/timesheets/parse", post(routes::parse_timesheet))
        .route("/timesheets/import", post(routes::import_timesheet))
        .route("/import-batches", get(routes::list_batches))
        .route("/project-mappings", get(routes::list_project_mappings))
        .route("/import-batches/{id}", delete(routes::delete_batch))
        .route("/reports/conflicts", get(routes::conflict_report))
        .route("/reports/availability", get(routes::availability_report))
        .route("/reports/hours", get(routes::hours_report))
        .with_state(state);

    let bind_addr =
        std::env::var("WINDCREW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "Windcrew API server listening");

    axum::serve(listener, app)
        .await
        .with_context(|| "server terminated")
}

async fn connect_pool() -> Result<db::DbPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("WINDCREW_DATABASE_URL"))
        .context("DATABASE_URL (or WINDCREW_DATABASE_URL) must be set")?;
    db::connect(&database_url).await
}
