use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vigil::{
    clock::SystemClock,
    config::AppConfig,
    history::{self, ReportBuilder},
    persistence::sqlite::SqliteHealthStore,
    providers::{DirCrashHistory, FileSnapshotSource},
    supervisor::Supervisor,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml. Defaults to "configs".
    #[arg(short, long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the aggregation service.
    Run,
    /// Prints the consolidated health and crash report as JSON.
    Report {
        /// Hours of health history to fold in. Defaults to the configured
        /// window.
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Deletes all persisted health history.
    Clear,
    /// Runs a sanity check of the accumulation types.
    SelfTest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_service(cli.config_dir.as_deref()).await?,
        Commands::Report { hours } => print_report(cli.config_dir.as_deref(), hours).await?,
        Commands::Clear => clear(cli.config_dir.as_deref()).await?,
        Commands::SelfTest => {
            history::self_test();
            println!("self-test ok");
        }
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<SqliteHealthStore>, Box<dyn std::error::Error>>
{
    tracing::debug!("Initializing history store...");
    let store = Arc::new(SqliteHealthStore::new(&config.database_url).await?);
    store.run_migrations().await?;
    tracing::info!("Database migrations completed.");
    Ok(store)
}

async fn run_service(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(
        database_url = %config.database_url,
        snapshot_path = %config.snapshot_path.display(),
        "Configuration loaded."
    );

    let store = open_store(&config).await?;

    let supervisor = Supervisor::builder().config(config).store(store).build()?;

    tracing::info!("Supervisor initialized, starting aggregation...");

    supervisor.run().await?;

    Ok(())
}

async fn print_report(
    config_dir: Option<&str>,
    hours: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;
    let store = open_store(&config).await?;

    let clock = Arc::new(SystemClock);
    let builder = ReportBuilder::new(
        store,
        Arc::new(FileSnapshotSource::new(&config.snapshot_path)),
        Arc::new(DirCrashHistory::new(&config.crash_dir, clock.clone())),
        clock,
    );
    let health_hours = hours.unwrap_or(config.health_history_hours);
    let report = builder.build_report(health_hours, config.crash_history_hours).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn clear(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;
    let store = open_store(&config).await?;

    let count = history::clear_history(store.as_ref()).await?;
    println!("cleared {count} history slots");
    Ok(())
}
