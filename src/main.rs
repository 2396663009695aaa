use std::sync::Arc;

use cirrus::{
    cmd::{CheckArgs, HistoryArgs, check, history},
    config::AppConfig,
    http_client::HttpClientPool,
    persistence::{SqliteStateRepository, traits::AppRepository},
    providers::OpenWeatherProvider,
    supervisor::Supervisor,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing app.yaml. Defaults to ./configs.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the monitoring supervisor: periodic cycles plus delivery.
    Run,
    /// Runs a single monitoring cycle and prints the alerts.
    Check(CheckArgs),
    /// Prints a user's stored alert history.
    History(HistoryArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Run => run_supervisor(config_dir).await?,
        Commands::Check(args) => check::execute(args, config_dir).await?,
        Commands::History(args) => history::execute(args, config_dir).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(database_url = %config.database_url, user_id = %config.user_id, "Configuration loaded.");

    tracing::debug!("Initializing state repository...");
    let repository =
        Arc::new(SqliteStateRepository::new(&config.database_url, config.history_cap).await?);
    repository.run_migrations().await?;
    tracing::info!("Database migrations completed.");

    tracing::debug!(api_url = %config.weather.api_url, "Initializing weather provider...");
    let pool = HttpClientPool::new();
    let provider =
        OpenWeatherProvider::new(&config.weather, &config.http_retry_config, &pool).await?;
    tracing::info!(retry_policy = ?config.http_retry_config, "Weather provider initialized with retry policy.");

    let supervisor = Supervisor::builder()
        .config(config)
        .repository(repository as Arc<dyn AppRepository>)
        .provider(Arc::new(provider))
        .build()
        .await?;

    tracing::info!("Supervisor initialized, starting monitoring...");

    supervisor.run().await?;

    Ok(())
}
