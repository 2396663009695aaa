//! The `check` subcommand: a single monitoring cycle, printed to stdout.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;

use crate::{
    config::AppConfig,
    engine::MonitoringOrchestrator,
    http_client::HttpClientPool,
    notification::{ConfigIdentityResolver, ForegroundPushTransport, NotificationDispatcher},
    persistence::{SqliteStateRepository, traits::AppRepository},
    providers::OpenWeatherProvider,
};

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// The user whose tracked cities to evaluate.
    #[arg(long)]
    user: String,
    /// City the user is currently viewing. Requires --country.
    #[arg(long, requires = "country")]
    city: Option<String>,
    /// Country of the current city. Requires --city.
    #[arg(long, requires = "city")]
    country: Option<String>,
}

/// Runs one monitoring cycle and prints the resulting alerts.
///
/// When `--city`/`--country` are given the visit is recorded first, so the
/// city joins the tracked set and takes priority for this cycle. Email
/// notifications enqueued here are delivered by the next `run`.
pub async fn execute(
    args: CheckArgs,
    config_dir: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;

    let repository = Arc::new(
        SqliteStateRepository::new(&config.database_url, config.history_cap).await?,
    );
    repository.run_migrations().await?;
    let repository: Arc<dyn AppRepository> = repository;

    let pool = HttpClientPool::new();
    let provider =
        OpenWeatherProvider::new(&config.weather, &config.http_retry_config, &pool).await?;

    // One-shot dispatch: foreground display only. Enqueued emails stay in
    // the durable queue until a supervisor run drains them.
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&repository),
        Arc::new(ConfigIdentityResolver::new(config.recipients.clone())),
        Arc::new(ForegroundPushTransport),
        None,
        Arc::new(Notify::new()),
    ));

    let current_city = match (args.city.as_deref(), args.country.as_deref()) {
        (Some(city), Some(country)) => {
            repository.record_city_visit(&args.user, city, country).await?;
            Some((city, country))
        }
        _ => None,
    };

    let orchestrator =
        MonitoringOrchestrator::new(repository, Arc::new(provider), dispatcher);
    let alerts = orchestrator.run_cycle(&args.user, current_city).await?;

    if alerts.is_empty() {
        println!("No active weather alerts.");
    } else {
        for alert in &alerts {
            println!(
                "[{:?}] {} ({}, {}): {}",
                alert.severity, alert.alert_type, alert.city, alert.country, alert.message
            );
        }
    }

    Ok(())
}
