//! The `history` subcommand: prints a user's stored alerts, newest first.

use clap::Parser;

use crate::{config::AppConfig, persistence::SqliteStateRepository, persistence::traits::AppRepository};

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// The user whose alert history to print.
    #[arg(long)]
    user: String,
    /// Maximum number of alerts to print. Unlimited when omitted.
    #[arg(long)]
    limit: Option<u32>,
}

pub async fn execute(
    args: HistoryArgs,
    config_dir: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;

    let repository =
        SqliteStateRepository::new(&config.database_url, config.history_cap).await?;
    repository.run_migrations().await?;

    let alerts = repository.get_alert_history(&args.user, args.limit).await?;
    if alerts.is_empty() {
        println!("No alerts in history.");
        return Ok(());
    }

    for alert in &alerts {
        println!(
            "{}  [{:?}] {} ({}, {}): {}",
            alert.created_at.format("%Y-%m-%d %H:%M:%S"),
            alert.severity,
            alert.alert_type,
            alert.city,
            alert.country,
            alert.message
        );
    }

    Ok(())
}
