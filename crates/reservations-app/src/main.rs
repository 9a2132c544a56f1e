//! Reservations walkthrough entry point.

use std::error::Error;

use reservations_app::config::AppConfig;
use reservations_app::state::AppState;
use reservations_app::walkthrough;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting reservations walkthrough");

    let config = AppConfig::from_env()?;
    let state = AppState::connect(&config).await?;

    let report = walkthrough::run(&state, Uuid::now_v7(), "R-100").await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
