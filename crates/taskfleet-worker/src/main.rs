use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod scanner;

use taskfleet_core::{AppConfig, CredentialStore, ErrorCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskfleet_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    tracing::info!("Starting TaskFleet Worker");

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
    let credentials_path =
        std::env::var("CREDENTIALS_PATH").unwrap_or_else(|_| "credentials.json".to_string());
    let error_codes_path =
        std::env::var("ERROR_CODES_PATH").unwrap_or_else(|_| "error_codes.json".to_string());
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:logs.db".to_string());
    let sweep_secs = std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(300);

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Cannot load {}: {}; sweeping an empty fleet", config_path, e);
            AppConfig::default()
        }
    };

    let credentials = match CredentialStore::load(&credentials_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Cannot load {}: {}; all hosts will be skipped", credentials_path, e);
            CredentialStore::default()
        }
    };

    let catalog = ErrorCatalog::load(&error_codes_path);

    let database = taskfleet_db::Database::new(&db_url).await?;
    database.init_schema().await?;

    let analyzer = taskfleet_ai::GeminiAnalyzer::new(config.api_keys.gemini.clone());
    let webhook = config
        .notification
        .enabled
        .then(|| config.notification.google_chat_webhook_url.clone())
        .flatten();
    let notifier = taskfleet_ai::ChatNotifier::new(webhook);

    let scanner = scanner::FleetScanner::new(
        config,
        credentials,
        catalog,
        Arc::new(database),
        analyzer,
        notifier,
    );

    // Start sweep loop
    let mut ticker = interval(Duration::from_secs(sweep_secs));

    loop {
        ticker.tick().await;

        match scanner.sweep().await {
            Ok(summary) => {
                if summary.failures_recorded > 0 {
                    tracing::warn!(
                        "Sweep recorded {} new failure(s)",
                        summary.failures_recorded
                    );
                }
            }
            Err(e) => {
                // A broken log store is worth retrying, not crashing over.
                tracing::error!("Sweep failed: {}", e);
            }
        }
    }
}
