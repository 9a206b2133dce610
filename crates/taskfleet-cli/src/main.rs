use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::Cli;
use taskfleet_core::{AppConfig, CredentialStore, ErrorCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskfleet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run CLI
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Cannot load {}: {}; starting with an empty fleet", cli.config, e);
            AppConfig::default()
        }
    };

    let credentials = match CredentialStore::load(&cli.credentials) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Cannot load {}: {}; all hosts will be skipped", cli.credentials, e);
            CredentialStore::default()
        }
    };

    let catalog = ErrorCatalog::load(&cli.error_codes);

    let database = taskfleet_db::Database::new(&cli.database_url).await?;
    database.init_schema().await?;

    let analyzer = taskfleet_ai::GeminiAnalyzer::new(config.api_keys.gemini.clone());

    let context = commands::CliContext {
        config,
        credentials,
        catalog,
        db: Arc::new(database),
        analyzer,
        actor: cli.user.clone(),
    };

    commands::execute(cli.command, context).await
}
