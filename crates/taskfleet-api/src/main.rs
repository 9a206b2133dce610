use anyhow::Result;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod handlers;
mod routes;
mod state;

use taskfleet_core::{AppConfig, CredentialStore, ErrorCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskfleet_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Get configuration
    let port = env::var("API_PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()?;

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
    let credentials_path =
        env::var("CREDENTIALS_PATH").unwrap_or_else(|_| "credentials.json".to_string());
    let error_codes_path =
        env::var("ERROR_CODES_PATH").unwrap_or_else(|_| "error_codes.json".to_string());
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:logs.db".to_string());

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Cannot load {}: {}; starting with an empty fleet", config_path, e);
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

    // Initialize database
    let database = taskfleet_db::Database::new(&db_url).await?;
    database.init_schema().await?;

    let analyzer = taskfleet_ai::GeminiAnalyzer::new(config.api_keys.gemini.clone());
    let webhook = config
        .notification
        .enabled
        .then(|| config.notification.google_chat_webhook_url.clone())
        .flatten();
    let notifier = taskfleet_ai::ChatNotifier::new(webhook);

    // Create app state
    let state = state::ApiState {
        config: Arc::new(config),
        credentials: Arc::new(credentials),
        catalog: Arc::new(catalog),
        db: Arc::new(database),
        analyzer: Arc::new(analyzer),
        notifier: Arc::new(notifier),
    };

    // Build router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🚀 TaskFleet API Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
