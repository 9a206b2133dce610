use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("AI API error: {0}")]
    ApiError(String),

    #[error("API key not configured")]
    MissingApiKey,

    #[error("Webhook not configured")]
    MissingWebhook,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
