use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the invoicing backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GraphQL error: {0}")]
    Graphql(String),

    #[error("Server error {status}: {message}")]
    Rest { status: u16, message: String },

    #[error("Response is missing {0}")]
    MissingData(&'static str),

    #[error("No response after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}
