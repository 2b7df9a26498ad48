//! Registration client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("No wallet link was returned for the registration")]
    MissingWalletLink,

    #[error("Malformed registration response: {0}")]
    MalformedResponse(String),
}
