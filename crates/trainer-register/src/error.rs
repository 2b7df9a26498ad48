//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Registration error: {0}")]
    Registration(#[from] registration_client::RegistrationError),

    #[error("Push channel error: {0}")]
    Channel(#[from] points_channel::ChannelError),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
