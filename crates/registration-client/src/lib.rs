//! Client for the trainer registration endpoint.

mod client;
mod error;
mod types;

pub use client::{RegistrationClient, DEFAULT_FAILURE_MESSAGE};
pub use error::RegistrationError;
pub use types::{RegistrationInput, RegistrationResult};
