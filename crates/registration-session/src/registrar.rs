//! Submission seam.

use async_trait::async_trait;
use registration_client::{
    RegistrationClient, RegistrationError, RegistrationInput, RegistrationResult,
};

/// Anything that can turn a registration input into a registration result.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(
        &self,
        input: &RegistrationInput,
    ) -> Result<RegistrationResult, RegistrationError>;
}

#[async_trait]
impl Registrar for RegistrationClient {
    async fn register(
        &self,
        input: &RegistrationInput,
    ) -> Result<RegistrationResult, RegistrationError> {
        RegistrationClient::register(self, input).await
    }
}
