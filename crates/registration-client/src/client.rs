//! Registration HTTP client.

use crate::error::RegistrationError;
use crate::types::*;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Text surfaced when a failure carries no message of its own.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Registration failed. Please try again.";

/// Client for the trainer registration endpoint.
#[derive(Clone)]
pub struct RegistrationClient {
    client: Client,
    base_url: String,
}

impl RegistrationClient {
    /// Create a new registration client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistrationError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL the client was configured with, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a registration.
    ///
    /// Issues exactly one request. Fields are sent as given.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(
        &self,
        input: &RegistrationInput,
    ) -> Result<RegistrationResult, RegistrationError> {
        let response = self
            .client
            .post(format!("{}/api/register", self.base_url))
            .json(input)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            warn!(status = %status, "Registration rejected by server");
            return Err(RegistrationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RegisterResponse = serde_json::from_str(&body)?;
        let result = into_result(parsed)?;

        info!(customer_code = %result.customer_code, "Registration succeeded");
        Ok(result)
    }
}

fn into_result(response: RegisterResponse) -> Result<RegistrationResult, RegistrationError> {
    if !response.success {
        let message = response
            .error
            .or(response.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
        return Err(RegistrationError::Rejected(message));
    }

    let customer = response
        .customer
        .ok_or_else(|| RegistrationError::MalformedResponse("missing customer".into()))?;

    let customer_code = customer
        .customer_code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| RegistrationError::MalformedResponse("missing customer_code".into()))?;

    let total_points = customer
        .total_points
        .ok_or_else(|| RegistrationError::MalformedResponse("missing total_points".into()))?;

    let wallet_url = response
        .wallet_url
        .filter(|url| !url.trim().is_empty())
        .ok_or(RegistrationError::MissingWalletLink)?;

    if Url::parse(&wallet_url).is_err() {
        return Err(RegistrationError::MalformedResponse(format!(
            "wallet link is not an absolute URL: {}",
            wallet_url
        )));
    }

    debug!(customer_code = %customer_code, total_points, "Parsed registration response");

    Ok(RegistrationResult {
        customer_code,
        wallet_url,
        total_points,
    })
}
