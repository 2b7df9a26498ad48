//! Registration API types.

use serde::{Deserialize, Serialize};

/// Identity submitted for a new trainer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl RegistrationInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Whether every field holds something other than whitespace.
    ///
    /// The client never calls this itself; callers use it to guard submission.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.phone]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    /// Opaque server-issued identifier for the trainer.
    pub customer_code: String,
    /// Absolute link to the digital wallet pass.
    pub wallet_url: String,
    /// Point balance at registration time.
    pub total_points: u64,
}

/// Raw body returned by `POST /api/register`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    pub customer: Option<CustomerPayload>,
    #[serde(rename = "walletUrl")]
    pub wallet_url: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CustomerPayload {
    pub customer_code: Option<String>,
    pub total_points: Option<u64>,
}

/// Error body some backends return alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|message| !message.trim().is_empty())
    }
}
