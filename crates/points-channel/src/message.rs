//! Push channel wire messages.

use crate::error::ChannelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Handshake binding the connection to a customer code.
    Register {
        #[serde(rename = "customerCode")]
        customer_code: String,
    },
}

impl OutboundMessage {
    pub fn register(customer_code: impl Into<String>) -> Self {
        Self::Register {
            customer_code: customer_code.into(),
        }
    }

    pub fn encode(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Message pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    PointsUpdate { points: u64 },
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// Returns `Ok(None)` for well-formed JSON whose `type` is not one we
    /// understand, and an error for anything else that cannot be decoded.
    pub fn decode(text: &str) -> Result<Option<Self>, ChannelError> {
        let value: Value = serde_json::from_str(text)?;

        match value.get("type").and_then(Value::as_str) {
            Some("points_update") => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }
}
