//! Push endpoint derivation.

use crate::error::ChannelError;
use tokio_tungstenite::tungstenite::http::Uri;

/// Derive the push endpoint from the HTTP base the registration API lives on.
///
/// The endpoint sits at the host root and mirrors the base's transport
/// security: `https` maps to `wss`, `http` to `ws`.
pub fn push_endpoint(base_url: &str) -> Result<String, ChannelError> {
    let uri: Uri = base_url
        .parse()
        .map_err(|e| ChannelError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    let scheme = match uri.scheme_str() {
        Some("https") | Some("wss") => "wss",
        Some("http") | Some("ws") => "ws",
        Some(other) => {
            return Err(ChannelError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, base_url
            )))
        }
        None => {
            return Err(ChannelError::InvalidUrl(format!(
                "missing scheme in {}",
                base_url
            )))
        }
    };

    let authority = uri
        .authority()
        .ok_or_else(|| ChannelError::InvalidUrl(format!("missing host in {}", base_url)))?;

    Ok(format!("{}://{}/", scheme, authority))
}
