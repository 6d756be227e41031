//! Error types for the Hetzner Cloud API client.

use thiserror::Error;

/// Errors raised by [`crate::hcloud::HcloudApi`].
///
/// Every variant is fatal to the provisioning run; this layer never retries.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HcloudError {
    /// The API accepted the request but returned a typed error envelope.
    #[error("hcloud API error ({code}): {message}")]
    Api {
        /// Machine-readable error code from the provider.
        code: String,
        /// Human-readable message from the provider.
        message: String,
    },
    /// The HTTP exchange itself failed (connection, TLS, timeout).
    #[error("hcloud request failed: {0}")]
    Http(String),
    /// The response body could not be decoded into the expected shape.
    #[error("unexpected response from hcloud API: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for HcloudError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}
