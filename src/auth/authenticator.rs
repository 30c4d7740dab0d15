//! Authenticator implementation
//!
//! Applies the configured credentials to outgoing requests.

use super::types::{AuthConfig, STORAGE_TOKEN_HEADER};
use reqwest::RequestBuilder;

/// Authenticator handles applying authentication to HTTP requests
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// The configured credentials
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Apply authentication to a request builder
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config {
            AuthConfig::None => req,
            AuthConfig::StorageToken { token } => req.header(STORAGE_TOKEN_HEADER, token),
            AuthConfig::Bearer { token } => req.bearer_auth(token),
            AuthConfig::CustomHeaders { headers } => headers
                .iter()
                .fold(req, |req, (key, value)| req.header(key.as_str(), value.as_str())),
        }
    }
}
