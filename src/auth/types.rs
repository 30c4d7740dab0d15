//! Request authentication configuration
//!
//! How outgoing Storage API requests carry credentials.

use std::collections::BTreeMap;
use std::fmt;

/// Header the Storage API reads the token from
pub const STORAGE_TOKEN_HEADER: &str = "X-StorageApi-Token";

/// Authentication applied to outgoing requests
#[derive(Clone, Default)]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,

    /// Storage API token sent in [`STORAGE_TOKEN_HEADER`]
    StorageToken {
        /// The token value
        token: String,
    },

    /// Bearer token authentication
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Custom headers
    CustomHeaders {
        /// Headers to add to each request
        headers: BTreeMap<String, String>,
    },
}

impl AuthConfig {
    /// Storage API token auth
    pub fn storage_token(token: impl Into<String>) -> Self {
        Self::StorageToken {
            token: token.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// Tokens never show up in logs
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::StorageToken { .. } => f.write_str("StorageToken { token: \"***\" }"),
            Self::Bearer { .. } => f.write_str("Bearer { token: \"***\" }"),
            Self::CustomHeaders { headers } => f
                .debug_struct("CustomHeaders")
                .field("names", &headers.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}
