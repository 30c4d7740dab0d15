//! Request headers and the identity the authenticating proxy forwards
//!
//! Data apps run behind a proxy that signs users in and forwards who they are
//! as request headers. Header names are matched case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header carrying the signed-in user's email
pub const USER_EMAIL_HEADER: &str = "X-Kbc-User-Email";

/// Header carrying the signed-in user's role ids (comma separated)
pub const USER_ROLES_HEADER: &str = "X-Kbc-User-Roles";

/// Header carrying the app origin
pub const ORIGIN_HEADER: &str = "Origin";

/// Proxy path that signs the user out
pub const SIGN_OUT_PATH: &str = "/_proxy/sign_out";

/// Headers of the current request, keyed case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeaders {
    inner: BTreeMap<String, String>,
}

impl RequestHeaders {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, replacing any previous value
    #[must_use]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a header, replacing any previous value
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Get a header value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check whether a header is present
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    /// Whether these headers were forwarded by the authenticating proxy
    pub fn is_proxied(&self) -> bool {
        self.contains(USER_EMAIL_HEADER)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterate over (lowercased name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Signed-in user email, if any
    pub fn user_email(&self) -> Option<&str> {
        self.get(USER_EMAIL_HEADER)
    }

    /// App origin, if any
    pub fn origin(&self) -> Option<&str> {
        self.get(ORIGIN_HEADER)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Who is using the app in this session
///
/// `token` is the opaque identity the proxy vouches for (the forwarded user
/// email). Its absence means the user is not authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub token: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SessionIdentity {
    /// An authenticated identity
    pub fn new(token: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            token: Some(token.into()),
            roles,
        }
    }

    /// An unauthenticated identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Derive the identity from forwarded request headers
    pub fn from_headers(headers: &RequestHeaders) -> Self {
        let token = headers
            .user_email()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let roles = headers
            .get(USER_ROLES_HEADER)
            .map(parse_roles)
            .unwrap_or_default();
        Self { token, roles }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Whether the exact role id is held (case-sensitive)
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Split a roles header into role ids
///
/// Accepts a comma separated list or a JSON array of strings. Surrounding
/// whitespace is dropped; ids are otherwise kept verbatim.
pub fn parse_roles(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            return list
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
