//! Authorization gate
//!
//! Decides whether the current user may use the app. Role gating is opt-in:
//! without a required role any authenticated user is allowed. Role ids are
//! compared exactly (case-sensitive, no normalization).

use super::identity::SessionIdentity;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No identity was forwarded for this session
    Unauthenticated,
    /// The user lacks the required role
    InsufficientRole,
}

impl DenyReason {
    /// Message shown to the user before the app stops
    pub fn user_message(self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "You are not signed in. Please log in to use this app.",
            DenyReason::InsufficientRole => "You are not authorised to use this app.",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => f.write_str("unauthenticated"),
            DenyReason::InsufficientRole => f.write_str("insufficient role"),
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert into a result; a denial becomes the render-halting error
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(Error::access_denied(reason)),
        }
    }
}

/// Check access from the raw inputs
///
/// A blank `required_role` counts as unset.
pub fn check<S: AsRef<str>>(
    token_present: bool,
    roles: &[S],
    required_role: Option<&str>,
) -> Decision {
    if !token_present {
        return Decision::Deny(DenyReason::Unauthenticated);
    }

    match required_role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Decision::Allow,
        Some(required) if roles.iter().any(|r| r.as_ref() == required) => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::InsufficientRole),
    }
}

/// Authorization gate configured with the app's required role
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    required_role: Option<String>,
}

impl AuthGate {
    /// Create a gate; `None` or a blank role disables role gating
    pub fn new(required_role: Option<String>) -> Self {
        Self {
            required_role: required_role
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        }
    }

    /// A gate requiring the given role
    pub fn with_role(role: impl Into<String>) -> Self {
        Self::new(Some(role.into()))
    }

    /// A gate that only requires authentication
    pub fn open() -> Self {
        Self::default()
    }

    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    /// Check an identity against the gate
    pub fn check(&self, identity: &SessionIdentity) -> Decision {
        check(
            identity.is_authenticated(),
            &identity.roles,
            self.required_role(),
        )
    }

    /// Check an identity and halt on denial
    ///
    /// Returns [`Error::AccessDenied`] when access is denied; the caller must
    /// stop rendering and show [`DenyReason::user_message`].
    pub fn enforce(&self, identity: &SessionIdentity) -> Result<()> {
        let decision = self.check(identity);
        match decision {
            Decision::Allow => {
                debug!(
                    required_role = ?self.required_role,
                    "Access granted"
                );
            }
            Decision::Deny(reason) => {
                warn!(
                    %reason,
                    required_role = ?self.required_role,
                    roles = ?identity.roles,
                    "Access denied: {}",
                    reason.user_message()
                );
            }
        }
        decision.into_result()
    }
}
