//! Authentication and authorization
//!
//! Two sides of the same concern:
//!
//! - **Inbound**: the identity forwarded by the sign-in proxy
//!   ([`SessionIdentity`]) and the [`AuthGate`] that decides whether that
//!   identity may use the app.
//! - **Outbound**: the [`Authenticator`] that attaches the Storage API token
//!   to every request.

mod authenticator;
mod gate;
mod identity;
mod types;

pub use authenticator::Authenticator;
pub use gate::{check, AuthGate, Decision, DenyReason};
pub use identity::{
    parse_roles, RequestHeaders, SessionIdentity, ORIGIN_HEADER, SIGN_OUT_PATH,
    USER_EMAIL_HEADER, USER_ROLES_HEADER,
};
pub use types::{AuthConfig, STORAGE_TOKEN_HEADER};

#[cfg(test)]
mod tests;
