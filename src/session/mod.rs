//! Session state and secrets
//!
//! The host gives every UI session:
//! - a [`SessionStore`], a key-value store that survives re-renders within
//!   the session and carries the render generation used to drop stale renders
//! - read access to secrets through a [`SecretsProvider`]

mod secrets;
mod store;

pub use secrets::{EnvSecrets, LayeredSecrets, Secrets, SecretsProvider};
pub use store::SessionStore;

#[cfg(test)]
mod tests;
