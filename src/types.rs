//! Shared vocabulary: write modes, control placement and the messages a
//! render hands back to the host UI

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Backoff Type
// ============================================================================

/// Growth of the delay between Storage API retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    Constant,
    Linear,
    #[default]
    Exponential,
}

// ============================================================================
// Write Mode
// ============================================================================

/// How a frame is written into an existing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the table contents
    #[default]
    Overwrite,
    /// Append / upsert into the existing contents
    Incremental,
}

impl WriteMode {
    /// Build from the `is_incremental` flag used by the Storage API
    pub fn from_incremental(incremental: bool) -> Self {
        if incremental {
            Self::Incremental
        } else {
            Self::Overwrite
        }
    }

    /// Whether this mode keeps existing rows
    pub fn is_incremental(self) -> bool {
        matches!(self, Self::Incremental)
    }
}

// ============================================================================
// Placement
// ============================================================================

/// Where interactive controls are placed in the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Sidebar,
    Main,
}

impl Placement {
    /// Map the host framework's `sidebar` flag
    pub fn from_sidebar(sidebar: bool) -> Self {
        if sidebar {
            Self::Sidebar
        } else {
            Self::Main
        }
    }
}

// ============================================================================
// User Messages
// ============================================================================

/// Severity of a message shown to the app user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A message the host should render for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl UserMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }

    /// Whether this is an error message
    pub fn is_error(&self) -> bool {
        self.level == MessageLevel::Error
    }
}

impl fmt::Display for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            MessageLevel::Info => "info",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.text)
    }
}

/// A value produced for the UI together with the messages to render next to it
///
/// Data-access failures end up here as error messages instead of propagating
/// into the host's render loop.
#[derive(Debug, Clone, Default)]
pub struct Reported<T> {
    pub value: T,
    pub messages: Vec<UserMessage>,
}

impl<T> Reported<T> {
    /// A value with no messages
    pub fn ok(value: T) -> Self {
        Self {
            value,
            messages: Vec::new(),
        }
    }

    /// A fallback value with a single error message
    pub fn failed(value: T, message: impl Into<String>) -> Self {
        Self {
            value,
            messages: vec![UserMessage::error(message)],
        }
    }

    /// Whether any error message was reported
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(UserMessage::is_error)
    }
}
