//! Unified error handling for the podium crate
//!
//! Domain modules define their own error enums; this module wraps them into
//! a single [`Error`] for callers that route everything through one result
//! type, and carries the retryability classification the selection and
//! lookup contracts promise: transient conditions are distinguishable from
//! permanent configuration gaps.

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::config::ConfigError;
pub use crate::presence::PresenceError;
pub use crate::selector::SelectionError;
pub use crate::services::LookupError;

/// Result type for podium operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Presence subscription error
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// Bridge selection error
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Instance lookup error
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl Error {
    /// Whether the operation may succeed on retry
    ///
    /// Empty pools are transient; configuration gaps are permanent.
    /// Presence failures are left to the external connection's retry logic
    /// and count as retryable here.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Presence(_) => true,
            Self::Selection(e) => e.is_retryable(),
            Self::Lookup(e) => e.is_retryable(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
