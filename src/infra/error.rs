//! Error taxonomy for the route engine
//!
//! Every surfaced failure maps to one of these kinds. Display messages
//! are non-technical so the presentation layer can show them directly.

use crate::domain::SessionState;
use thiserror::Error;

/// The main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Location access was denied or never granted
    #[error("location access has not been granted")]
    PermissionDenied,

    /// A bounded operation did not complete in time
    #[error("{operation} took too long to complete")]
    TimedOut {
        /// Description of the operation that timed out
        operation: String,
    },

    /// A backing data source could not be reached; any previous snapshot
    /// stays active
    #[error("the route information service is currently unavailable")]
    SourceUnavailable {
        /// Underlying cause, for logs
        reason: String,
    },

    /// The chosen route id is not part of the current match result
    #[error("the chosen route is no longer available, please search again")]
    InvalidSelection {
        /// The id the caller asked for
        route_id: String,
    },

    /// A session event arrived in a state that does not accept it
    #[error("that action is not possible right now")]
    InvalidTransition {
        /// State the session was in when the event arrived
        from: SessionState,
        /// Name of the rejected event
        event: &'static str,
    },

    /// A navigation session is already in progress on this device
    #[error("a navigation session is already in progress")]
    SessionAlreadyActive,

    /// The query matched no routes; the session stays idle
    #[error("no suitable route was found nearby")]
    NoRouteFound,

    /// Saved places could not be read or written
    #[error("saved places could not be updated")]
    StorageFailure {
        /// Underlying cause, for logs
        reason: String,
    },
}

/// A specialized Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    #[must_use]
    pub fn timed_out(operation: impl Into<String>) -> Self {
        Self::TimedOut { operation: operation.into() }
    }

    #[must_use]
    pub fn source_unavailable(reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { reason: reason.into() }
    }

    #[must_use]
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::StorageFailure { reason: reason.into() }
    }

    #[must_use]
    pub fn invalid_transition(from: SessionState, event: &'static str) -> Self {
        Self::InvalidTransition { from, event }
    }

    /// Whether this error indicates a caller bug rather than an
    /// environmental failure; these are never retried automatically
    #[must_use]
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelection { .. }
                | Self::InvalidTransition { .. }
                | Self::SessionAlreadyActive
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(err.to_string())
    }
}
