//! Error handling for TripGuard
//!
//! This module defines the main error types used throughout the engine
//! and provides a unified error handling strategy.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the TripGuard engine
#[derive(Error, Debug)]
pub enum TripGuardError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Trip not found: {trip_id}")]
    TripNotFound { trip_id: Uuid },

    #[error("Participant not found: trip {trip_id}, user {user_id}")]
    ParticipantNotFound { trip_id: Uuid, user_id: i64 },

    #[error("Invalid action '{action}' while trip is {status}: {reason}")]
    StateConflict {
        status: String,
        action: String,
        reason: String,
    },

    #[error("Notification delivery failed: {0}")]
    NotificationFailed(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TripGuard operations
pub type Result<T> = std::result::Result<T, TripGuardError>;

impl TripGuardError {
    /// Whether the error is worth retrying on the next scheduler tick.
    ///
    /// Transient errors (store unreachable, gateway timeouts) are logged at
    /// `warn` by the scheduler and retried; everything else is a logic or
    /// input problem that a retry will not fix.
    pub fn is_transient(&self) -> bool {
        match self {
            TripGuardError::Database(_) => true,
            TripGuardError::Http(_) => true,
            TripGuardError::Io(_) => true,
            TripGuardError::NotificationFailed(_) => true,
            TripGuardError::Migration(_) => false,
            TripGuardError::Config(_) => false,
            TripGuardError::Validation(_) => false,
            TripGuardError::PermissionDenied(_) => false,
            TripGuardError::TripNotFound { .. } => false,
            TripGuardError::ParticipantNotFound { .. } => false,
            TripGuardError::StateConflict { .. } => false,
            TripGuardError::Serialization(_) => false,
        }
    }

    /// Build a state-conflict error with a consistent shape.
    pub fn state_conflict(status: impl ToString, action: &str, reason: &str) -> Self {
        TripGuardError::StateConflict {
            status: status.to_string(),
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(!TripGuardError::Validation("eta before start".into()).is_transient());
        assert!(!TripGuardError::PermissionDenied("not the owner".into()).is_transient());
        assert!(TripGuardError::NotificationFailed("gateway 503".into()).is_transient());
    }

    #[test]
    fn test_state_conflict_message() {
        let err = TripGuardError::state_conflict("completed", "checkin", "trip already ended");
        let msg = err.to_string();
        assert!(msg.contains("checkin"));
        assert!(msg.contains("completed"));
        assert!(msg.contains("trip already ended"));
    }
}
