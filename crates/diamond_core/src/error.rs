//! Error types for the match simulation.
//!
//! Almost nothing that happens during a live match is an error: missing
//! arsenals, defenders, or catchers degrade to documented defaults and
//! skipped special actions are reported as values. What remains here are
//! setup failures, data-file problems, and serialization issues.

use thiserror::Error;

use crate::player::PlayerId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for simulation setup and tooling.
#[derive(Debug, Error)]
pub enum SimError {
    /// A roster could not be used to start a match.
    #[error("Invalid roster for team '{team}': {reason}")]
    InvalidRoster {
        /// Team name or identifier.
        team: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A player reference that is not on either roster.
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    /// Data table parsing error.
    #[error("Failed to parse data table '{source_name}': {message}")]
    DataParse {
        /// Name of the table or file that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Configuration values outside their legal range.
    #[error("Invalid match configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot or replay (de)serialization failure.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A replay did not reproduce its recorded event log.
    #[error("Replay mismatch: expected log hash {expected:016x}, got {actual:016x}")]
    ReplayMismatch {
        /// Hash recorded when the replay was captured.
        expected: u64,
        /// Hash produced by re-running the match.
        actual: u64,
    },
}

/// Failure raised by an event listener.
///
/// The bus logs these and keeps dispatching; the match state is never
/// rolled back because a listener failed.
#[derive(Debug, Error)]
#[error("Listener '{listener}' failed: {message}")]
pub struct ListenerError {
    /// Listener name.
    pub listener: String,
    /// Error message.
    pub message: String,
}

impl ListenerError {
    /// Create a new listener error.
    pub fn new(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            listener: listener.into(),
            message: message.into(),
        }
    }
}

/// Failure raised by a telemetry or result sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's backing store rejected the write.
    #[error("Sink write failed: {0}")]
    Write(String),

    /// The sink is unavailable (closed, disconnected).
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::InvalidRoster {
            team: "Kobe".into(),
            reason: "lineup has 8 players".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid roster for team 'Kobe': lineup has 8 players"
        );

        let err = SimError::ReplayMismatch {
            expected: 0xAB,
            actual: 0xCD,
        };
        assert!(err.to_string().contains("00000000000000ab"));
    }
}
