// Error handling for the playback controller and engine contract

use crate::state::{Command, PlaybackState};
use thiserror::Error;

/// Errors reported by a playback engine, either as a command result or
/// through the error callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Media source could not be opened or read
    #[error("Source error: {0}")]
    Source(String),

    /// Underlying decode/render failure
    #[error("Engine failure: {0}")]
    Failure(String),

    /// Command issued outside the engine's preconditions
    #[error("Cannot {operation} while engine is {status}")]
    InvalidState {
        operation: &'static str,
        status: String,
    },

    /// Engine resources were already freed
    #[error("Engine released")]
    Released,
}

/// Playback controller error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Bad or unreachable media URL
    #[error("Source error: {0}")]
    Source(String),

    /// Command is not valid for the current state
    #[error("Cannot {command} in state {state}")]
    EngineState {
        command: Command,
        state: PlaybackState,
    },

    /// Opaque decode/render failure
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// Controller was released
    #[error("Controller released")]
    Released,
}

impl From<EngineError> for PlaybackError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Source(msg) => PlaybackError::Source(msg),
            EngineError::Failure(msg) => PlaybackError::EngineFailure(msg),
            other => PlaybackError::EngineFailure(other.to_string()),
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
