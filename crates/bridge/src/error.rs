// Error handling for the method-channel bridge

use thiserror::Error;

/// Bridge error types, reported back to the calling side
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Method name is not of the form `audioplayer/<session>/<command>`
    #[error("Invalid audio player message: {0}")]
    InvalidMethod(String),

    /// Call addressed to a player this plugin does not own
    #[error("Unknown player session '{requested}' (this plugin serves {served})")]
    UnknownSession { requested: String, served: u64 },

    #[error("Command not implemented: {0}")]
    NotImplemented(String),

    /// Required argument absent or of the wrong type
    #[error("Missing or invalid argument '{0}'")]
    MissingArgument(&'static str),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
