//! Error types for file-taxes
//!
//! Centralized error handling using thiserror. Component errors
//! (`CodecError`, `TransportError`, `AuthError`) live next to the code that
//! raises them and convert into `FilerError` at run level.

use thiserror::Error;

use crate::auth::AuthError;
use crate::codec::CodecError;
use crate::domain::report::UNREGISTERED_CATEGORY;
use crate::session::TransportError;

/// All run-level errors that can occur in file-taxes
#[derive(Debug, Error)]
pub enum FilerError {
    /// Network or HTTP failure talking to the portal
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed token envelope
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Login failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// An obligation was detected that no handler is registered for
    #[error("No handler registered for {0}")]
    UnregisteredObligation(String),

    /// The portal answered with something we cannot interpret
    #[error("Unexpected portal response: {0}")]
    Portal(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FilerError {
    /// Short failure category used in the final log line and notification
    pub fn category(&self) -> &'static str {
        match self {
            FilerError::Transport(_) => "transport",
            FilerError::Codec(_) => "codec",
            FilerError::Auth(AuthError::Transport(_)) => "transport",
            FilerError::Auth(_) => "auth",
            FilerError::UnregisteredObligation(_) => UNREGISTERED_CATEGORY,
            FilerError::Portal(_) => "portal",
            FilerError::Config(_) => "config",
            FilerError::Io(_) => "io",
            FilerError::Json(_) => "json",
        }
    }
}

/// Result type alias for file-taxes operations
pub type Result<T> = std::result::Result<T, FilerError>;
