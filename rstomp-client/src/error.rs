//! Client error types.

use crate::config::ConfigError;
use rstomp_protocol::{ApplicationError, ProtocolError, ValidationError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("server error: {0}")]
    Application(#[from] ApplicationError),

    #[error("broker rejected the session: {0}")]
    Rejected(String),

    #[error("transport lost")]
    TransportLost,

    #[error("session not ready: {0}")]
    SessionNotReady(&'static str),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Returns whether this error desynchronizes the session.
    ///
    /// The owner of the session must abort the transport after a fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Protocol(_) | ClientError::Validation(_))
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Timeout
                | ClientError::ConnectionClosed
                | ClientError::TransportLost
        )
    }
}
