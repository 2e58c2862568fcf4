//! Protocol error types.

use crate::frame::Command;
use std::fmt;
use thiserror::Error;

/// Errors raised when a peer violates the wire grammar or the session protocol.
///
/// Every variant is fatal to the session that observed it: once the codec and
/// the peer disagree about framing there is no way to resynchronize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("binary payload received, but the STOMP codec is text-only")]
    BinaryPayload,

    #[error("frame is not NUL-terminated")]
    MissingTerminator,

    #[error("invalid UTF-8 in frame")]
    InvalidUtf8,

    #[error("no blank line between headers and body")]
    MissingSeparator,

    #[error("invalid STOMP command: {0:?}")]
    UnknownCommand(String),

    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),

    #[error("missing {header} header in {command}")]
    MissingHeader {
        command: Command,
        header: &'static str,
    },

    #[error("missing body in {0}")]
    MissingBody(Command),

    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationError),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("received {command} while {state}")]
    UnexpectedFrame {
        command: Command,
        state: &'static str,
    },

    #[error("RECEIPT received for non-pending request {0}")]
    UnknownReceipt(String),

    #[error("ERROR received for non-pending request {receipt_id:?}: {message:?}")]
    UnattributableError {
        receipt_id: Option<String>,
        message: Option<String>,
    },
}

/// Raised when a message is constructed with missing or malformed fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{command} requires a non-empty {field}")]
    EmptyField {
        command: Command,
        field: &'static str,
    },

    #[error("{command} {field} contains a line break or NUL byte")]
    IllegalCharacter {
        command: Command,
        field: &'static str,
    },
}

/// A broker ERROR correlated to one specific request.
///
/// Unlike [`ProtocolError`] this only fails the request it names; the session
/// and every other pending request are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    /// Receipt id of the rejected request.
    pub receipt_id: String,
    /// Short description from the `message` header.
    pub message: Option<String>,
    /// Detailed description from the frame body.
    pub body: Option<String>,
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {} rejected", self.receipt_id)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(ref body) = self.body {
            if !body.is_empty() {
                write!(f, " ({})", body.trim_end())?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApplicationError {}
