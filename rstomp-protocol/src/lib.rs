//! # rstomp-protocol
//!
//! Wire protocol implementation for rstomp, a STOMP 1.2 client subset.
//!
//! This crate provides:
//! - Text framing with NUL terminators and synthesized `content-length`
//! - Typed messages with validation and a per-message serialization cache
//! - A streaming decoder for byte-stream transports
//! - Protocol, validation and application error types

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Serializer, StompCodec};
pub use error::{ApplicationError, ProtocolError, ValidationError};
pub use frame::{Command, Frame, FrameWriter, HeaderMap};
pub use message::{
    ConnectFrame, ConnectedFrame, DisconnectFrame, ErrorFrame, Message, MessageType,
    ReceiptFrame, SendFrame, StompFrame,
};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: &str = "1.2";

/// Default broker port for plain STOMP.
pub const DEFAULT_PORT: u16 = 61613;

/// Maximum frame size, terminator included (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
