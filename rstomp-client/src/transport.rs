//! Transport capability.
//!
//! A transport is a reliable, ordered, full-duplex message pipe. The session
//! engine consumes it through [`Transport`] and is driven by it through
//! [`TransportHandler`]; it never performs raw I/O itself.

use crate::error::ClientError;
use rstomp_protocol::Message;

/// Operations the session engine performs on its transport.
pub trait Transport {
    /// Queues a message for delivery.
    ///
    /// Fails with [`ClientError::TransportLost`] when the transport is not open.
    fn send(&mut self, message: Message) -> Result<(), ClientError>;

    /// Returns whether messages can still be sent.
    fn is_open(&self) -> bool;

    /// Closes the transport gracefully.
    fn close(&mut self) -> Result<(), ClientError>;

    /// Tears the transport down immediately, after a fatal protocol error.
    fn abort(&mut self) -> Result<(), ClientError>;
}

/// Events a transport delivers to whatever it is bound to.
pub trait TransportHandler<T: Transport> {
    /// The transport has been established.
    fn on_open(&mut self, transport: T) -> Result<(), ClientError>;

    /// A complete message has been received.
    ///
    /// Calls for one transport never overlap.
    fn on_message(&mut self, message: Message) -> Result<(), ClientError>;

    /// The transport has been closed or lost.
    fn on_close(&mut self, was_clean: bool);
}
