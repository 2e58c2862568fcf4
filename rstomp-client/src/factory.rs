//! Session factory.

use crate::completion::Completion;
use crate::error::ClientError;
use crate::session::{Session, SessionHandler};
use crate::transport::{Transport, TransportHandler};

/// Creates sessions bound to one virtual host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFactory {
    host: String,
}

impl SessionFactory {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Creates an unconnected session.
    pub fn create<T, H, C>(&self, handler: H) -> Session<T, H, C>
    where
        T: Transport,
        H: SessionHandler,
        C: Completion,
    {
        Session::new(self.host.clone(), handler)
    }

    /// Creates a session and binds it to an already open transport.
    ///
    /// The CONNECT frame is sent before this returns.
    pub fn open<T, H, C>(&self, transport: T, handler: H) -> Result<Session<T, H, C>, ClientError>
    where
        T: Transport,
        H: SessionHandler,
        C: Completion,
    {
        let mut session = self.create(handler);
        session.on_open(transport)?;
        Ok(session)
    }
}
