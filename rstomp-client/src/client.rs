//! High-level client API.

use crate::completion::ReceiptHandle;
use crate::config::ClientConfig;
use crate::connection::{self, SharedSession, TcpTransport};
use crate::error::ClientError;
use crate::factory::SessionFactory;
use crate::session::{Session, SessionHandler, SessionState};
use parking_lot::Mutex;
use rstomp_protocol::Decoder;
use std::sync::Arc;
use tokio::sync::watch;

/// High-level client for a STOMP broker.
///
/// Owns one session over one TCP connection. A background task reads from
/// the connection and drives the session. Dropping the client aborts the
/// connection.
pub struct Client<H: SessionHandler = ()> {
    config: ClientConfig,
    session: SharedSession<H>,
    state: watch::Receiver<SessionState>,
}

impl<H> Client<H>
where
    H: SessionHandler + Send + 'static,
{
    /// Connects to the broker and completes the STOMP handshake.
    pub async fn connect(config: ClientConfig, handler: H) -> Result<Self, ClientError> {
        config.validate()?;
        let (transport, reader) = connection::connect(&config).await?;
        let aborted = transport.aborted();

        let session: Session<TcpTransport, H> =
            SessionFactory::new(config.host.as_str()).open(transport, handler)?;
        tracing::debug!("session {} opened, waiting for CONNECTED", session.id());

        let (state_tx, state_rx) = watch::channel(session.state());
        let session = Arc::new(Mutex::new(session));
        tokio::spawn(connection::read_loop(
            reader,
            Decoder::with_codec(config.codec()),
            session.clone(),
            state_tx,
            aborted,
            config.read_buffer_size,
        ));

        let client = Self {
            config,
            session,
            state: state_rx,
        };
        client.wait_attached().await?;
        Ok(client)
    }

    async fn wait_attached(&self) -> Result<(), ClientError> {
        let mut state = self.state.clone();
        let attached = tokio::time::timeout(
            self.config.connect_timeout(),
            state.wait_for(|s| *s != SessionState::Connecting),
        )
        .await;

        let reached = match attached {
            Ok(Ok(reached)) => *reached,
            Ok(Err(_)) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::debug!("Handshake timeout");
                let _ = self.abort();
                return Err(ClientError::Timeout);
            }
        };

        if reached == SessionState::Established {
            return Ok(());
        }
        let session = self.session.lock();
        match session.handshake_error() {
            Some(error) => Err(ClientError::Rejected(
                error.message().unwrap_or("no reason given").to_string(),
            )),
            None => Err(ClientError::ConnectionClosed),
        }
    }

    /// Sends `payload` to `destination` without waiting for the receipt.
    pub fn send(
        &self,
        destination: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<ReceiptHandle, ClientError> {
        let mut session = self.session.lock();
        let result = session.send(destination, payload);
        if let Err(ref e) = result {
            if e.is_fatal() {
                let _ = session.abort();
            }
        }
        result
    }

    /// Sends `payload` to `destination` and waits for the broker's receipt.
    ///
    /// Gives up after the configured receipt timeout.
    pub async fn send_and_wait(
        &self,
        destination: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<(), ClientError> {
        let handle = self.send(destination, payload)?;
        let receipt_id = handle.receipt_id().to_string();

        match tokio::time::timeout(self.config.receipt_timeout(), handle).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("Request {} timed out", receipt_id);
                self.session.lock().cancel(&receipt_id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Asks the broker to end the session.
    pub fn detach(&self) -> Result<(), ClientError> {
        self.session.lock().detach()
    }

    /// Ends the session and waits for the connection to close.
    ///
    /// Closes the connection from this side if the broker does not within the
    /// connect timeout.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        tracing::debug!("Disconnecting...");
        self.detach()?;

        if tokio::time::timeout(self.config.connect_timeout(), self.closed())
            .await
            .is_err()
        {
            tracing::debug!("Broker kept the connection open, closing it");
            let _ = self.session.lock().close();
            self.closed().await;
        }
        Ok(())
    }

    /// Tears the connection down immediately.
    pub fn abort(&self) -> Result<(), ClientError> {
        self.session.lock().abort()
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state()
    }

    /// Number of requests still waiting for a receipt.
    pub fn pending_count(&self) -> usize {
        self.session.lock().pending_count()
    }

    /// Protocol version announced by the broker.
    pub fn server_version(&self) -> Option<String> {
        self.session.lock().server_version().map(str::to_string)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs `f` with the session handler.
    pub fn with_handler<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(self.session.lock().handler())
    }
}

impl<H: SessionHandler> Drop for Client<H> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        let _ = session.abort();
        // A gracefully closed transport still has a read loop waiting on the broker.
        if let Some(transport) = session.transport() {
            transport.stop_reading();
        }
    }
}
