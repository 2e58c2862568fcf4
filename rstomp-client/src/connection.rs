//! TCP transport adapter.
//!
//! [`TcpTransport`] implements [`Transport`] over a tokio `TcpStream`. Writes
//! go through an unbounded channel to a writer task so that `send` never
//! blocks the session. [`read_loop`] feeds received bytes through a streaming
//! [`Decoder`] into the session, one message at a time.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{Session, SessionHandler, SessionState};
use crate::transport::{Transport, TransportHandler};
use bytes::Bytes;
use parking_lot::Mutex;
use rstomp_protocol::{Decoder, Message, StompCodec};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

enum WriteOp {
    Frame(Bytes),
    Close,
}

struct Shared {
    open: AtomicBool,
    aborted: Notify,
}

/// Transport over one TCP connection.
pub struct TcpTransport {
    codec: StompCodec,
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<WriteOp>,
    writer: JoinHandle<()>,
}

impl TcpTransport {
    /// Wraps the write half of a connection and spawns its writer task.
    pub fn new(writer: OwnedWriteHalf, codec: StompCodec) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            open: AtomicBool::new(true),
            aborted: Notify::new(),
        });
        let writer = tokio::spawn(write_loop(writer, rx, shared.clone()));
        Self {
            codec,
            shared,
            tx,
            writer,
        }
    }

    /// Wakes the read loop so that it stops waiting on the broker.
    pub fn stop_reading(&self) {
        self.shared.aborted.notify_one();
    }

    /// Resolves once the transport has been aborted.
    pub fn aborted(&self) -> impl Future<Output = ()> + Send + 'static {
        let shared = self.shared.clone();
        async move { shared.aborted.notified().await }
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, message: Message) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::TransportLost);
        }
        let encoded = message.serialize(&self.codec)?;
        tracing::debug!("sending {} ({} bytes)", message, encoded.len());
        self.tx
            .send(WriteOp::Frame(encoded))
            .map_err(|_| ClientError::TransportLost)
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if !self.shared.open.swap(false, Ordering::SeqCst) {
            return Err(ClientError::TransportLost);
        }
        tracing::debug!("closing transport");
        self.tx
            .send(WriteOp::Close)
            .map_err(|_| ClientError::TransportLost)
    }

    fn abort(&mut self) -> Result<(), ClientError> {
        if !self.shared.open.swap(false, Ordering::SeqCst) {
            return Err(ClientError::TransportLost);
        }
        tracing::debug!("aborting transport");
        // Queued frames are discarded with the writer task.
        self.writer.abort();
        self.stop_reading();
        Ok(())
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    shared: Arc<Shared>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Frame(encoded) => {
                if let Err(e) = writer.write_all(&encoded).await {
                    tracing::debug!("write_loop: write failed: {}", e);
                    break;
                }
            }
            WriteOp::Close => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("write_loop: shutdown failed: {}", e);
                }
                break;
            }
        }
    }
    shared.open.store(false, Ordering::SeqCst);
    tracing::debug!("write_loop finished");
}

/// Opens a TCP connection to the configured broker.
pub async fn connect(config: &ClientConfig) -> Result<(TcpTransport, OwnedReadHalf), ClientError> {
    tracing::debug!("Connecting to {}...", config.addr);

    let stream = tokio::time::timeout(
        config.connect_timeout(),
        TcpStream::connect(config.addr.as_str()),
    )
    .await
    .map_err(|_| {
        tracing::debug!("Connection timeout");
        ClientError::Timeout
    })?
    .map_err(|e| {
        tracing::debug!("Connection failed: {}", e);
        ClientError::Io(e)
    })?;

    stream.set_nodelay(true).ok();

    let (reader, writer) = stream.into_split();
    Ok((TcpTransport::new(writer, config.codec()), reader))
}

/// Session shared between the read loop and its owner.
pub type SharedSession<H> = Arc<Mutex<Session<TcpTransport, H>>>;

/// Reads from the connection and dispatches messages until it ends.
///
/// A fatal error aborts the transport. Either way the session is closed
/// before this returns and every state change is published on `state`.
pub async fn read_loop<H, F>(
    mut reader: OwnedReadHalf,
    mut decoder: Decoder,
    session: SharedSession<H>,
    state: watch::Sender<SessionState>,
    aborted: F,
    buffer_size: usize,
) where
    H: SessionHandler,
    F: Future<Output = ()>,
{
    tracing::debug!("read_loop started");
    tokio::pin!(aborted);
    let mut buf = vec![0u8; buffer_size];

    let was_clean = loop {
        let n = tokio::select! {
            _ = &mut aborted => {
                tracing::debug!("read_loop: transport aborted");
                break false;
            }
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::debug!("read_loop: connection closed");
                    break true;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!("read_loop: read failed: {}", e);
                    break false;
                }
            },
        };

        tracing::debug!("read_loop: received {} bytes", n);
        decoder.extend(&buf[..n]);

        if let Err(e) = dispatch(&mut decoder, &session) {
            tracing::warn!("read_loop: {}; aborting transport", e);
            let _ = session.lock().abort();
            break false;
        }
        state.send_replace(session.lock().state());
    };

    let mut session = session.lock();
    session.on_close(was_clean);
    state.send_replace(session.state());
    tracing::debug!("read_loop finished");
}

fn dispatch<H: SessionHandler>(
    decoder: &mut Decoder,
    session: &Mutex<Session<TcpTransport, H>>,
) -> Result<(), ClientError> {
    while let Some(message) = decoder.decode_message()? {
        session.lock().on_message(message)?;
    }
    Ok(())
}
