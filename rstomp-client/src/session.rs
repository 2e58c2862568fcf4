//! Session engine.
//!
//! One session wraps one transport and walks it through the STOMP lifecycle:
//!
//! ```text
//! UNCONNECTED --open--> CONNECTING --CONNECTED--> ESTABLISHED --detach--> DETACHING
//!                           |                          |                      |
//!                         ERROR                      close                  close
//!                           v                          v                      v
//!                        CLOSED                     CLOSED                 CLOSED
//! ```
//!
//! Receipted sends are tracked in a pending table keyed by receipt id. A
//! RECEIPT resolves its entry, a correlated ERROR rejects it. Any frame the
//! session cannot account for is a [`ProtocolError`]; after one the session
//! refuses further dispatch and its owner must abort the transport.

use crate::completion::{Completion, OneshotCompletion};
use crate::error::ClientError;
use crate::transport::{Transport, TransportHandler};
use rstomp_protocol::{
    ApplicationError, ConnectFrame, DisconnectFrame, ErrorFrame, Message, ProtocolError,
    SendFrame,
};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Error returned by a lifecycle hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a lifecycle hook.
pub type HookResult = Result<(), HookError>;

/// Application callbacks for session lifecycle events.
///
/// Failures are logged and never alter the session state.
pub trait SessionHandler {
    /// The broker accepted the session.
    fn on_attach(&mut self) -> HookResult {
        Ok(())
    }

    /// The session stopped being usable, or the broker refused it.
    fn on_detach(&mut self) -> HookResult {
        Ok(())
    }

    /// The underlying transport is gone.
    fn on_disconnect(&mut self) -> HookResult {
        Ok(())
    }
}

impl SessionHandler for () {}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Established,
    Detaching,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Established => "established",
            SessionState::Detaching => "detaching",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A STOMP session bound to at most one transport.
pub struct Session<T, H, C = OneshotCompletion> {
    id: String,
    host: String,
    state: SessionState,
    transport: Option<T>,
    handler: H,
    pending: HashMap<String, C>,
    next_receipt: u64,
    /// ESTABLISHED was reached at least once.
    attached: bool,
    /// A protocol violation was observed.
    failed: bool,
    /// `on_close` already ran.
    disconnected: bool,
    server_version: Option<String>,
    handshake_error: Option<ErrorFrame>,
}

impl<T, H, C> Session<T, H, C>
where
    T: Transport,
    H: SessionHandler,
    C: Completion,
{
    /// Creates an unconnected session for the given virtual host.
    pub fn new(host: impl Into<String>, handler: H) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            host: host.into(),
            state: SessionState::Unconnected,
            transport: None,
            handler,
            pending: HashMap::new(),
            next_receipt: 1,
            attached: false,
            failed: false,
            disconnected: false,
            server_version: None,
            handshake_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Returns whether a protocol violation stopped this session.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Protocol version announced in CONNECTED.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// The ERROR frame the broker refused the handshake with, if any.
    pub fn handshake_error(&self) -> Option<&ErrorFrame> {
        self.handshake_error.as_ref()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Number of requests still waiting for the broker.
    pub fn pending_count(&self) -> usize {
        self.pending.values().filter(|c| !c.is_cancelled()).count()
    }

    /// Sends `payload` to `destination` with a fresh receipt.
    ///
    /// Returns immediately; the handle completes when the broker answers. A
    /// message that cannot be built or encoded fails the session.
    pub fn send(
        &mut self,
        destination: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<C::Handle, ClientError> {
        self.ensure_usable()?;
        if self.state != SessionState::Established {
            return Err(ClientError::SessionNotReady("session not attached"));
        }
        self.prune_cancelled();

        let receipt_id = self.next_receipt_id();
        let sent = SendFrame::new(destination, payload, Some(receipt_id.clone()))
            .map_err(ClientError::from)
            .and_then(|frame| self.open_transport()?.send(frame.into()));
        if let Err(e) = sent {
            if e.is_fatal() {
                tracing::warn!("session {}: request {} failed: {}", self.id, receipt_id, e);
                self.failed = true;
            }
            return Err(e);
        }

        let (completion, handle) = C::new(&receipt_id);
        tracing::debug!("session {}: sent request {}", self.id, receipt_id);
        self.pending.insert(receipt_id, completion);
        Ok(handle)
    }

    /// Requests the end of the session.
    ///
    /// Receipts for requests already in flight are still delivered.
    pub fn detach(&mut self) -> Result<(), ClientError> {
        self.ensure_usable()?;
        match self.state {
            SessionState::Established => {}
            SessionState::Detaching => {
                return Err(ClientError::SessionNotReady(
                    "already requested to close the session",
                ))
            }
            _ => return Err(ClientError::SessionNotReady("session not attached")),
        }

        self.open_transport()?.send(DisconnectFrame::default().into())?;
        tracing::debug!("session {}: detaching", self.id);
        self.state = SessionState::Detaching;
        Ok(())
    }

    /// Drops interest in a pending request.
    ///
    /// Returns whether the request was pending. A later RECEIPT or ERROR for it
    /// is a protocol violation.
    pub fn cancel(&mut self, receipt_id: &str) -> bool {
        self.pending.remove(receipt_id).is_some()
    }

    /// Closes the transport gracefully.
    pub fn close(&mut self) -> Result<(), ClientError> {
        self.open_transport()?.close()
    }

    /// Tears the transport down after a fatal error.
    pub fn abort(&mut self) -> Result<(), ClientError> {
        tracing::debug!("session {}: aborting transport", self.id);
        self.open_transport()?.abort()
    }

    fn ensure_usable(&self) -> Result<(), ClientError> {
        if self.failed {
            return Err(ClientError::SessionNotReady(
                "session failed after a protocol error",
            ));
        }
        Ok(())
    }

    fn open_transport(&mut self) -> Result<&mut T, ClientError> {
        match self.transport.as_mut() {
            Some(transport) if transport.is_open() => Ok(transport),
            _ => Err(ClientError::TransportLost),
        }
    }

    fn next_receipt_id(&mut self) -> String {
        loop {
            let id = self.next_receipt.to_string();
            self.next_receipt = self.next_receipt.wrapping_add(1);
            if !self.pending.contains_key(&id) {
                return id;
            }
        }
    }

    fn prune_cancelled(&mut self) {
        self.pending.retain(|_, completion| !completion.is_cancelled());
    }

    fn take_pending(&mut self, receipt_id: &str) -> Option<C> {
        let completion = self.pending.remove(receipt_id)?;
        if completion.is_cancelled() {
            None
        } else {
            Some(completion)
        }
    }

    fn fail(&mut self, error: ProtocolError) -> ClientError {
        tracing::warn!("session {} ({}): {}", self.id, self.state, error);
        self.failed = true;
        ClientError::Protocol(error)
    }

    fn run_hook(&mut self, name: &str, hook: fn(&mut H) -> HookResult) {
        match panic::catch_unwind(AssertUnwindSafe(|| hook(&mut self.handler))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("session {}: {} hook failed: {}", self.id, name, e),
            Err(_) => tracing::warn!("session {}: {} hook panicked", self.id, name),
        }
    }

    fn handle_handshake(&mut self, message: Message) -> Result<(), ClientError> {
        match message {
            Message::Connected(connected) => {
                tracing::debug!(
                    "session {}: established (version {})",
                    self.id,
                    connected.version()
                );
                self.server_version = Some(connected.version().to_string());
                self.state = SessionState::Established;
                self.attached = true;
                self.run_hook("on_attach", H::on_attach);
                Ok(())
            }
            Message::Error(error) => {
                tracing::warn!(
                    "session {}: broker refused the session: {}",
                    self.id,
                    error.message().unwrap_or("no reason given")
                );
                self.handshake_error = Some(error);
                self.run_hook("on_detach", H::on_detach);
                if let Ok(transport) = self.open_transport() {
                    if let Err(e) = transport.close() {
                        tracing::debug!("session {}: close failed: {}", self.id, e);
                    }
                }
                self.state = SessionState::Closed;
                Ok(())
            }
            other => Err(self.fail(ProtocolError::UnexpectedFrame {
                command: other.command(),
                state: "session not yet established",
            })),
        }
    }

    fn handle_attached(&mut self, message: Message) -> Result<(), ClientError> {
        match message {
            Message::Receipt(receipt) => match self.take_pending(receipt.receipt_id()) {
                Some(completion) => {
                    tracing::debug!(
                        "session {}: request {} acknowledged",
                        self.id,
                        receipt.receipt_id()
                    );
                    completion.resolve();
                    Ok(())
                }
                None => Err(self.fail(ProtocolError::UnknownReceipt(
                    receipt.receipt_id().to_string(),
                ))),
            },
            Message::Error(error) => {
                let completion = error.receipt_id().and_then(|id| self.take_pending(id));
                match (completion, error.receipt_id()) {
                    (Some(completion), Some(receipt_id)) => {
                        tracing::debug!("session {}: request {} rejected", self.id, receipt_id);
                        completion.reject(ClientError::Application(ApplicationError {
                            receipt_id: receipt_id.to_string(),
                            message: error.message().map(str::to_string),
                            body: error.body().map(str::to_string),
                        }));
                        Ok(())
                    }
                    _ => Err(self.fail(ProtocolError::UnattributableError {
                        receipt_id: error.receipt_id().map(str::to_string),
                        message: error.message().map(str::to_string),
                    })),
                }
            }
            other => Err(self.fail(ProtocolError::UnexpectedFrame {
                command: other.command(),
                state: "session established",
            })),
        }
    }
}

impl<T, H, C> TransportHandler<T> for Session<T, H, C>
where
    T: Transport,
    H: SessionHandler,
    C: Completion,
{
    fn on_open(&mut self, transport: T) -> Result<(), ClientError> {
        if self.state != SessionState::Unconnected {
            return Err(ClientError::SessionNotReady("session already opened"));
        }
        self.transport = Some(transport);

        let connect = match ConnectFrame::new(self.host.as_str()) {
            Ok(connect) => connect,
            Err(e) => {
                self.failed = true;
                return Err(e.into());
            }
        };
        self.open_transport()?.send(connect.into())?;
        tracing::debug!("session {}: connecting to host {}", self.id, self.host);
        self.state = SessionState::Connecting;
        Ok(())
    }

    fn on_message(&mut self, message: Message) -> Result<(), ClientError> {
        self.ensure_usable()?;
        tracing::debug!("session {} ({}): received {}", self.id, self.state, message);
        match self.state {
            SessionState::Unconnected | SessionState::Connecting => {
                self.handle_handshake(message)
            }
            SessionState::Established | SessionState::Detaching => self.handle_attached(message),
            SessionState::Closed => Err(self.fail(ProtocolError::UnexpectedFrame {
                command: message.command(),
                state: "session closed",
            })),
        }
    }

    fn on_close(&mut self, was_clean: bool) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.transport = None;
        self.state = SessionState::Closed;
        tracing::debug!(
            "session {}: transport closed (clean: {}, {} pending)",
            self.id,
            was_clean,
            self.pending.len()
        );

        for (_, completion) in self.pending.drain() {
            completion.reject(ClientError::TransportLost);
        }

        if self.attached {
            self.run_hook("on_detach", H::on_detach);
        }
        self.run_hook("on_disconnect", H::on_disconnect);
    }
}

impl<T, H, C> fmt::Debug for Session<T, H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ReceiptHandle;
    use rstomp_protocol::{Command, ConnectedFrame, ReceiptFrame};
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Debug)]
    struct MockTransport {
        sent: Vec<Message>,
        open: bool,
        closed: bool,
        aborted: bool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                open: true,
                closed: false,
                aborted: false,
            }
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, message: Message) -> Result<(), ClientError> {
            if !self.open {
                return Err(ClientError::TransportLost);
            }
            self.sent.push(message);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) -> Result<(), ClientError> {
            self.open = false;
            self.closed = true;
            Ok(())
        }

        fn abort(&mut self) -> Result<(), ClientError> {
            self.open = false;
            self.aborted = true;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingHandler {
        events: Vec<&'static str>,
        fail_hooks: bool,
        panic_on_attach: bool,
    }

    impl RecordingHandler {
        fn record(&mut self, event: &'static str) -> HookResult {
            self.events.push(event);
            if self.fail_hooks {
                return Err(format!("{} failed", event).into());
            }
            Ok(())
        }
    }

    impl SessionHandler for RecordingHandler {
        fn on_attach(&mut self) -> HookResult {
            if self.panic_on_attach {
                panic!("boom");
            }
            self.record("attach")
        }

        fn on_detach(&mut self) -> HookResult {
            self.record("detach")
        }

        fn on_disconnect(&mut self) -> HookResult {
            self.record("disconnect")
        }
    }

    type TestSession = Session<MockTransport, RecordingHandler, OneshotCompletion>;

    fn connected() -> Message {
        ConnectedFrame::new("1.2").unwrap().into()
    }

    fn receipt(id: &str) -> Message {
        ReceiptFrame::new(id).unwrap().into()
    }

    fn error(message: &str, receipt_id: Option<&str>) -> Message {
        ErrorFrame::new(
            Some(message.to_string()),
            receipt_id.map(str::to_string),
            None,
        )
        .unwrap()
        .into()
    }

    fn opened() -> TestSession {
        let mut session = TestSession::new("broker", RecordingHandler::default());
        session.on_open(MockTransport::new()).unwrap();
        session
    }

    fn established() -> TestSession {
        let mut session = opened();
        session.on_message(connected()).unwrap();
        session
    }

    fn sent(session: &TestSession) -> &[Message] {
        &session.transport().unwrap().sent
    }

    fn receipt_of(message: &Message) -> String {
        match message {
            Message::Send(send) => send.receipt().unwrap().to_string(),
            other => panic!("expected SEND, got {}", other),
        }
    }

    #[test]
    fn test_open_sends_connect() {
        let session = opened();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(
            sent(&session),
            &[Message::from(ConnectFrame::new("broker").unwrap())]
        );
        assert!(session.handler().events.is_empty());
    }

    #[test]
    fn test_open_twice_rejected() {
        let mut session = opened();
        assert!(matches!(
            session.on_open(MockTransport::new()),
            Err(ClientError::SessionNotReady(_))
        ));
    }

    #[test]
    fn test_open_with_invalid_host_is_fatal() {
        let mut session = TestSession::new("", RecordingHandler::default());
        let err = session.on_open(MockTransport::new()).unwrap_err();
        assert!(err.is_fatal());
        assert!(session.is_failed());
        assert!(session.abort().is_ok());
        assert!(session.transport().unwrap().aborted);
    }

    #[test]
    fn test_connected_establishes() {
        let session = established();
        assert!(session.is_established());
        assert_eq!(session.server_version(), Some("1.2"));
        assert_eq!(session.handler().events, vec!["attach"]);
    }

    #[test]
    fn test_handshake_rejects_other_frames() {
        let mut session = opened();
        let err = session.on_message(receipt("1")).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnexpectedFrame {
                command: Command::Receipt,
                ..
            })
        ));
        assert!(session.is_failed());
        assert_eq!(session.state(), SessionState::Connecting);

        // No further dispatch after a violation.
        assert!(matches!(
            session.on_message(connected()),
            Err(ClientError::SessionNotReady(_))
        ));
        assert!(!session.is_established());

        session.abort().unwrap();
        assert!(session.transport().unwrap().aborted);
    }

    #[test]
    fn test_unconnected_handles_handshake_frames() {
        let mut session = TestSession::new("broker", RecordingHandler::default());
        session.on_message(connected()).unwrap();
        assert!(session.is_established());
    }

    #[test]
    fn test_handshake_error_closes() {
        let mut session = opened();
        session.on_message(error("bad credentials", None)).unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.handshake_error().and_then(|e| e.message()),
            Some("bad credentials")
        );
        assert!(session.transport().unwrap().closed);
        assert_eq!(session.handler().events, vec!["detach"]);

        session.on_close(true);
        assert_eq!(session.handler().events, vec!["detach", "disconnect"]);
    }

    #[test]
    fn test_send_requires_established() {
        let mut session = opened();
        assert!(matches!(
            session.send("/queue/a", "hello"),
            Err(ClientError::SessionNotReady(_))
        ));
        assert_eq!(sent(&session).len(), 1);
    }

    #[test]
    fn test_invalid_send_fails_session() {
        let mut session = established();
        let err = session.send("", "hello").unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(err.is_fatal());
        assert!(session.is_failed());
        assert_eq!(session.pending_count(), 0);
        assert_eq!(sent(&session).len(), 1);

        assert!(matches!(
            session.send("/queue/a", "hello"),
            Err(ClientError::SessionNotReady(_))
        ));
        assert!(session.abort().is_ok());
        assert!(session.transport().unwrap().aborted);
    }

    #[test]
    fn test_receipts_resolve_their_own_request() {
        let mut session = established();
        let first = session.send("/queue/a", "one").unwrap();
        let second = session.send("/queue/a", "two").unwrap();

        let first_id = receipt_of(&sent(&session)[1]);
        let second_id = receipt_of(&sent(&session)[2]);
        assert_ne!(first_id, second_id);
        assert_eq!(first.receipt_id(), first_id);
        assert_eq!(second.receipt_id(), second_id);
        assert_eq!(session.pending_count(), 2);

        let mut first = task::spawn(first);
        let mut second = task::spawn(second);
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        session.on_message(receipt(&first_id)).unwrap();
        assert!(assert_ready!(first.poll()).is_ok());
        assert_pending!(second.poll());
        assert_eq!(session.pending_count(), 1);

        session.on_message(receipt(&second_id)).unwrap();
        assert!(assert_ready!(second.poll()).is_ok());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_correlated_error_rejects_request() {
        let mut session = established();
        let handle = session.send("/queue/a", "one").unwrap();
        let other = session.send("/queue/a", "two").unwrap();
        let id = handle.receipt_id().to_string();

        session.on_message(error("queue full", Some(&id))).unwrap();
        assert!(session.is_established());
        assert!(!session.is_failed());

        let mut handle = task::spawn(handle);
        match assert_ready!(handle.poll()) {
            Err(ClientError::Application(e)) => {
                assert_eq!(e.receipt_id, id);
                assert_eq!(e.message.as_deref(), Some("queue full"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut other = task::spawn(other);
        assert_pending!(other.poll());
    }

    #[test]
    fn test_unattributable_frames_are_fatal() {
        let mut session = established();
        let _handle = session.send("/queue/a", "one").unwrap();
        assert!(matches!(
            session.on_message(error("oops", Some("999"))),
            Err(ClientError::Protocol(ProtocolError::UnattributableError { .. }))
        ));

        let mut session = established();
        assert!(matches!(
            session.on_message(error("oops", None)),
            Err(ClientError::Protocol(ProtocolError::UnattributableError { receipt_id: None, .. }))
        ));

        let mut session = established();
        assert!(matches!(
            session.on_message(receipt("7")),
            Err(ClientError::Protocol(ProtocolError::UnknownReceipt(id))) if id == "7"
        ));
        assert!(session.is_failed());
        assert!(matches!(
            session.send("/queue/a", "late"),
            Err(ClientError::SessionNotReady(_))
        ));
    }

    #[test]
    fn test_established_rejects_connected() {
        let mut session = established();
        assert!(matches!(
            session.on_message(connected()),
            Err(ClientError::Protocol(ProtocolError::UnexpectedFrame {
                command: Command::Connected,
                ..
            }))
        ));
    }

    #[test]
    fn test_dropped_handle_makes_receipt_unknown() {
        let mut session = established();
        let handle = session.send("/queue/a", "one").unwrap();
        let id = handle.receipt_id().to_string();
        drop(handle);

        assert_eq!(session.pending_count(), 0);
        assert!(matches!(
            session.on_message(receipt(&id)),
            Err(ClientError::Protocol(ProtocolError::UnknownReceipt(_)))
        ));
    }

    #[test]
    fn test_explicit_cancel() {
        let mut session = established();
        let handle = session.send("/queue/a", "one").unwrap();
        let id = handle.receipt_id().to_string();

        assert!(session.cancel(&id));
        assert!(!session.cancel(&id));

        let mut handle = task::spawn(handle);
        assert!(matches!(
            assert_ready!(handle.poll()),
            Err(ClientError::TransportLost)
        ));
    }

    #[test]
    fn test_detach() {
        let mut session = established();
        let handle = session.send("/queue/a", "one").unwrap();
        let id = handle.receipt_id().to_string();

        session.detach().unwrap();
        assert_eq!(session.state(), SessionState::Detaching);
        assert_eq!(
            sent(&session).last(),
            Some(&Message::from(DisconnectFrame::default()))
        );

        assert!(matches!(
            session.detach(),
            Err(ClientError::SessionNotReady(_))
        ));
        assert!(matches!(
            session.send("/queue/a", "two"),
            Err(ClientError::SessionNotReady(_))
        ));

        // In-flight receipts still arrive while detaching.
        session.on_message(receipt(&id)).unwrap();
        let mut handle = task::spawn(handle);
        assert!(assert_ready!(handle.poll()).is_ok());
    }

    #[test]
    fn test_detach_requires_established() {
        let mut session = opened();
        assert!(matches!(
            session.detach(),
            Err(ClientError::SessionNotReady(_))
        ));
    }

    #[test]
    fn test_close_after_established() {
        let mut session = established();
        let handle = session.send("/queue/a", "one").unwrap();

        session.on_close(false);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.transport().is_none());
        assert_eq!(
            session.handler().events,
            vec!["attach", "detach", "disconnect"]
        );

        let mut handle = task::spawn(handle);
        assert!(matches!(
            assert_ready!(handle.poll()),
            Err(ClientError::TransportLost)
        ));

        session.on_close(true);
        assert_eq!(session.handler().events.len(), 3);

        assert!(matches!(
            session.send("/queue/a", "two"),
            Err(ClientError::SessionNotReady(_))
        ));
    }

    #[test]
    fn test_close_before_established() {
        let mut session = opened();
        session.on_close(true);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.handler().events, vec!["disconnect"]);
    }

    #[test]
    fn test_hook_failures_do_not_change_state() {
        let handler = RecordingHandler {
            fail_hooks: true,
            ..Default::default()
        };
        let mut session = TestSession::new("broker", handler);
        session.on_open(MockTransport::new()).unwrap();
        session.on_message(connected()).unwrap();
        assert!(session.is_established());

        session.on_close(true);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.handler().events,
            vec!["attach", "detach", "disconnect"]
        );
    }

    #[test]
    fn test_hook_panic_is_contained() {
        let handler = RecordingHandler {
            panic_on_attach: true,
            ..Default::default()
        };
        let mut session = TestSession::new("broker", handler);
        session.on_open(MockTransport::new()).unwrap();
        session.on_message(connected()).unwrap();
        assert!(session.is_established());
    }

    #[test]
    fn test_send_on_closed_transport() {
        let mut session = established();
        session.close().unwrap();
        assert!(matches!(
            session.send("/queue/a", "one"),
            Err(ClientError::TransportLost)
        ));
        assert_eq!(session.pending_count(), 0);
        assert!(matches!(session.abort(), Err(ClientError::TransportLost)));
    }

    #[test]
    fn test_receipt_ids_skip_pending_entries() {
        let mut session = established();
        let first: ReceiptHandle = session.send("/queue/a", "one").unwrap();
        session.next_receipt = 1;
        let second = session.send("/queue/a", "two").unwrap();
        assert_ne!(first.receipt_id(), second.receipt_id());
    }
}
