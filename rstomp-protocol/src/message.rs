//! Typed STOMP messages.
//!
//! Each supported command has its own frame type holding exactly the fields
//! the command defines. Constructors validate eagerly, so an invalid message
//! is never observable. Every message also carries a serialization cache that
//! is populated on first [`Message::serialize`] and ignored by equality.

use crate::codec::Serializer;
use crate::error::{ProtocolError, ValidationError};
use crate::frame::{Command, Frame, HeaderMap};
use bytes::Bytes;
use std::fmt;
use std::sync::OnceLock;

/// Protocol version offered by CONNECT when none is given.
pub const DEFAULT_ACCEPT_VERSION: &str = "1.2";

/// Lazily populated wire bytes of a message.
#[derive(Debug, Clone, Default)]
struct Cache(OnceLock<Bytes>);

// Equality of messages covers declared fields only.
impl PartialEq for Cache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Cache {}

/// Per-command marshal/parse contract.
pub trait MessageType: Sized {
    /// Command this type is encoded as.
    const COMMAND: Command;

    /// Builds a message from decoded headers and body.
    ///
    /// Fails with [`ProtocolError::MissingHeader`] naming the first mandatory
    /// header that is absent.
    fn parse(headers: &HeaderMap, body: Option<String>) -> Result<Self, ProtocolError>;

    /// Projects the message onto its untyped frame.
    fn marshal(&self) -> Frame;
}

fn header_value(
    command: Command,
    field: &'static str,
    value: String,
) -> Result<String, ValidationError> {
    if value.contains(['\n', '\r', '\0']) {
        return Err(ValidationError::IllegalCharacter { command, field });
    }
    Ok(value)
}

fn required(
    command: Command,
    field: &'static str,
    value: String,
) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField { command, field });
    }
    header_value(command, field, value)
}

fn optional(
    command: Command,
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    value.map(|v| header_value(command, field, v)).transpose()
}

fn body_value(command: Command, value: String) -> Result<String, ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::IllegalCharacter {
            command,
            field: "body",
        });
    }
    Ok(value)
}

fn required_header(
    headers: &HeaderMap,
    command: Command,
    header: &'static str,
) -> Result<String, ProtocolError> {
    headers
        .get(header)
        .map(str::to_string)
        .ok_or(ProtocolError::MissingHeader { command, header })
}

/// Mandatory header of a decoded frame.
///
/// Decoded values are held to a looser rule than constructed ones: lines are
/// already split, so a stray `\r` is accepted and only NUL is refused.
fn decoded_header(
    headers: &HeaderMap,
    command: Command,
    header: &'static str,
) -> Result<String, ProtocolError> {
    let value = required_header(headers, command, header)?;
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            command,
            field: header,
        }
        .into());
    }
    decoded_value(command, header, value)
}

fn decoded_optional(
    headers: &HeaderMap,
    command: Command,
    header: &'static str,
) -> Result<Option<String>, ProtocolError> {
    optional_header(headers, header)
        .map(|v| decoded_value(command, header, v))
        .transpose()
}

fn decoded_value(
    command: Command,
    field: &'static str,
    value: String,
) -> Result<String, ProtocolError> {
    if value.contains('\0') {
        return Err(ValidationError::IllegalCharacter { command, field }.into());
    }
    Ok(value)
}

fn optional_header(headers: &HeaderMap, header: &str) -> Option<String> {
    headers.get(header).map(str::to_string)
}

/// STOMP connect request (the STOMP 1.2 spelling of CONNECT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    host: String,
    accept_version: String,
    cache: Cache,
}

impl StompFrame {
    pub fn new(
        host: impl Into<String>,
        accept_version: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            host: required(Command::Stomp, "host", host.into())?,
            accept_version: required(Command::Stomp, "accept-version", accept_version.into())?,
            cache: Cache::default(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn accept_version(&self) -> &str {
        &self.accept_version
    }
}

impl MessageType for StompFrame {
    const COMMAND: Command = Command::Stomp;

    fn parse(headers: &HeaderMap, _body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            host: decoded_header(headers, Self::COMMAND, "host")?,
            accept_version: decoded_header(headers, Self::COMMAND, "accept-version")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        Frame::new(Self::COMMAND)
            .with_header("host", self.host.as_str())
            .with_header("accept-version", self.accept_version.as_str())
    }
}

/// Client connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFrame {
    host: String,
    accept_version: Option<String>,
    cache: Cache,
}

impl ConnectFrame {
    /// Creates a CONNECT offering [`DEFAULT_ACCEPT_VERSION`].
    pub fn new(host: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_accept_version(host, Some(DEFAULT_ACCEPT_VERSION.to_string()))
    }

    /// Creates a CONNECT with an explicit (or no) `accept-version` header.
    pub fn with_accept_version(
        host: impl Into<String>,
        accept_version: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            host: required(Command::Connect, "host", host.into())?,
            accept_version: optional(Command::Connect, "accept-version", accept_version)?,
            cache: Cache::default(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn accept_version(&self) -> Option<&str> {
        self.accept_version.as_deref()
    }
}

impl MessageType for ConnectFrame {
    const COMMAND: Command = Command::Connect;

    fn parse(headers: &HeaderMap, _body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            host: decoded_header(headers, Self::COMMAND, "host")?,
            accept_version: decoded_optional(headers, Self::COMMAND, "accept-version")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        let frame = Frame::new(Self::COMMAND).with_header("host", self.host.as_str());
        match self.accept_version {
            Some(ref version) => frame.with_header("accept-version", version.as_str()),
            None => frame,
        }
    }
}

/// Broker reply accepting a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedFrame {
    version: String,
    cache: Cache,
}

impl ConnectedFrame {
    pub fn new(version: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            version: required(Command::Connected, "version", version.into())?,
            cache: Cache::default(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl MessageType for ConnectedFrame {
    const COMMAND: Command = Command::Connected;

    fn parse(headers: &HeaderMap, _body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: decoded_header(headers, Self::COMMAND, "version")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        Frame::new(Self::COMMAND).with_header("version", self.version.as_str())
    }
}

/// Message published to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFrame {
    destination: String,
    body: String,
    receipt: Option<String>,
    cache: Cache,
}

impl SendFrame {
    /// Creates a SEND. The body is mandatory but may be empty.
    pub fn new(
        destination: impl Into<String>,
        body: impl Into<String>,
        receipt: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            destination: required(Command::Send, "destination", destination.into())?,
            body: body_value(Command::Send, body.into())?,
            receipt: optional(Command::Send, "receipt", receipt)?,
            cache: Cache::default(),
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn receipt(&self) -> Option<&str> {
        self.receipt.as_deref()
    }
}

impl MessageType for SendFrame {
    const COMMAND: Command = Command::Send;

    fn parse(headers: &HeaderMap, body: Option<String>) -> Result<Self, ProtocolError> {
        let destination = decoded_header(headers, Self::COMMAND, "destination")?;
        let body = body.ok_or(ProtocolError::MissingBody(Self::COMMAND))?;
        Ok(Self {
            destination,
            body: body_value(Self::COMMAND, body)?,
            receipt: decoded_optional(headers, Self::COMMAND, "receipt")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        let frame = Frame::new(Self::COMMAND).with_header("destination", self.destination.as_str());
        let frame = match self.receipt {
            Some(ref receipt) => frame.with_header("receipt", receipt.as_str()),
            None => frame,
        };
        frame.with_body(self.body.as_str())
    }
}

/// Broker error report. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    message: Option<String>,
    receipt_id: Option<String>,
    body: Option<String>,
    cache: Cache,
}

impl ErrorFrame {
    pub fn new(
        message: Option<String>,
        receipt_id: Option<String>,
        body: Option<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            message: optional(Command::Error, "message", message)?,
            receipt_id: optional(Command::Error, "receipt-id", receipt_id)?,
            body: body.map(|b| body_value(Command::Error, b)).transpose()?,
            cache: Cache::default(),
        })
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl MessageType for ErrorFrame {
    const COMMAND: Command = Command::Error;

    fn parse(headers: &HeaderMap, body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            message: decoded_optional(headers, Self::COMMAND, "message")?,
            receipt_id: decoded_optional(headers, Self::COMMAND, "receipt-id")?,
            body: body.map(|b| body_value(Self::COMMAND, b)).transpose()?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        let mut frame = Frame::new(Self::COMMAND);
        if let Some(ref message) = self.message {
            frame = frame.with_header("message", message.as_str());
        }
        if let Some(ref receipt_id) = self.receipt_id {
            frame = frame.with_header("receipt-id", receipt_id.as_str());
        }
        if let Some(ref body) = self.body {
            frame = frame.with_body(body.as_str());
        }
        frame
    }
}

/// Broker acknowledgment of a request that asked for a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFrame {
    receipt_id: String,
    cache: Cache,
}

impl ReceiptFrame {
    pub fn new(receipt_id: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            receipt_id: required(Command::Receipt, "receipt-id", receipt_id.into())?,
            cache: Cache::default(),
        })
    }

    pub fn receipt_id(&self) -> &str {
        &self.receipt_id
    }
}

impl MessageType for ReceiptFrame {
    const COMMAND: Command = Command::Receipt;

    fn parse(headers: &HeaderMap, _body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            receipt_id: decoded_header(headers, Self::COMMAND, "receipt-id")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        Frame::new(Self::COMMAND).with_header("receipt-id", self.receipt_id.as_str())
    }
}

/// Graceful end of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectFrame {
    receipt: Option<String>,
    cache: Cache,
}

impl DisconnectFrame {
    pub fn new(receipt: Option<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            receipt: optional(Command::Disconnect, "receipt", receipt)?,
            cache: Cache::default(),
        })
    }

    pub fn receipt(&self) -> Option<&str> {
        self.receipt.as_deref()
    }
}

impl MessageType for DisconnectFrame {
    const COMMAND: Command = Command::Disconnect;

    fn parse(headers: &HeaderMap, _body: Option<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            receipt: decoded_optional(headers, Self::COMMAND, "receipt")?,
            cache: Cache::default(),
        })
    }

    fn marshal(&self) -> Frame {
        let frame = Frame::new(Self::COMMAND);
        match self.receipt {
            Some(ref receipt) => frame.with_header("receipt", receipt.as_str()),
            None => frame,
        }
    }
}

/// Any STOMP message of the supported subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Stomp(StompFrame),
    Connect(ConnectFrame),
    Connected(ConnectedFrame),
    Send(SendFrame),
    Error(ErrorFrame),
    Receipt(ReceiptFrame),
    Disconnect(DisconnectFrame),
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Stomp(_) => Command::Stomp,
            Message::Connect(_) => Command::Connect,
            Message::Connected(_) => Command::Connected,
            Message::Send(_) => Command::Send,
            Message::Error(_) => Command::Error,
            Message::Receipt(_) => Command::Receipt,
            Message::Disconnect(_) => Command::Disconnect,
        }
    }

    /// Builds the typed message for a decoded frame.
    pub fn parse(frame: Frame) -> Result<Self, ProtocolError> {
        let Frame {
            command,
            headers,
            body,
        } = frame;
        let message = match command {
            Command::Stomp => Message::Stomp(StompFrame::parse(&headers, body)?),
            Command::Connect => Message::Connect(ConnectFrame::parse(&headers, body)?),
            Command::Connected => Message::Connected(ConnectedFrame::parse(&headers, body)?),
            Command::Send => Message::Send(SendFrame::parse(&headers, body)?),
            Command::Error => Message::Error(ErrorFrame::parse(&headers, body)?),
            Command::Receipt => Message::Receipt(ReceiptFrame::parse(&headers, body)?),
            Command::Disconnect => Message::Disconnect(DisconnectFrame::parse(&headers, body)?),
        };
        Ok(message)
    }

    /// Projects the message onto `(command, headers, body)`.
    pub fn marshal(&self) -> Frame {
        match self {
            Message::Stomp(m) => m.marshal(),
            Message::Connect(m) => m.marshal(),
            Message::Connected(m) => m.marshal(),
            Message::Send(m) => m.marshal(),
            Message::Error(m) => m.marshal(),
            Message::Receipt(m) => m.marshal(),
            Message::Disconnect(m) => m.marshal(),
        }
    }

    /// Returns the wire bytes, encoding through `serializer` only on first use.
    pub fn serialize<S>(&self, serializer: &S) -> Result<Bytes, ProtocolError>
    where
        S: Serializer + ?Sized,
    {
        let cache = self.cache();
        if let Some(bytes) = cache.0.get() {
            return Ok(bytes.clone());
        }
        let bytes = serializer.encode(self)?;
        Ok(cache.0.get_or_init(|| bytes).clone())
    }

    /// Drops the cached wire bytes.
    pub fn uncache(&mut self) {
        self.cache_mut().0.take();
    }

    pub fn is_cached(&self) -> bool {
        self.cache().0.get().is_some()
    }

    fn cache(&self) -> &Cache {
        match self {
            Message::Stomp(m) => &m.cache,
            Message::Connect(m) => &m.cache,
            Message::Connected(m) => &m.cache,
            Message::Send(m) => &m.cache,
            Message::Error(m) => &m.cache,
            Message::Receipt(m) => &m.cache,
            Message::Disconnect(m) => &m.cache,
        }
    }

    fn cache_mut(&mut self) -> &mut Cache {
        match self {
            Message::Stomp(m) => &mut m.cache,
            Message::Connect(m) => &mut m.cache,
            Message::Connected(m) => &mut m.cache,
            Message::Send(m) => &mut m.cache,
            Message::Error(m) => &mut m.cache,
            Message::Receipt(m) => &mut m.cache,
            Message::Disconnect(m) => &mut m.cache,
        }
    }
}

impl From<StompFrame> for Message {
    fn from(m: StompFrame) -> Self {
        Message::Stomp(m)
    }
}

impl From<ConnectFrame> for Message {
    fn from(m: ConnectFrame) -> Self {
        Message::Connect(m)
    }
}

impl From<ConnectedFrame> for Message {
    fn from(m: ConnectedFrame) -> Self {
        Message::Connected(m)
    }
}

impl From<SendFrame> for Message {
    fn from(m: SendFrame) -> Self {
        Message::Send(m)
    }
}

impl From<ErrorFrame> for Message {
    fn from(m: ErrorFrame) -> Self {
        Message::Error(m)
    }
}

impl From<ReceiptFrame> for Message {
    fn from(m: ReceiptFrame) -> Self {
        Message::Receipt(m)
    }
}

impl From<DisconnectFrame> for Message {
    fn from(m: DisconnectFrame) -> Self {
        Message::Disconnect(m)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Stomp(m) => write!(
                f,
                "STOMP (host = {}, accept-version = {})",
                m.host, m.accept_version
            ),
            Message::Connect(m) => write!(
                f,
                "CONNECT (host = {}, accept-version = {:?})",
                m.host, m.accept_version
            ),
            Message::Connected(m) => write!(f, "CONNECTED (version = {})", m.version),
            Message::Send(m) => write!(
                f,
                "SEND (destination = {}, receipt = {:?}, {} bytes)",
                m.destination,
                m.receipt,
                m.body.len()
            ),
            Message::Error(m) => write!(
                f,
                "ERROR (message = {:?}, receipt-id = {:?})",
                m.message, m.receipt_id
            ),
            Message::Receipt(m) => write!(f, "RECEIPT (receipt-id = {})", m.receipt_id),
            Message::Disconnect(m) => write!(f, "DISCONNECT (receipt = {:?})", m.receipt),
        }
    }
}
