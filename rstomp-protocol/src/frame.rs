//! Text frame format for STOMP.
//!
//! Frame layout (UTF-8 text, NUL-terminated):
//!
//! ```text
//! COMMAND\n
//! key1:value1\n
//! key2:value2\n
//! \n
//! body bytes
//! \0
//! ```
//!
//! Header values are written verbatim: no escaping of `\n`, `\r`, `:` or NUL
//! is performed, so values carrying those characters are rejected when the
//! message is constructed. The body runs from the blank line to the final NUL
//! byte; `content-length` is emitted as a hint but never used for delimiting.

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Frame terminator.
pub const NUL: u8 = 0;

/// Header synthesized on encode whenever a body is present.
pub const CONTENT_LENGTH: &str = "content-length";

/// STOMP commands known to this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Stomp,
    Connect,
    Connected,
    Send,
    Error,
    Receipt,
    Disconnect,
}

impl Command {
    /// Returns the wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Stomp => "STOMP",
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Error => "ERROR",
            Command::Receipt => "RECEIPT",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// Returns whether frames carrying this command are accepted by the decoder.
    ///
    /// DISCONNECT is outbound-only in the supported subset.
    pub fn is_decodable(&self) -> bool {
        !matches!(self, Command::Disconnect)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOMP" => Ok(Command::Stomp),
            "CONNECT" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "ERROR" => Ok(Command::Error),
            "RECEIPT" => Ok(Command::Receipt),
            "DISCONNECT" => Ok(Command::Disconnect),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Insertion-ordered header map with unique keys.
///
/// The first value stored for a key wins; later inserts for the same key are
/// discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header unless the key is already present.
    ///
    /// Returns `false` when the value was discarded.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Iterates headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// Untyped frame: the `(command, headers, body)` projection of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl Frame {
    /// Creates a frame with no headers and no body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encodes the frame into wire bytes.
    ///
    /// Any `content-length` present in the header map is replaced by one
    /// computed from the body.
    pub fn encode(&self) -> BytesMut {
        let mut writer = FrameWriter::new(self.command);
        for (key, value) in self.headers.iter() {
            if key != CONTENT_LENGTH {
                writer.header(key, value);
            }
        }
        writer.finish(self.body.as_deref())
    }

    /// Decodes one complete frame, including its NUL terminator.
    ///
    /// Lines may end with `\n` or `\r\n`. A body that is empty is reported as
    /// absent unless the frame declared a `content-length`.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (&last, content) = payload
            .split_last()
            .ok_or(ProtocolError::MissingTerminator)?;
        if last != NUL {
            return Err(ProtocolError::MissingTerminator);
        }

        let text = std::str::from_utf8(content).map_err(|_| ProtocolError::InvalidUtf8)?;
        let mut rest = text;

        let command_line = next_line(&mut rest).ok_or(ProtocolError::MissingSeparator)?;
        let command: Command = command_line.parse()?;
        if !command.is_decodable() {
            return Err(ProtocolError::UnknownCommand(command_line.to_string()));
        }

        let mut headers = HeaderMap::new();
        loop {
            let line = next_line(&mut rest).ok_or(ProtocolError::MissingSeparator)?;
            if line.is_empty() {
                break;
            }
            let (key, value) = line
                .split_once(':')
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| ProtocolError::InvalidHeader(line.to_string()))?;
            headers.insert(key, value);
        }

        let body = if rest.is_empty() && !headers.contains_key(CONTENT_LENGTH) {
            None
        } else {
            Some(rest.to_string())
        };

        Ok(Self {
            command,
            headers,
            body,
        })
    }
}

/// Splits off the next line, without its terminator.
///
/// Returns `None` when no line terminator remains.
fn next_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let pos = rest.find('\n')?;
    let line = &rest[..pos];
    *rest = &rest[pos + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

/// Incremental frame writer.
///
/// Appends the command and headers as they are supplied and emits
/// `content-length` from the body's byte length when finished.
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    pub fn new(command: Command) -> Self {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_slice(command.as_str().as_bytes());
        buf.put_u8(b'\n');
        Self { buf }
    }

    /// Appends a `key:value` header line.
    pub fn header(&mut self, key: &str, value: &str) -> &mut Self {
        self.buf.reserve(key.len() + value.len() + 2);
        self.buf.put_slice(key.as_bytes());
        self.buf.put_u8(b':');
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(b'\n');
        self
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Terminates the header block, appends the body and the NUL terminator.
    pub fn finish(mut self, body: Option<&str>) -> BytesMut {
        if let Some(body) = body {
            let length = body.len().to_string();
            self.header(CONTENT_LENGTH, &length);
            self.buf.reserve(body.len() + 2);
            self.buf.put_u8(b'\n');
            self.buf.put_slice(body.as_bytes());
        } else {
            self.buf.put_u8(b'\n');
        }
        self.buf.put_u8(NUL);
        self.buf
    }
}
