//! Encoder and decoder between typed messages and wire bytes.

use crate::error::ProtocolError;
use crate::frame::{Frame, NUL};
use crate::message::Message;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, Bytes, BytesMut};

/// Glue between typed messages and the bytes carried by a transport.
pub trait Serializer {
    /// Encodes a message into one complete frame.
    fn encode(&self, message: &Message) -> Result<Bytes, ProtocolError>;

    /// Decodes one complete frame.
    ///
    /// `is_binary` reports how the transport flagged the payload; text
    /// codecs reject binary payloads outright.
    fn decode(&self, payload: &[u8], is_binary: bool) -> Result<Message, ProtocolError>;
}

/// The STOMP text codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StompCodec {
    max_frame_size: usize,
}

impl StompCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Sets the largest frame, terminator included, accepted in either direction.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for StompCodec {
    fn encode(&self, message: &Message) -> Result<Bytes, ProtocolError> {
        let encoded = message.marshal().encode();
        if encoded.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: encoded.len(),
                max: self.max_frame_size,
            });
        }
        Ok(encoded.freeze())
    }

    fn decode(&self, payload: &[u8], is_binary: bool) -> Result<Message, ProtocolError> {
        if is_binary {
            return Err(ProtocolError::BinaryPayload);
        }
        if payload.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_size,
            });
        }
        Message::parse(Frame::decode(payload)?)
    }
}

/// Splits a byte-stream into frames on their NUL terminators.
///
/// Line breaks between frames are skipped. Bodies therefore must not contain
/// NUL bytes.
pub struct Decoder {
    codec: StompCodec,
    buffer: BytesMut,
    /// Bytes already searched for a terminator.
    scanned: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_codec(StompCodec::new())
    }

    pub fn with_codec(codec: StompCodec) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to split the next complete frame off the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.scanned == 0 {
            let skip = self
                .buffer
                .iter()
                .take_while(|&&b| b == b'\n' || b == b'\r')
                .count();
            self.buffer.advance(skip);
        }

        let max = self.codec.max_frame_size();
        match self.buffer[self.scanned..].iter().position(|&b| b == NUL) {
            Some(pos) => {
                let len = self.scanned + pos + 1;
                self.scanned = 0;
                if len > max {
                    return Err(ProtocolError::FrameTooLarge { size: len, max });
                }
                Ok(Some(self.buffer.split_to(len).freeze()))
            }
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > max {
                    return Err(ProtocolError::FrameTooLarge {
                        size: self.buffer.len(),
                        max,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Attempts to decode the next message from the buffer.
    pub fn decode_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => self.codec.decode(&frame, false).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
