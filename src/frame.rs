//! # Frame
//!
//! Wire-level frames per [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2),
//! the building blocks the codec and client are composed from. A frame is the
//! atomic unit of transmission: a payload plus the protocol metadata describing
//! it.
//!
//! Two types cross this module's boundary:
//!
//! - [`Frame`]: one wire frame, with header serialization and masking
//! - [`Message`]: the assembled application-level unit the codec produces from
//!   one or more frames
//!
//! ### Frame Binary Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! :                     Payload Data continued ...                :
//! +---------------------------------------------------------------+
//! ```
//!
//! Data frames (`Text`, `Binary`, `Continuation`) carry application payload;
//! control frames (`Close`, `Ping`, `Pong`) govern connection health and
//! lifecycle. Client-to-server frames are always masked with a random 32-bit
//! key, as the protocol requires; the encoder applies the mask right before
//! transmission.

use bytes::{Bytes, BytesMut};

use crate::{close::CloseCode, WebSocketError};

/// Frame opcode, the four header bits deciding how a frame is interpreted.
///
/// `Continuation`, `Text` and `Binary` are data opcodes; `Close`, `Ping` and
/// `Pong` are control opcodes. The remaining values of the four-bit space
/// (0x3-0x7 and 0xB-0xF) are reserved by RFC 6455 and rejected during decode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Whether this opcode names a control frame (`Close`, `Ping` or `Pong`).
    ///
    /// Control frames must not be fragmented, are capped at 125 payload bytes,
    /// and are dispatched the moment they arrive rather than queued behind
    /// data frames.
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WebSocketError;

    /// Interprets the opcode field of a decoded frame header. Reserved values
    /// yield `WebSocketError::InvalidOpCode`.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(WebSocketError::InvalidOpCode(value)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(val: OpCode) -> Self {
        match val {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// The kind of an assembled [`Message`], mirroring the opcode of the frame
/// (or initial frame, for fragmented messages) it was built from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// UTF-8 text payload.
    Text,
    /// Raw binary payload.
    Binary,
    /// Liveness probe; carries an application-chosen payload of up to 125 bytes.
    Ping,
    /// Response to a ping, echoing its payload.
    Pong,
    /// Close handshake frame; payload optionally carries a status code and reason.
    Close,
}

/// An application-level message assembled by the codec from one or more frames.
///
/// Fragmentation is invisible at this level: a fragmented text or binary
/// transmission arrives as a single `Message` with the fragments' payloads
/// concatenated. Messages are handed to the dispatch loop as they complete and
/// are not retained by the connection.
#[derive(Debug, Clone)]
pub struct Message {
    /// What the message is, derived from the opcode of its (initial) frame.
    pub kind: MessageKind,
    /// The complete payload, already unmasked and reassembled.
    pub payload: Bytes,
}

impl Message {
    pub(crate) fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Returns `true` for a `Text` message.
    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }

    /// Returns `true` for a `Binary` message.
    pub fn is_binary(&self) -> bool {
        self.kind == MessageKind::Binary
    }

    /// The payload interpreted as UTF-8 text.
    ///
    /// # Returns
    /// - `Some(&str)` when the payload is valid UTF-8
    /// - `None` otherwise
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// The status code of a Close message, read from the first two payload
    /// bytes. `None` when the payload is too short to carry one.
    pub fn close_code(&self) -> Option<CloseCode> {
        let code = CloseCode::from(u16::from_be_bytes(self.payload.get(0..2)?.try_into().ok()?));
        Some(code)
    }

    /// The UTF-8 reason following a Close message's status code, if any.
    pub fn close_reason(&self) -> Option<&str> {
        std::str::from_utf8(self.payload.get(2..)?).ok()
    }
}

impl TryFrom<OpCode> for MessageKind {
    type Error = WebSocketError;

    /// A `Continuation` opcode never starts a message; the codec resolves it
    /// against the in-progress fragment instead.
    fn try_from(opcode: OpCode) -> Result<Self, Self::Error> {
        match opcode {
            OpCode::Text => Ok(Self::Text),
            OpCode::Binary => Ok(Self::Binary),
            OpCode::Ping => Ok(Self::Ping),
            OpCode::Pong => Ok(Self::Pong),
            OpCode::Close => Ok(Self::Close),
            OpCode::Continuation => Err(WebSocketError::InvalidContinuationFrame),
        }
    }
}

/// Maximum serialized size of a frame header: 2 base bytes, up to 8 extended
/// length bytes, and an optional 4-byte masking key.
pub(crate) const MAX_HEAD_SIZE: usize = 14;

/// A single WebSocket wire frame.
///
/// Most users never touch frames directly; the client exchanges [`Message`]s
/// and the codec maps between the two. Frames are exposed for the encoder and
/// decoder and for tests that script wire traffic.
pub struct Frame {
    /// Final fragment flag; when set, this frame completes a message.
    pub fin: bool,
    /// How the frame is to be interpreted.
    pub opcode: OpCode,
    /// XOR masking key, present on every client-to-server frame.
    mask: Option<[u8; 4]>,
    /// The frame's payload bytes.
    pub payload: BytesMut,
}

impl Frame {
    /// Builds a frame from its parts. `mask` may be deferred: the encoder
    /// generates a random key at transmission time when none is set.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: impl Into<BytesMut>,
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload: payload.into(),
        }
    }

    /// Creates a final text frame with the given payload.
    pub fn text(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Text, None, payload.as_ref())
    }

    /// Creates a final binary frame with the given payload.
    pub fn binary(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Binary, None, payload.as_ref())
    }

    /// Creates a ping frame. The payload must not exceed 125 bytes on the wire.
    pub fn ping(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Ping, None, payload.as_ref())
    }

    /// Creates a pong frame, typically echoing a ping's payload.
    pub fn pong(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Pong, None, payload.as_ref())
    }

    /// Creates a close frame carrying a status code and reason.
    pub fn close(code: CloseCode, reason: impl AsRef<[u8]>) -> Self {
        let code16 = u16::from(code);
        let reason: &[u8] = reason.as_ref();
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code16.to_be_bytes());
        payload.extend_from_slice(reason);

        Self::new(true, OpCode::Close, None, payload)
    }

    /// Creates a close frame with a raw payload.
    ///
    /// This method does not validate that `payload` is a valid close frame
    /// payload; it is used to echo a remote endpoint's close payload verbatim.
    pub fn close_raw(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Close, None, payload.as_ref())
    }

    /// Returns whether the frame carries a masking key.
    #[inline(always)]
    pub(crate) fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Masks the payload with the frame's key, generating a random key first
    /// when none is set.
    pub(crate) fn mask(&mut self) {
        if let Some(mask) = self.mask {
            apply_mask(&mut self.payload, mask);
        } else {
            let mask: [u8; 4] = rand::random();
            apply_mask(&mut self.payload, mask);
            self.mask = Some(mask);
        }
    }

    /// Unmasks the payload, reversing the XOR with the existing masking key.
    pub(crate) fn unmask(&mut self) {
        if let Some(mask) = self.mask.take() {
            apply_mask(&mut self.payload, mask);
        }
    }

    /// Serializes the frame header into `head`, which must hold at least
    /// [`MAX_HEAD_SIZE`] bytes, and returns the number of bytes written
    /// (2 to 14).
    pub(crate) fn fmt_head(&self, head: &mut [u8]) -> usize {
        head[0] = (self.fin as u8) << 7 | u8::from(self.opcode);

        let len = self.payload.len();
        let size = if len < 126 {
            head[1] = len as u8;
            2
        } else if len < 65536 {
            head[1] = 126;
            head[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            head[1] = 127;
            head[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        };

        if let Some(mask) = self.mask {
            head[1] |= 0x80;
            head[size..size + 4].copy_from_slice(&mask);
            size + 4
        } else {
            size
        }
    }
}

/// XORs `buf` in place with the repeating 4-byte `mask`.
///
/// Masking is an involution: applying the same key twice restores the input.
#[inline]
pub(crate) fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
