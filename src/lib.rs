//! # smolws
//! Client-side implementation of the WebSocket protocol (RFC 6455) for
//! resource-constrained network clients, offering automatic handling of control
//! frames, message reassembly, and a strict HTTP upgrade handshake.
//!
//! The crate is synchronous and cooperative: there is no internal runtime or
//! threading. A [`WebSocketClient`] owns a byte-stream [`Transport`] for its
//! entire lifetime, drives the upgrade handshake once in
//! [`WebSocketClient::connect`], and is then pumped from an external loop via
//! [`WebSocketClient::poll`], which routes complete messages to a
//! user-registered callback while replying to pings and completing the close
//! handshake on its own.
//!
//! The transport itself (TCP connect, TLS, a cellular modem's socket API) stays
//! outside the crate; users implement [`Transport`] over whatever byte stream
//! is available on their platform.
//!
//! # Features
//! One optional feature can be enabled in your `Cargo.toml`:
//!
//! - `logging`: debug logging of handshake negotiation and frame dispatch
//!   through the `log` crate.
//!
//! # Client Example
//! ```no_run
//! use smolws::{Transport, WebSocketClient};
//!
//! fn run<T: Transport>(transport: T) -> smolws::Result<()> {
//!     let mut ws = WebSocketClient::new(transport);
//!     ws.on_message(|msg| println!("got {} byte(s)", msg.payload.len()));
//!     ws.connect("echo.websocket.org", "/", 80)?;
//!
//!     ws.send("hello")?;
//!     while ws.is_open() {
//!         ws.poll()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Memory Bounds
//! Two configurable limits protect constrained targets from a misbehaving
//! peer: a cap on frame and message payload size (default 1 MiB) and a cap on
//! accumulated handshake response headers (default 8 KiB). Exceeding either
//! closes the connection with an error instead of growing a buffer without
//! limit.
//!
//! # Blocking Behavior
//! Handshake reads and in-flight frame reads block on the transport with no
//! timeout of their own. Callers needing bounded latency must enforce a timeout
//! at the transport layer; cancellation is only achievable by closing the
//! transport out-of-band. See [`Transport`] for the exact contract.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod close;
pub mod codec;
pub mod frame;
pub mod handshake;
pub mod transport;

use thiserror::Error;

pub use client::{ControlObserver, Options, WebSocketClient};
pub use close::CloseCode;
pub use frame::{Frame, Message, MessageKind, OpCode};
pub use transport::Transport;

/// Result alias used across the crate, with [`WebSocketError`] as the error type.
pub type Result<T> = std::result::Result<T, WebSocketError>;

/// Everything that can go wrong on a WebSocket connection.
///
/// The variants fall into three groups: handshake failures (`InvalidStatusLine`
/// through `HandshakeTooLarge`), frame-level protocol violations reported by the
/// decoder, and transport I/O errors wrapped in `IoError`.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// The first line of the server's handshake response was not the literal
    /// `HTTP/1.1 101 Switching Protocols` status line. Carries the offending
    /// line for diagnostics.
    #[error("Invalid status line: {0:?}")]
    InvalidStatusLine(String),

    /// The `Upgrade` header of the handshake response was missing or did not
    /// carry the value `websocket`.
    #[error("Invalid upgrade header")]
    InvalidUpgradeHeader,

    /// The `Connection` header of the handshake response was missing or did not
    /// carry the value `Upgrade`.
    #[error("Invalid connection header")]
    InvalidConnectionHeader,

    /// The server's `Sec-WebSocket-Accept` value was absent or did not match
    /// the key derived from the nonce sent in the upgrade request.
    #[error("Sec-WebSocket-Accept does not match the expected key")]
    AcceptKeyMismatch,

    /// The accumulated handshake response headers grew past the configured
    /// bound before the terminating blank line arrived.
    #[error("Handshake response headers too large")]
    HandshakeTooLarge,

    /// The transport hit end-of-stream while a frame or handshake line was
    /// still being read.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// A new data frame arrived before the previous fragmented message was
    /// completed.
    #[error("Invalid fragment")]
    InvalidFragment,

    /// A continuation frame arrived with no fragmented message in progress.
    #[error("Invalid continuation frame")]
    InvalidContinuationFrame,

    /// A close frame carried a malformed payload. A single byte cannot hold a
    /// status code; close payloads are either empty or at least two bytes.
    #[error("Invalid close frame")]
    InvalidCloseFrame,

    /// A frame header had reserved bits set. No extensions are negotiated, so
    /// every reserved bit is a protocol violation.
    #[error("Reserved bits are not zero")]
    ReservedBitsNotZero,

    /// A control frame arrived with the FIN bit clear; RFC 6455 forbids
    /// fragmenting control frames.
    #[error("Control frame must not be fragmented")]
    ControlFrameFragmented,

    /// A ping frame exceeded the 125-byte limit RFC 6455 places on control
    /// frame payloads.
    #[error("Ping frame too large")]
    PingFrameTooLarge,

    /// A frame's payload length exceeded the configured maximum.
    #[error("Frame too large")]
    FrameTooLarge,

    /// A frame carried an opcode outside the set RFC 6455 defines.
    #[error("Invalid opcode (byte={0})")]
    InvalidOpCode(u8),

    /// Transport-level I/O failure, such as a connection reset or a timeout
    /// enforced by the transport.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
