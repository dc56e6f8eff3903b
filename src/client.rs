//! # Client
//!
//! The connection object: owns the transport, drives the upgrade handshake,
//! and pumps the frame-dispatch loop.
//!
//! A [`WebSocketClient`] moves through a simple state machine. It starts
//! closed; [`connect`](WebSocketClient::connect) negotiates the handshake and,
//! only on full success, transitions to open. Once the open flag is cleared,
//! whether by a local [`close`](WebSocketClient::close), a remote close frame,
//! or the transport dying, it is never restored except by a fresh `connect`.
//!
//! The dispatch loop in [`poll`](WebSocketClient::poll) is cooperative: the
//! caller invokes it from its own loop, and each call drains the frames the
//! transport has ready. Data messages go to the user callback; control frames
//! are handled internally (pings answered, close handshake completed) with an
//! optional [`ControlObserver`] notified for visibility.

use crate::{
    close::CloseCode,
    codec::{write_frame, Decoder},
    frame::{Frame, Message, MessageKind},
    handshake::{self, HandshakeRequest},
    transport::Transport,
    Result, WebSocketError,
};

/// The maximum allowed payload size for reading, set to 1 MiB.
///
/// Frames with a payload larger than this limit will be rejected to ensure
/// memory safety and prevent excessively large messages from impacting
/// performance on constrained targets.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// The maximum accumulated size of handshake response headers, set to 8 KiB.
///
/// A server that streams headers without ever sending the terminating blank
/// line is cut off at this bound instead of growing the buffer without limit.
pub const MAX_HANDSHAKE_BYTES: usize = 8 * 1024;

/// Tunable limits for a connection.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum payload size accepted for a single frame or assembled message.
    pub max_payload_read: usize,
    /// Maximum accumulated handshake response header size.
    pub max_handshake_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_payload_read: MAX_PAYLOAD_READ,
            max_handshake_bytes: MAX_HANDSHAKE_BYTES,
        }
    }
}

/// Hook notified when control frames arrive.
///
/// The client already performs the protocol-mandated reactions on its own:
/// an inbound ping is answered with a pong echoing the payload, and an inbound
/// close is answered with the responding half of the close handshake. The
/// observer exists for visibility (tracking liveness from pongs, logging
/// close reasons), not for implementing the protocol.
pub trait ControlObserver {
    /// An inbound ping arrived; a pong echoing `payload` is sent automatically.
    fn on_ping(&mut self, _payload: &[u8]) {}

    /// An inbound pong arrived, typically answering an earlier
    /// [`probe_liveness`](WebSocketClient::probe_liveness).
    fn on_pong(&mut self, _payload: &[u8]) {}

    /// The peer initiated the close handshake.
    fn on_close(&mut self, _code: Option<CloseCode>, _reason: Option<&str>) {}
}

/// A synchronous WebSocket client over a caller-supplied [`Transport`].
///
/// The client owns its transport exclusively for its entire lifetime and
/// releases it exactly once, whether through an explicit
/// [`close`](WebSocketClient::close), a remotely initiated close, or drop.
///
/// No method is reentrant and no locking is provided; `&mut self` receivers
/// make the single-threaded contract explicit at compile time.
///
/// # Example
/// ```no_run
/// use smolws::{Transport, WebSocketClient};
///
/// fn run<T: Transport>(transport: T) -> smolws::Result<()> {
///     let mut ws = WebSocketClient::new(transport);
///     ws.on_message(|msg| {
///         if let Some(text) = msg.as_text() {
///             println!("< {text}");
///         }
///     });
///     ws.connect("example.org", "/chat", 80)?;
///     ws.send("hello")?;
///     while ws.is_open() {
///         ws.poll()?;
///     }
///     Ok(())
/// }
/// ```
pub struct WebSocketClient<T: Transport> {
    transport: T,
    decoder: Decoder,
    options: Options,
    open: bool,
    callback: Option<Box<dyn FnMut(Message)>>,
    observer: Option<Box<dyn ControlObserver>>,
}

impl<T: Transport> WebSocketClient<T> {
    /// Creates a client over `transport` with default [`Options`].
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, Options::default())
    }

    /// Creates a client over `transport` with explicit limits.
    pub fn with_options(transport: T, options: Options) -> Self {
        Self {
            decoder: Decoder::new(options.max_payload_read),
            transport,
            options,
            open: false,
            callback: None,
            observer: None,
        }
    }

    /// Registers the callback invoked with each complete text or binary
    /// message. The message is passed by value; the callback may retain it.
    pub fn on_message(&mut self, callback: impl FnMut(Message) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Registers an observer for control frames.
    pub fn set_observer(&mut self, observer: impl ControlObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Opens the transport and negotiates the WebSocket upgrade.
    ///
    /// A single handshake attempt is made per call; retry and backoff policy
    /// belongs to the caller. On any failure the transport is released and the
    /// connection stays closed. Reads during the handshake block with no
    /// timeout of their own; see [`Transport`].
    ///
    /// # Errors
    /// - transport connect or I/O failure
    /// - [`WebSocketError::InvalidStatusLine`] unless the status line is
    ///   byte-for-byte `HTTP/1.1 101 Switching Protocols`
    /// - [`WebSocketError::HandshakeTooLarge`] if headers exceed the bound
    /// - [`WebSocketError::InvalidUpgradeHeader`],
    ///   [`WebSocketError::InvalidConnectionHeader`] or
    ///   [`WebSocketError::AcceptKeyMismatch`] per the validation rules
    pub fn connect(&mut self, host: &str, path: &str, port: u16) -> Result<()> {
        self.transport.connect(host, port)?;

        if let Err(err) = self.negotiate(path) {
            #[cfg(feature = "logging")]
            log::debug!("handshake with {host}:{port} failed: {err}");

            self.transport.close();
            return Err(err);
        }

        // Fragment state from a previous connection must not leak into this one.
        self.decoder = Decoder::new(self.options.max_payload_read);
        self.open = true;

        #[cfg(feature = "logging")]
        log::debug!("connection to {host}:{port} open");

        Ok(())
    }

    fn negotiate(&mut self, path: &str) -> Result<()> {
        let request = HandshakeRequest::generate(path);
        self.transport.send(request.request_text.as_bytes())?;

        let status = self.transport.read_line()?;
        if status != handshake::SWITCHING_PROTOCOLS {
            return Err(WebSocketError::InvalidStatusLine(status));
        }

        let mut response_headers = String::new();
        loop {
            let line = self.transport.read_line()?;
            let terminator = line == "\r\n";
            response_headers.push_str(&line);
            if terminator {
                break;
            }
            if response_headers.len() > self.options.max_handshake_bytes {
                return Err(WebSocketError::HandshakeTooLarge);
            }
        }

        let headers = handshake::parse_response_headers(&response_headers);
        let outcome = handshake::validate(&headers);
        if !outcome.success {
            return Err(if headers.upgrade.as_deref() != Some("websocket") {
                WebSocketError::InvalidUpgradeHeader
            } else if headers.connection.as_deref() != Some("Upgrade") {
                WebSocketError::InvalidConnectionHeader
            } else {
                // Validation can only have failed on an absent accept value
                WebSocketError::AcceptKeyMismatch
            });
        }
        if outcome.server_accept != request.expected_accept {
            return Err(WebSocketError::AcceptKeyMismatch);
        }

        Ok(())
    }

    /// Whether the connection is open: the local open flag combined with the
    /// transport's own liveness. Pure: performs no network activity.
    pub fn is_open(&self) -> bool {
        self.open && self.transport.available()
    }

    /// Sends one ping frame to probe the peer, expecting a pong back.
    ///
    /// Liveness probing is deliberately explicit rather than a side effect of
    /// status queries; call this from your own schedule and watch for the
    /// answering pong via a [`ControlObserver`]. No-op when closed.
    pub fn probe_liveness(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        write_frame(&mut self.transport, Frame::ping([]))
    }

    /// Drains the messages the transport has ready, dispatching each one.
    ///
    /// Text and binary messages go to the registered callback. Pings are
    /// answered automatically, pongs are observed only, and a close frame
    /// completes the close handshake and transitions to closed. On a closed
    /// connection this performs no receives and invokes no callbacks.
    ///
    /// Each underlying receive may block depending on transport semantics; a
    /// transport with non-blocking reads keeps this loop bounded.
    pub fn poll(&mut self) -> Result<()> {
        while self.is_open() && self.transport.readable() {
            let message = self.decoder.read_message(&mut self.transport)?;

            #[cfg(feature = "logging")]
            log::trace!(
                "dispatching {:?} message ({} bytes)",
                message.kind,
                message.payload.len()
            );

            match message.kind {
                MessageKind::Text | MessageKind::Binary => {
                    if let Some(callback) = self.callback.as_mut() {
                        callback(message);
                    }
                }
                MessageKind::Ping => self.handle_ping(message)?,
                MessageKind::Pong => self.handle_pong(&message),
                MessageKind::Close => self.handle_close(&message)?,
            }
        }
        Ok(())
    }

    /// Sends a text message. Silent no-op when the connection is unavailable.
    pub fn send(&mut self, data: impl AsRef<str>) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        write_frame(&mut self.transport, Frame::text(data.as_ref()))
    }

    /// Sends a binary message. Silent no-op when the connection is unavailable.
    pub fn send_binary(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        write_frame(&mut self.transport, Frame::binary(data))
    }

    /// Initiates the close handshake and releases the transport.
    ///
    /// Sends one close frame with [`CloseCode::Normal`]; the peer's echo
    /// completes the handshake at the protocol level. Idempotent: a second
    /// call observes the connection closed and does nothing, so repeated
    /// calls emit exactly one close frame.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.open = false;

        #[cfg(feature = "logging")]
        log::debug!("closing connection (locally initiated)");

        let sent = write_frame(&mut self.transport, Frame::close(CloseCode::Normal, []));
        self.transport.close();
        sent
    }

    /// RFC 6455 Section 5.5.2: every ping must be answered with a pong
    /// carrying the same payload.
    fn handle_ping(&mut self, message: Message) -> Result<()> {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_ping(&message.payload);
        }
        write_frame(&mut self.transport, Frame::pong(&message.payload[..]))
    }

    fn handle_pong(&mut self, message: &Message) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_pong(&message.payload);
        }
    }

    /// Responding side of the close handshake. Guarded against double-close
    /// races: a second close notification after the transition is a no-op.
    fn handle_close(&mut self, message: &Message) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.open = false;

        if let Some(observer) = self.observer.as_mut() {
            observer.on_close(message.close_code(), message.close_reason());
        }

        #[cfg(feature = "logging")]
        log::debug!("closing connection (remotely initiated)");

        // A close payload of exactly one byte cannot carry a status code.
        if message.payload.len() == 1 {
            self.transport.close();
            return Err(WebSocketError::InvalidCloseFrame);
        }

        // Not the initiator: echo the peer's payload to complete the handshake.
        let sent = write_frame(&mut self.transport, Frame::close_raw(&message.payload));
        self.transport.close();
        sent
    }
}

impl<T: Transport> Drop for WebSocketClient<T> {
    /// Releases the transport if the connection is still open when the client
    /// is destroyed. Paths that already closed (locally or remotely) have
    /// released it before this runs.
    fn drop(&mut self) {
        if self.open {
            self.transport.close();
        }
    }
}
