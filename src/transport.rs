//! The byte-stream transport the client runs over.
//!
//! The crate deliberately does not open sockets. Whatever byte stream the
//! platform offers (a TCP socket, a TLS session, a cellular modem's AT-command
//! socket) is adapted behind the [`Transport`] trait and handed to the client,
//! which owns it exclusively for the lifetime of the connection.

use std::io;

/// A connected byte-stream the WebSocket client drives.
///
/// Implementations are expected to be blocking: `read_line` and `read` wait for
/// data with whatever timeout policy the transport itself enforces. The client
/// adds no timeouts of its own, so a transport that never delivers data will
/// stall the handshake and `poll` indefinitely; bound your reads at this layer
/// if you need bounded latency.
///
/// The client calls these methods from a single thread and never concurrently;
/// implementations do not need interior locking.
pub trait Transport {
    /// Opens the underlying stream to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Writes the entire buffer to the stream.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Reads one line of text, blocking until its terminator arrives.
    ///
    /// The returned string includes the line terminator (`\r\n` for HTTP
    /// handshake lines). Used only during the upgrade handshake.
    fn read_line(&mut self) -> io::Result<String>;

    /// Reads up to `buf.len()` bytes into `buf`, returning how many were read.
    ///
    /// A return of `Ok(0)` signals end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether the underlying stream is still alive.
    ///
    /// This is pure liveness: it must not perform network activity.
    fn available(&self) -> bool;

    /// Whether inbound bytes are ready to be read without blocking.
    ///
    /// The dispatch loop uses this to decide if another receive attempt is
    /// worthwhile; a conservative `false` merely defers work to a later poll.
    fn readable(&self) -> bool;

    /// Releases the underlying stream.
    ///
    /// Called at most once per established connection by the client, but
    /// implementations should tolerate repeated calls.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        (**self).connect(host, port)
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).send(data)
    }

    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn readable(&self) -> bool {
        (**self).readable()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! A scripted in-memory transport for exercising the handshake, codec, and
    //! dispatch loop without sockets.

    use super::Transport;
    use crate::handshake;
    use std::collections::VecDeque;
    use std::io;

    /// Scripted transport: `read_line`/`read` serve pre-loaded data, `send`
    /// captures outbound buffers, and connect/close invocations are counted.
    ///
    /// For handshake tests the mock can synthesize the server side: with
    /// [`auto_handshake`](MockTransport::auto_handshake) enabled, the first
    /// `read_line` after the upgrade request was sent computes the accept key
    /// from the request's captured nonce and scripts a well-formed `101`
    /// response (optionally corrupting the accept key to exercise the failure
    /// path).
    pub(crate) struct MockTransport {
        pub connected: bool,
        pub connect_ok: bool,
        pub sent: Vec<Vec<u8>>,
        pub inbound: VecDeque<u8>,
        pub lines: VecDeque<String>,
        pub close_calls: usize,
        auto_handshake: bool,
        corrupt_accept: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                connected: false,
                connect_ok: true,
                sent: Vec::new(),
                inbound: VecDeque::new(),
                lines: VecDeque::new(),
                close_calls: 0,
                auto_handshake: false,
                corrupt_accept: false,
            }
        }

        /// A transport that is already connected, for codec-level tests.
        pub fn connected() -> Self {
            let mut mock = Self::new();
            mock.connected = true;
            mock
        }

        /// Answer the next upgrade request with a correct `101` response.
        pub fn auto_handshake(mut self) -> Self {
            self.auto_handshake = true;
            self
        }

        /// Answer with a `101` response whose accept key has one character
        /// mutated.
        pub fn corrupt_accept(mut self) -> Self {
            self.auto_handshake = true;
            self.corrupt_accept = true;
            self
        }

        pub fn push_bytes(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes.iter().copied());
        }

        pub fn push_line(&mut self, line: &str) {
            self.lines.push_back(line.to_string());
        }

        /// Builds the scripted handshake response from the captured upgrade
        /// request, deriving the accept key from its nonce.
        fn script_handshake_response(&mut self) {
            let request = String::from_utf8(self.sent[0].clone()).expect("utf8 request");
            let nonce = request
                .lines()
                .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
                .expect("request carries a nonce");

            let mut accept = handshake::derive_accept_key(nonce);
            if self.corrupt_accept {
                // Flip the first character to break the key
                let flipped = if accept.starts_with('A') { 'B' } else { 'A' };
                accept.replace_range(0..1, &flipped.to_string());
            }

            self.lines
                .push_back("HTTP/1.1 101 Switching Protocols\r\n".to_string());
            self.lines.push_back("Upgrade: websocket\r\n".to_string());
            self.lines.push_back("Connection: Upgrade\r\n".to_string());
            self.lines
                .push_back(format!("Sec-WebSocket-Accept: {accept}\r\n"));
            self.lines.push_back("\r\n".to_string());
        }
    }

    impl Transport for MockTransport {
        fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
            if self.connect_ok {
                self.connected = true;
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
        }

        fn send(&mut self, data: &[u8]) -> io::Result<()> {
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            if self.lines.is_empty() && self.auto_handshake && !self.sent.is_empty() {
                self.auto_handshake = false;
                self.script_handshake_response();
            }
            self.lines
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted line"))
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.inbound.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn available(&self) -> bool {
            self.connected
        }

        fn readable(&self) -> bool {
            !self.inbound.is_empty()
        }

        fn close(&mut self) {
            self.connected = false;
            self.close_calls += 1;
        }
    }
}
