//! # Handshake
//!
//! HTTP upgrade handshake negotiation per [RFC 6455 Section 4.1](https://datatracker.ietf.org/doc/html/rfc6455#section-4.1).
//!
//! The client opens a WebSocket connection by sending a fixed-form HTTP/1.1
//! upgrade request carrying a random base64 nonce (`Sec-WebSocket-Key`) and
//! validating the server's response: the literal `101 Switching Protocols`
//! status line, the `Upgrade`/`Connection` headers, and a
//! `Sec-WebSocket-Accept` value derived deterministically from the nonce. A
//! matching accept value proves the server actually understood the upgrade
//! request rather than echoing a cached response.
//!
//! Header parsing here is a deliberately small tokenizer rather than a full
//! HTTP parser. It tolerates arbitrary whitespace runs around the colon and
//! value, but matches header names case-sensitively and assumes every line
//! contains a colon; a line without one is consumed into the following key.
//! Both limits are kept as documented boundary conditions of the scanner.

use base64::prelude::*;
use sha1::{Digest, Sha1};

/// The only status line accepted during the handshake, byte-for-byte.
pub(crate) const SWITCHING_PROTOCOLS: &str = "HTTP/1.1 101 Switching Protocols\r\n";

/// An upgrade request ready to transmit, paired with the accept key the server
/// must answer with. Immutable once generated; each connection attempt builds a
/// fresh one from a new nonce.
pub struct HandshakeRequest {
    /// The full request text: request line, four headers, blank terminating
    /// line, all CRLF-terminated.
    pub request_text: String,
    /// The `Sec-WebSocket-Accept` value a correct server will respond with.
    pub expected_accept: String,
}

impl HandshakeRequest {
    /// Builds the upgrade request for `path`.
    ///
    /// The nonce is the base64 encoding of 16 cryptographically random bytes,
    /// regenerated on every call. `path` is used as the request-target verbatim;
    /// the caller guarantees it is valid.
    pub fn generate(path: &str) -> Self {
        let nonce = generate_nonce();

        let mut request_text = format!("GET {path} HTTP/1.1\r\n");
        request_text.push_str("Upgrade: websocket\r\n");
        request_text.push_str("Connection: Upgrade\r\n");
        request_text.push_str(&format!("Sec-WebSocket-Key: {nonce}\r\n"));
        request_text.push_str("Sec-WebSocket-Version: 13\r\n");
        request_text.push_str("\r\n");

        let expected_accept = derive_accept_key(&nonce);

        Self {
            request_text,
            expected_accept,
        }
    }
}

/// The semantically recognized headers of a handshake response.
///
/// The scanner sees every `key: value` pair in the response but records only
/// the three names that decide the handshake; everything else is ignored.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    /// Value of the `Upgrade` header, if present.
    pub upgrade: Option<String>,
    /// Value of the `Connection` header, if present.
    pub connection: Option<String>,
    /// Value of the `Sec-WebSocket-Accept` header, if present.
    pub accept: Option<String>,
}

/// Outcome of validating a parsed response against the upgrade rules.
#[derive(Debug, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// Whether all three required headers carried their required values.
    pub success: bool,
    /// The server's accept key, empty if absent. The caller additionally
    /// compares this against [`HandshakeRequest::expected_accept`] before
    /// treating the handshake as complete.
    pub server_accept: String,
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\n')
}

/// Scans `text` as a sequence of `key: value` pairs.
///
/// Algorithm: read up to the colon as the key; skip the colon and any run of
/// whitespace; read up to the next whitespace as the value; skip the trailing
/// whitespace run; repeat until the input is exhausted. Header names match
/// case-sensitively. A line missing its colon is not detected: its characters
/// are consumed into the next key, corrupting the pairs that follow. See the
/// scanner tests for this boundary.
pub fn parse_response_headers(text: &str) -> ResponseHeaders {
    let bytes = text.as_bytes();
    let mut headers = ResponseHeaders::default();
    let mut idx = 0;

    while idx < bytes.len() {
        let key_start = idx;
        while idx < bytes.len() && bytes[idx] != b':' {
            idx += 1;
        }
        let key = &text[key_start..idx];

        // ignore ':' and leading whitespace
        idx = (idx + 1).min(bytes.len());
        while idx < bytes.len() && is_whitespace(bytes[idx]) {
            idx += 1;
        }

        let value_start = idx;
        while idx < bytes.len() && !is_whitespace(bytes[idx]) {
            idx += 1;
        }
        let value = &text[value_start..idx];

        // ignore rest of whitespace
        while idx < bytes.len() && is_whitespace(bytes[idx]) {
            idx += 1;
        }

        match key {
            "Upgrade" => headers.upgrade = Some(value.to_string()),
            "Connection" => headers.connection = Some(value.to_string()),
            "Sec-WebSocket-Accept" => headers.accept = Some(value.to_string()),
            _ => {}
        }
    }

    headers
}

/// Checks the parsed headers against the RFC 6455 upgrade rules.
///
/// Success requires `Upgrade: websocket`, `Connection: Upgrade`, and a
/// non-empty `Sec-WebSocket-Accept`, all matched exactly. Comparing the
/// returned accept value against the expected key is the caller's final step.
pub fn validate(headers: &ResponseHeaders) -> HandshakeOutcome {
    let server_accept = headers.accept.clone().unwrap_or_default();
    let success = !server_accept.is_empty()
        && headers.upgrade.as_deref() == Some("websocket")
        && headers.connection.as_deref() == Some("Upgrade");

    HandshakeOutcome {
        success,
        server_accept,
    }
}

/// Base64 of 16 cryptographically random bytes, fresh per call.
fn generate_nonce() -> String {
    let input: [u8; 16] = rand::random();
    BASE64_STANDARD.encode(input)
}

/// Derives the `Sec-WebSocket-Accept` value for a nonce.
///
/// RFC 6455 Section 4.2.2: SHA-1 over the nonce concatenated with the fixed
/// GUID, base64-encoded.
pub fn derive_accept_key(nonce: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(nonce.as_bytes());
    sha1.update(b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11"); // magic string
    let result = sha1.finalize();
    BASE64_STANDARD.encode(&result[..])
}
