//! Synchronous frame codec: serializes outbound [`Frame`]s to the transport and
//! assembles inbound wire bytes into complete [`Message`]s.
//!
//! Decoding is pull-based: [`Decoder::read_message`] performs blocking reads on
//! the [`Transport`] until one complete message is available, transparently
//! reassembling fragmented transmissions. Control frames are surfaced the
//! moment they arrive, even in the middle of a fragmented message, as RFC 6455
//! permits them to be interleaved.
//!
//! The decoder enforces the protocol rules a remote peer cannot be trusted to
//! follow: reserved bits must be zero (no extensions are negotiated), control
//! frames must not be fragmented, pings are capped at 125 bytes, and payloads
//! are bounded by the configured maximum.

use bytes::BytesMut;

use crate::{
    frame::{Frame, Message, MessageKind, OpCode, MAX_HEAD_SIZE},
    transport::Transport,
    Result, WebSocketError,
};

/// Serializes one frame and hands it to the transport in a single `send`.
///
/// Client-to-server frames are always masked; a fresh random masking key is
/// generated per frame as the protocol requires.
pub fn write_frame<T: Transport>(transport: &mut T, mut frame: Frame) -> Result<()> {
    frame.mask();

    let mut head = [0u8; MAX_HEAD_SIZE];
    let size = frame.fmt_head(&mut head);

    let mut wire = BytesMut::with_capacity(size + frame.payload.len());
    wire.extend_from_slice(&head[..size]);
    wire.extend_from_slice(&frame.payload);

    transport.send(&wire)?;
    Ok(())
}

/// A decoder for WebSocket frames, assembling them into complete messages.
///
/// `Decoder` tracks the maximum allowed payload size and the payload of an
/// in-progress fragmented message. The fragment state persists across
/// [`read_message`](Decoder::read_message) calls so that control frames
/// interleaved between fragments can be surfaced without losing the partially
/// assembled message.
pub struct Decoder {
    /// Maximum allowed size for a frame payload and for an assembled message.
    max_payload_read: usize,
    /// Kind and accumulated payload of a fragmented message in progress.
    partial: Option<(MessageKind, BytesMut)>,
}

impl Decoder {
    /// Creates a new `Decoder` with a specified maximum payload size.
    pub fn new(max_payload_read: usize) -> Self {
        Self {
            max_payload_read,
            partial: None,
        }
    }

    /// Reads frames from the transport until one complete message is assembled.
    ///
    /// Blocks on the transport for in-flight frame bytes. Fragmented data
    /// frames accumulate until their final fragment arrives; control frames
    /// return immediately as single-frame messages.
    ///
    /// # Errors
    /// - `ConnectionClosed` if the transport reports end-of-stream mid-frame
    /// - frame-level protocol violations (reserved bits, bad opcodes, invalid
    ///   fragmentation sequences, oversized payloads)
    pub fn read_message<T: Transport>(&mut self, transport: &mut T) -> Result<Message> {
        loop {
            let frame = self.read_frame(transport)?;

            if frame.opcode.is_control() {
                let kind = MessageKind::try_from(frame.opcode)?;
                return Ok(Message::new(kind, frame.payload.freeze()));
            }

            match frame.opcode {
                OpCode::Text | OpCode::Binary => {
                    if self.partial.is_some() {
                        return Err(WebSocketError::InvalidFragment);
                    }
                    let kind = MessageKind::try_from(frame.opcode)?;
                    if frame.fin {
                        return Ok(Message::new(kind, frame.payload.freeze()));
                    }
                    self.partial = Some((kind, frame.payload));
                }
                OpCode::Continuation => {
                    let Some((kind, mut payload)) = self.partial.take() else {
                        return Err(WebSocketError::InvalidContinuationFrame);
                    };
                    payload.extend_from_slice(&frame.payload);
                    if payload.len() >= self.max_payload_read {
                        return Err(WebSocketError::FrameTooLarge);
                    }
                    if frame.fin {
                        return Ok(Message::new(kind, payload.freeze()));
                    }
                    self.partial = Some((kind, payload));
                }
                // is_control() covered Close/Ping/Pong above
                _ => unreachable!(),
            }
        }
    }

    /// Reads exactly one frame: header, optional extended length, optional
    /// masking key, payload. Unmasks the payload before returning.
    fn read_frame<T: Transport>(&self, transport: &mut T) -> Result<Frame> {
        let mut head = [0u8; 2];
        read_exact(transport, &mut head)?;

        let fin = head[0] & 0b10000000 != 0;

        // No extensions are negotiated, so RSV1 is checked along with RSV2/RSV3.
        if head[0] & 0b01110000 != 0 {
            return Err(WebSocketError::ReservedBitsNotZero);
        }

        let opcode = OpCode::try_from(head[0] & 0b00001111)?;
        let masked = head[1] & 0b10000000 != 0;
        let length_code = head[1] & 0x7F;

        let payload_len: usize = match length_code {
            126 => {
                let mut ext = [0u8; 2];
                read_exact(transport, &mut ext)?;
                u16::from_be_bytes(ext) as usize
            }
            127 => {
                let mut ext = [0u8; 8];
                read_exact(transport, &mut ext)?;
                usize::try_from(u64::from_be_bytes(ext))
                    .map_err(|_| WebSocketError::FrameTooLarge)?
            }
            _ => usize::from(length_code),
        };

        let mask = if masked {
            let mut key = [0u8; 4];
            read_exact(transport, &mut key)?;
            Some(key)
        } else {
            None
        };

        if opcode.is_control() && !fin {
            return Err(WebSocketError::ControlFrameFragmented);
        }
        if opcode == OpCode::Ping && payload_len > 125 {
            return Err(WebSocketError::PingFrameTooLarge);
        }
        if payload_len >= self.max_payload_read {
            return Err(WebSocketError::FrameTooLarge);
        }

        let mut payload = BytesMut::zeroed(payload_len);
        read_exact(transport, &mut payload)?;

        let mut frame = Frame::new(fin, opcode, mask, payload);
        frame.unmask();
        Ok(frame)
    }
}

/// Fills `buf` completely from the transport, looping over short reads.
///
/// A zero-byte read means the peer closed the stream underneath us.
fn read_exact<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(WebSocketError::ConnectionClosed);
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::apply_mask;
    use crate::transport::mock::MockTransport;

    fn decoder() -> Decoder {
        Decoder::new(1024 * 1024)
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_unfragmented_text() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x81, 0x05]);
            transport.push_bytes(b"Hello");

            let msg = decoder().read_message(&mut transport).unwrap();
            assert_eq!(msg.kind, MessageKind::Text);
            assert_eq!(msg.as_text(), Some("Hello"));
        }

        #[test]
        fn test_masked_inbound_frame_is_unmasked() {
            let mask = [0x11, 0x22, 0x33, 0x44];
            let mut payload = b"masked".to_vec();
            apply_mask(&mut payload, mask);

            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x82, 0x80 | 6]);
            transport.push_bytes(&mask);
            transport.push_bytes(&payload);

            let msg = decoder().read_message(&mut transport).unwrap();
            assert_eq!(msg.kind, MessageKind::Binary);
            assert_eq!(&msg.payload[..], b"masked");
        }

        #[test]
        fn test_extended_16bit_length() {
            let payload = vec![0xAB; 300];
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x82, 126]);
            transport.push_bytes(&300u16.to_be_bytes());
            transport.push_bytes(&payload);

            let msg = decoder().read_message(&mut transport).unwrap();
            assert_eq!(msg.payload.len(), 300);
        }

        #[test]
        fn test_fragmented_message_reassembled() {
            let mut transport = MockTransport::connected();
            // Text "Hel" without FIN, continuation "lo" with FIN
            transport.push_bytes(&[0x01, 0x03]);
            transport.push_bytes(b"Hel");
            transport.push_bytes(&[0x80, 0x02]);
            transport.push_bytes(b"lo");

            let msg = decoder().read_message(&mut transport).unwrap();
            assert_eq!(msg.kind, MessageKind::Text);
            assert_eq!(msg.as_text(), Some("Hello"));
        }

        #[test]
        fn test_control_frame_between_fragments() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x01, 0x03]);
            transport.push_bytes(b"Hel");
            // Ping arrives between the fragments
            transport.push_bytes(&[0x89, 0x02]);
            transport.push_bytes(b"hi");
            transport.push_bytes(&[0x80, 0x02]);
            transport.push_bytes(b"lo");

            let mut decoder = decoder();

            let ping = decoder.read_message(&mut transport).unwrap();
            assert_eq!(ping.kind, MessageKind::Ping);
            assert_eq!(&ping.payload[..], b"hi");

            // The partially assembled message survived the interleaved control frame
            let msg = decoder.read_message(&mut transport).unwrap();
            assert_eq!(msg.as_text(), Some("Hello"));
        }

        #[test]
        fn test_continuation_without_start() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x80, 0x02]);
            transport.push_bytes(b"lo");

            let err = decoder().read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::InvalidContinuationFrame));
        }

        #[test]
        fn test_new_data_frame_during_fragmentation() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x01, 0x03]);
            transport.push_bytes(b"Hel");
            // A fresh text frame before the previous message completed
            transport.push_bytes(&[0x81, 0x02]);
            transport.push_bytes(b"no");

            let mut decoder = decoder();
            // First call blocks assembling the fragmented message and trips on
            // the interloper.
            let err = decoder.read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::InvalidFragment));
        }

        #[test]
        fn test_reserved_bits_rejected() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x81 | 0x40, 0x00]);

            let err = decoder().read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::ReservedBitsNotZero));
        }

        #[test]
        fn test_reserved_opcode_rejected() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x83, 0x00]);

            let err = decoder().read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::InvalidOpCode(0x3)));
        }

        #[test]
        fn test_fragmented_control_frame_rejected() {
            let mut transport = MockTransport::connected();
            // Ping without FIN
            transport.push_bytes(&[0x09, 0x00]);

            let err = decoder().read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::ControlFrameFragmented));
        }

        #[test]
        fn test_oversized_frame_rejected() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x82, 126]);
            transport.push_bytes(&2048u16.to_be_bytes());

            let err = Decoder::new(1024).read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::FrameTooLarge));
        }

        #[test]
        fn test_eof_mid_frame() {
            let mut transport = MockTransport::connected();
            transport.push_bytes(&[0x81, 0x05]);
            transport.push_bytes(b"He");

            let err = decoder().read_message(&mut transport).unwrap_err();
            assert!(matches!(err, WebSocketError::ConnectionClosed));
        }
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn test_written_frame_is_masked() {
            let mut transport = MockTransport::connected();
            write_frame(&mut transport, Frame::text("hello")).unwrap();

            assert_eq!(transport.sent.len(), 1);
            let wire = &transport.sent[0];

            // FIN + Text opcode
            assert_eq!(wire[0], 0x81);
            // MASK bit set, payload length 5
            assert_eq!(wire[1], 0x80 | 5);

            // Unmasking with the transmitted key restores the payload
            let mask = [wire[2], wire[3], wire[4], wire[5]];
            let mut payload = wire[6..].to_vec();
            apply_mask(&mut payload, mask);
            assert_eq!(&payload[..], b"hello");
        }

        #[test]
        fn test_written_frame_extended_length() {
            let mut transport = MockTransport::connected();
            write_frame(&mut transport, Frame::binary(vec![0u8; 200])).unwrap();

            let wire = &transport.sent[0];
            assert_eq!(wire[0], 0x82);
            assert_eq!(wire[1], 0x80 | 126);
            assert_eq!(u16::from_be_bytes([wire[2], wire[3]]), 200);
            assert_eq!(wire.len(), 2 + 2 + 4 + 200);
        }
    }
}
