//! Length-prefixed MessagePack framing for tokio I/O.
//!
//! Frame layout: `[u32 big-endian payload length][MessagePack payload]`.
//! Payloads are maps with named fields (`to_vec_named`).

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{MAX_PAYLOAD_SIZE, Message, RawEnvelope};

const HEADER_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Framing only: yields raw payloads without deserializing them.
///
/// The broker reads with this and runs [`decode_frame`] itself so a
/// frame with an unknown `type` can still be answered by id.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Set once the header of the frame in progress has been consumed.
    pending_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > MAX_PAYLOAD_SIZE {
                    return Err(CodecError::PayloadTooLarge(len));
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        self.pending_len = None;
        Ok(Some(src.split_to(payload_len)))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_frame(&item, dst)
    }
}

/// Full message codec for clients: frames plus MessagePack.
#[derive(Debug, Default)]
pub struct LengthPrefixedCodec {
    frames: FrameCodec,
}

impl LengthPrefixedCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LengthPrefixedCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(payload) => Ok(Some(rmp_serde::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for LengthPrefixedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_frame(&item, dst)
    }
}

fn write_frame(item: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    let payload = rmp_serde::to_vec_named(item)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.extend_from_slice(&payload);
    Ok(())
}

/// Outcome of decoding one raw frame.
#[derive(Debug)]
pub enum DecodeResult {
    Ok(Message),
    /// Well-formed envelope with a `type` this build does not know.
    UnknownType(RawEnvelope),
    /// Not even `{type, id}` could be read.
    Malformed(rmp_serde::decode::Error),
}

/// Decode a payload as a [`Message`], falling back to [`RawEnvelope`].
pub fn decode_frame(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<Message>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ClipFormat, FormatEtc, Tymed};
    use crate::ipc::protocol::{PROTOCOL_VERSION, Role};
    use crate::medium::{Bitmap, Medium};

    fn encode(msg: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        LengthPrefixedCodec::new().encode(msg, &mut buf).unwrap();
        buf
    }

    fn list(id: u32) -> Message {
        Message::ListObjects { id }
    }

    fn bitmap_set(id: u32) -> Message {
        Message::SetData {
            id,
            object: "4c1e".into(),
            format: FormatEtc::new(ClipFormat::BITMAP, Tymed::GDI),
            medium: Medium::Gdi(Bitmap {
                width: 2,
                height: 1,
                bits: (0..=255).collect(),
            }),
            release: false,
        }
    }

    #[test]
    fn message_round_trip() {
        let mut buf = encode(Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
            role: Role::Consumer,
        });
        let decoded = LengthPrefixedCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            decoded,
            Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role: Role::Consumer,
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_medium_survives_framing() {
        let mut buf = encode(bitmap_set(7));
        let decoded = LengthPrefixedCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, bitmap_set(7));
    }

    #[test]
    fn partial_header_waits() {
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(FrameCodec::new().decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn partial_payload_resumes() {
        let mut rest = encode(bitmap_set(1));
        let mut partial = rest.split_to(rest.len() / 2);

        let mut codec = LengthPrefixedCodec::new();
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&rest);
        assert_eq!(codec.decode(&mut partial).unwrap().unwrap(), bitmap_set(1));
    }

    #[test]
    fn back_to_back_frames() {
        let mut buf = encode(list(1));
        buf.extend_from_slice(&encode(list(2)));

        let mut codec = LengthPrefixedCodec::new();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), list(1));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), list(2));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_header_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_PAYLOAD_SIZE + 1) as u32);
        buf.extend_from_slice(&[0u8; 16]);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge(n) if n == MAX_PAYLOAD_SIZE + 1));
    }

    #[test]
    fn oversized_payload_not_encoded() {
        let msg = Message::SetData {
            id: 1,
            object: "o".into(),
            format: FormatEtc::new(ClipFormat::TEXT, Tymed::HGLOBAL),
            medium: Medium::HGlobal(vec![0; MAX_PAYLOAD_SIZE]),
            release: true,
        };
        let mut buf = BytesMut::new();
        let err = FrameCodec::new().encode(msg, &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn header_is_big_endian_length() {
        let buf = encode(list(0));
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len() - HEADER_LEN, len);
    }

    // -- decode_frame --

    #[test]
    fn decode_frame_known_type() {
        let mut buf = encode(list(3));
        let payload = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert!(matches!(decode_frame(&payload), DecodeResult::Ok(Message::ListObjects { id: 3 })));
    }

    #[test]
    fn decode_frame_unknown_type() {
        #[derive(serde::Serialize)]
        struct Unknown {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let payload = rmp_serde::to_vec_named(&Unknown {
            msg_type: "get_canonical",
            id: 41,
        })
        .unwrap();
        match decode_frame(&payload) {
            DecodeResult::UnknownType(envelope) => {
                assert_eq!(envelope.id, 41);
                assert_eq!(envelope.msg_type, "get_canonical");
            }
            other => panic!("expected unknown type, got {other:?}"),
        }
    }

    #[test]
    fn decode_frame_garbage() {
        assert!(matches!(decode_frame(&[0xc1, 0x00]), DecodeResult::Malformed(_)));
    }
}
