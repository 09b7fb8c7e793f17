//! Length-prefixed wire framing.
//!
//! Every frame on the wire is laid out as:
//!
//! ```text
//! +----------------+---------+----------------------+
//! | length: u32 BE | version | JSON payload         |
//! +----------------+---------+----------------------+
//!                  |<------------ length ---------->|
//! ```
//!
//! The length counts the version byte plus the payload. Outbound frames
//! carry a JSON array (one batch); inbound frames carry a single JSON value.

use bytes::{Buf, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_core::logging::targets;

use crate::error::{ChannelError, Result};

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// The only frame version this crate speaks.
pub const FRAME_VERSION: u8 = 1;

/// Default upper bound on a frame's length (version byte + payload).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Serialize `value` into a complete frame.
///
/// Fails with [`ChannelError::FrameTooLarge`] if the frame would exceed
/// `max_frame_length`, or [`ChannelError::Encode`] if serialization fails.
pub fn encode_frame<T>(value: &T, max_frame_length: usize) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(value)?;
    let length = payload.len() + 1;
    let too_large = || ChannelError::FrameTooLarge {
        length,
        limit: max_frame_length,
    };
    if length > max_frame_length {
        return Err(too_large());
    }
    let prefix = u32::try_from(length).map_err(|_| too_large())?;

    let mut frame = Vec::with_capacity(HEADER_LEN + length);
    frame.extend_from_slice(&prefix.to_be_bytes());
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Incremental frame decoder.
///
/// Bytes are fed in as they arrive from the socket; complete frames are
/// pulled out with [`decode`](Self::decode). A partial frame stays buffered
/// until the rest of it arrives.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_length: usize,
}

impl FrameDecoder {
    /// Create a decoder that rejects frames longer than `max_frame_length`.
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_length,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Errors leave the
    /// decoder in an unspecified state; the stream should be abandoned.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = &self.buffer[..HEADER_LEN];
        let length = header.get_u32() as usize;
        if length == 0 {
            return Err(ChannelError::Decode("zero-length frame".into()));
        }
        if length > self.max_frame_length {
            return Err(ChannelError::Decode(format!(
                "frame of {length} bytes exceeds the {} byte limit",
                self.max_frame_length
            )));
        }
        if self.buffer.len() < HEADER_LEN + length {
            tracing::trace!(
                target: targets::CODEC,
                buffered = self.buffer.len(),
                needed = HEADER_LEN + length,
                "partial frame"
            );
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let body = self.buffer.split_to(length);
        let version = body[0];
        if version != FRAME_VERSION {
            return Err(ChannelError::Decode(format!(
                "unsupported frame version {version}"
            )));
        }

        serde_json::from_slice(&body[1..])
            .map(Some)
            .map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&json!(["ping"]), DEFAULT_MAX_FRAME_LENGTH).unwrap();
        let payload = br#"["ping"]"#;

        assert_eq!(&frame[..4], &((payload.len() + 1) as u32).to_be_bytes());
        assert_eq!(frame[4], FRAME_VERSION);
        assert_eq!(&frame[5..], payload);
    }

    #[test]
    fn test_decode_split_across_reads() {
        let frame = encode_frame(&json!({"user": "erik", "id": 7}), 1024).unwrap();
        let mut decoder = FrameDecoder::new(1024);

        for byte in &frame[..frame.len() - 1] {
            decoder.extend(std::slice::from_ref(byte));
            assert!(decoder.decode::<Value>().unwrap().is_none());
        }
        decoder.extend(&frame[frame.len() - 1..]);

        let value: Value = decoder.decode().unwrap().unwrap();
        assert_eq!(value, json!({"user": "erik", "id": 7}));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_back_to_back_frames_in_order() {
        let mut bytes = encode_frame(&json!("a"), 1024).unwrap();
        bytes.extend(encode_frame(&json!("b"), 1024).unwrap());
        bytes.extend(&encode_frame(&json!("c"), 1024).unwrap()[..3]);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&bytes);

        assert_eq!(decoder.decode::<Value>().unwrap(), Some(json!("a")));
        assert_eq!(decoder.decode::<Value>().unwrap(), Some(json!("b")));
        assert_eq!(decoder.decode::<Value>().unwrap(), None);
        assert_eq!(decoder.buffered(), 3);
    }

    #[test]
    fn test_encode_rejects_oversized_frame() {
        let err = encode_frame(&"x".repeat(64), 16).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::FrameTooLarge { limit: 16, .. }
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_prefix() {
        let mut decoder = FrameDecoder::new(8);
        decoder.extend(&100u32.to_be_bytes());
        assert!(matches!(
            decoder.decode::<Value>(),
            Err(ChannelError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_zero_length() {
        let mut decoder = FrameDecoder::new(8);
        decoder.extend(&0u32.to_be_bytes());
        assert!(decoder.decode::<Value>().is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut frame = encode_frame(&json!(1), 1024).unwrap();
        frame[4] = 9;
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&frame);

        let err = decoder.decode::<Value>().unwrap_err();
        assert!(err.to_string().contains("unsupported frame version 9"));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&4u32.to_be_bytes());
        frame.push(FRAME_VERSION);
        frame.extend_from_slice(b"{\"a");

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&frame);
        assert!(matches!(
            decoder.decode::<Value>(),
            Err(ChannelError::Decode(_))
        ));
    }
}
