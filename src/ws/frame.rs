//! Length-prefixed frame codec for the data socket.
//!
//! Every payload travels as `~m~<len>~m~<body>`, where `<len>` is the body
//! length in UTF-8 bytes. Several frames may be concatenated in one socket
//! message, and a frame may arrive split across messages; `FrameDecoder`
//! carries the unconsumed tail between reads. Heartbeats are ordinary frames
//! whose body is `~h~<n>`.

use crate::error::WsError;

/// Frame delimiter token.
pub const FRAME_MARKER: &str = "~m~";

/// Heartbeat body prefix.
const HEARTBEAT_PREFIX: &str = "~h~";

/// Decoder buffer cap. A buffer that grows past this without yielding a
/// frame means the stream has desynchronized and the connection is dead.
pub const MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// One decoded frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Server heartbeat `~h~<n>`; must be echoed back verbatim.
    Heartbeat(u64),
    /// Any other body, normally a JSON document.
    Message(String),
}

/// Encode a body into a single wire frame.
pub fn encode(body: &str) -> String {
    format!("{}{}{}{}", FRAME_MARKER, body.len(), FRAME_MARKER, body)
}

/// Encode the echo reply for heartbeat `n`.
pub fn encode_heartbeat(n: u64) -> String {
    encode(&format!("{}{}", HEARTBEAT_PREFIX, n))
}

/// Incremental frame decoder.
///
/// `feed` appends a chunk and drains every complete frame from the front of
/// the buffer. Truncated or malformed input is retained for the next read;
/// only buffer growth past the cap (or a declared length that can never fit
/// under it) is a protocol error, which poisons the decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: String,
    limit: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
        }
    }

    /// Bytes currently buffered awaiting a frame boundary.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feed one chunk of socket text, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Frame>, WsError> {
        self.buf.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_next()? {
            frames.push(frame);
        }

        if frames.is_empty() && self.buf.len() > self.limit {
            return Err(WsError::ProtocolError(format!(
                "frame buffer exceeded {} bytes without a frame boundary",
                self.limit
            )));
        }

        Ok(frames)
    }

    /// Attempt to split one frame off the front of the buffer.
    ///
    /// `Ok(None)` means the buffer holds no complete frame yet.
    fn try_next(&mut self) -> Result<Option<Frame>, WsError> {
        if self.buf.len() < FRAME_MARKER.len() || !self.buf.starts_with(FRAME_MARKER) {
            // Either a partial marker or garbage; retain and let the cap decide.
            return Ok(None);
        }

        let digits_start = FRAME_MARKER.len();
        let Some(rel) = self.buf[digits_start..].find(FRAME_MARKER) else {
            return Ok(None);
        };
        let digits = &self.buf[digits_start..digits_start + rel];
        let Ok(len) = digits.parse::<usize>() else {
            // Not a length header. Retained; the cap turns persistent garbage
            // into a protocol error.
            return Ok(None);
        };

        if len > self.limit {
            return Err(WsError::ProtocolError(format!(
                "declared frame length {} exceeds the {} byte cap",
                len, self.limit
            )));
        }

        let body_start = digits_start + rel + FRAME_MARKER.len();
        let body_end = body_start + len;
        if self.buf.len() < body_end {
            return Ok(None);
        }
        if !self.buf.is_char_boundary(body_end) {
            // The peer counted something other than UTF-8 bytes; offsets can
            // never realign.
            return Err(WsError::ProtocolError(format!(
                "frame length {} does not end on a character boundary",
                len
            )));
        }

        let body = self.buf[body_start..body_end].to_string();
        self.buf.drain(..body_end);

        if let Some(rest) = body.strip_prefix(HEARTBEAT_PREFIX) {
            if let Ok(n) = rest.parse::<u64>() {
                return Ok(Some(Frame::Heartbeat(n)));
            }
        }
        Ok(Some(Frame::Message(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        assert_eq!(encode("abc"), "~m~3~m~abc");
        assert_eq!(encode(""), "~m~0~m~");
        assert_eq!(encode_heartbeat(5), "~m~4~m~~h~5");
        assert_eq!(encode_heartbeat(123), "~m~6~m~~h~123");
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut dec = FrameDecoder::new();
        let body = r#"{"m":"qsd","p":["qs_x",{}]}"#;
        let frames = dec.feed(&encode(body)).unwrap();
        assert_eq!(frames, vec![Frame::Message(body.to_string())]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn test_decode_concatenated_frames() {
        let mut dec = FrameDecoder::new();
        let input = format!("{}{}{}", encode("one"), encode_heartbeat(2), encode("three"));
        let frames = dec.feed(&input).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::Message("one".to_string()),
                Frame::Heartbeat(2),
                Frame::Message("three".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_partial_header_then_rest() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed("~m~1").unwrap().is_empty());
        assert!(dec.feed("1~m~hello").unwrap().is_empty());
        let frames = dec.feed("world!").unwrap();
        assert_eq!(frames, vec![Frame::Message("helloworld!".to_string())]);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn test_decode_partial_body_retained() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed("~m~5~m~hel").unwrap().is_empty());
        assert_eq!(dec.pending(), 10);
        let frames = dec.feed(&format!("lo{}", encode("next"))).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::Message("hello".to_string()),
                Frame::Message("next".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_multibyte_body() {
        let mut dec = FrameDecoder::new();
        let body = "ação ₿";
        let frames = dec.feed(&encode(body)).unwrap();
        assert_eq!(frames, vec![Frame::Message(body.to_string())]);
    }

    #[test]
    fn test_heartbeat_with_trailing_noise_is_message() {
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(&encode("~h~12x")).unwrap();
        assert_eq!(frames, vec![Frame::Message("~h~12x".to_string())]);
    }

    #[test]
    fn test_garbage_past_cap_is_protocol_error() {
        let mut dec = FrameDecoder::with_limit(64);
        assert!(dec.feed("not a frame").unwrap().is_empty());
        let err = dec.feed(&"x".repeat(100)).unwrap_err();
        assert!(matches!(err, WsError::ProtocolError(_)));
    }

    #[test]
    fn test_declared_length_past_cap_is_protocol_error() {
        let mut dec = FrameDecoder::with_limit(64);
        let err = dec.feed("~m~100000~m~").unwrap_err();
        assert!(matches!(err, WsError::ProtocolError(_)));
    }

    #[test]
    fn test_length_off_char_boundary_is_protocol_error() {
        let mut dec = FrameDecoder::new();
        // 'é' is two bytes; a one-byte length lands mid-character.
        let err = dec.feed("~m~1~m~é").unwrap_err();
        assert!(matches!(err, WsError::ProtocolError(_)));
    }

    #[test]
    fn test_garbage_under_cap_is_retained() {
        let mut dec = FrameDecoder::with_limit(64);
        assert!(dec.feed("junk").unwrap().is_empty());
        assert_eq!(dec.pending(), 4);
    }
}
