//! Newline-terminated codec for the control channel
//!
//! Every message the node sends is a single ASCII line:
//! ```text
//! [ N bytes: text ][ '\n' ]
//! ```
//!
//! Commands from the client are not framed; only the first byte of each
//! receive is interpreted, so there is no decoder on the node side. The
//! decoder here is used by clients to split replies and pushed events back
//! into lines.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Longest line a decoder will buffer before giving up
pub const MAX_LINE_LEN: usize = 1024;

/// Errors that can occur while decoding lines
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Line too long: {0} bytes buffered without a terminator (max: {MAX_LINE_LEN})")]
    LineTooLong(usize),

    #[error("Line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Encode a line of text, appending exactly one `\n`
pub fn encode_line(text: &str) -> Bytes {
    let text = text.trim_end_matches('\n');
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Try to decode one line from a buffer
///
/// Returns:
/// - `Ok(Some(line))` with the terminator (and a trailing `\r`) stripped
/// - `Ok(None)` if no complete line is buffered yet
/// - `Err(...)` if the buffered data can never form a valid line
pub fn decode_line(buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
    let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
        if buf.len() > MAX_LINE_LEN {
            return Err(CodecError::LineTooLong(buf.len()));
        }
        return Ok(None);
    };

    if pos > MAX_LINE_LEN {
        return Err(CodecError::LineTooLong(pos));
    }

    let line = buf.split_to(pos);
    buf.advance(1);

    let text = std::str::from_utf8(&line)?;
    Ok(Some(text.trim_end_matches('\r').to_string()))
}

/// Streaming line decoder
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Add received bytes to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next line from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines.
    /// After an error the buffer is discarded so the decoder can resynchronise.
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        let result = decode_line(&mut self.buffer);
        if result.is_err() {
            self.buffer.clear();
        }
        result
    }

    /// Bytes buffered that do not yet form a complete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_single_newline() {
        assert_eq!(&encode_line("Motor Stopped")[..], b"Motor Stopped\n");
        assert_eq!(&encode_line("Button Pressed!\n")[..], b"Button Pressed!\n");
    }

    #[test]
    fn test_partial_line() {
        let mut buf = BytesMut::from(&b"LED1 Bli"[..]);
        assert!(decode_line(&mut buf).expect("decode error").is_none());
        assert_eq!(buf.len(), 8, "partial data must not be consumed");
    }

    #[test]
    fn test_decoder_joins_chunks_and_splits_lines() {
        let mut decoder = LineDecoder::new();

        decoder.extend(b"Motor Forw");
        assert!(decoder.decode_next().expect("decode error").is_none());

        decoder.extend(b"ard (F)\nButton Pressed!\r\nMotor");
        assert_eq!(
            decoder.decode_next().expect("decode error").as_deref(),
            Some("Motor Forward (F)")
        );
        assert_eq!(
            decoder.decode_next().expect("decode error").as_deref(),
            Some("Button Pressed!")
        );
        assert!(decoder.decode_next().expect("decode error").is_none());
        assert_eq!(decoder.pending(), 5);
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = LineDecoder::new();
        decoder.extend(&vec![b'x'; MAX_LINE_LEN + 1]);

        let result = decoder.decode_next();
        assert!(matches!(result, Err(CodecError::LineTooLong(_))));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = BytesMut::from(&[0xff, 0xfe, b'\n'][..]);
        assert!(matches!(decode_line(&mut buf), Err(CodecError::InvalidUtf8(_))));
    }
}
