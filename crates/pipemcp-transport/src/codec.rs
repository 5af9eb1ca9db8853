//! Newline-delimited JSON framing.
//!
//! [`JsonLineCodec`] buffers raw bytes and only decodes complete lines as
//! UTF-8, so a multi-byte character split across two reads is reassembled
//! before decoding. Lines that are blank, oversized or not valid UTF-8 never
//! reach the caller; the last two are logged at `warn` and counted as dropped.
//!
//! The decoder never returns an error for bad input. `FramedRead` terminates
//! the stream after the first decoder error, and one bad line from a server
//! must not end the session.
//!
//! When metrics are attached, the number of bytes still waiting for a
//! newline is published after every decode call.

use std::io;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::metrics::AtomicMetrics;

/// Default upper bound on a single frame (10 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 10 * 1024 * 1024;

/// Line codec for one-JSON-value-per-line streams.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_length: usize,
    /// Offset already scanned for `\n` in the current buffer.
    next_index: usize,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
    metrics: Option<Arc<AtomicMetrics>>,
}

impl JsonLineCodec {
    /// Codec with the default frame limit
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Codec that drops lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            metrics: None,
        }
    }

    /// Counts decoded and dropped frames in `metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<AtomicMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Frame size limit in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn dropped(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped();
        }
    }

    /// Whether an unterminated line is already too long. A trailing `\r` may
    /// still be the first half of a CRLF delimiter, so it does not count.
    fn exceeds_limit(&self, partial: &[u8]) -> bool {
        let body = partial.strip_suffix(b"\r").unwrap_or(partial);
        body.len() > self.max_length
    }

    /// Turns one line (delimiter removed) into a frame, or `None` to skip it.
    fn frame_from(&self, line: &[u8]) -> Option<String> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() > self.max_length {
            warn!(
                "Dropping inbound frame of {} bytes (max {})",
                line.len(),
                self.max_length
            );
            self.dropped();
            return None;
        }
        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping inbound frame that is not valid UTF-8: {}", e);
                self.dropped();
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_received(text.len());
        }
        trace!("Decoded frame: {}", text);
        Some(text.to_string())
    }

    fn next_frame(&mut self, buf: &mut BytesMut) -> Option<String> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match (self.discarding, newline) {
                (true, Some(pos)) => {
                    buf.advance(pos + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return None;
                }
                (false, Some(pos)) => {
                    self.next_index = 0;
                    let line = buf.split_to(pos + 1);
                    if let Some(frame) = self.frame_from(&line[..pos]) {
                        return Some(frame);
                    }
                }
                (false, None) if self.exceeds_limit(buf) => {
                    warn!(
                        "Inbound line exceeds {} bytes, discarding until next newline",
                        self.max_length
                    );
                    self.dropped();
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                    return None;
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return None;
                }
            }
        }
    }

    fn last_frame(&mut self, buf: &mut BytesMut) -> Option<String> {
        if let Some(frame) = self.next_frame(buf) {
            return Some(frame);
        }
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return None;
        }
        let line = buf.split_to(buf.len());
        self.frame_from(&line)
    }

    fn publish_buffered(&self, buf: &BytesMut) {
        if let Some(metrics) = &self.metrics {
            metrics.set_buffered(buf.len());
        }
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        let frame = self.next_frame(buf);
        self.publish_buffered(buf);
        Ok(frame)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        let frame = self.last_frame(buf);
        self.publish_buffered(buf);
        Ok(frame)
    }
}

impl Encoder<String> for JsonLineCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        if frame.bytes().any(|b| b == b'\n' || b == b'\r') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame contains a line break",
            ));
        }
        if frame.len() > self.max_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame of {} bytes exceeds maximum of {}",
                    frame.len(),
                    self.max_length
                ),
            ));
        }
        dst.reserve(frame.len() + 1);
        dst.put_slice(frame.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode_all(codec: &mut JsonLineCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn splits_on_newlines_and_keeps_partial_tail() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}\n{\"c\""[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(&buf[..], b"{\"c\"");

        buf.extend_from_slice(b":3}\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"c\":3}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn skips_blank_lines_and_strips_carriage_returns() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"\n   \n{\"a\":1}\r\n\t\r\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"a\":1}"]);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let mut codec = JsonLineCodec::new();
        let text = "{\"msg\":\"héllo\"}\n".as_bytes();
        let split = text.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut buf = BytesMut::from(&text[..split]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&text[split..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("{\"msg\":\"héllo\"}")
        );
    }

    #[test]
    fn invalid_utf8_line_is_dropped_and_decoding_continues() {
        let metrics = Arc::new(AtomicMetrics::new());
        let mut codec = JsonLineCodec::new().with_metrics(Arc::clone(&metrics));
        let mut buf = BytesMut::from(&b"\xff\xfe\n{\"ok\":true}\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"ok\":true}"]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.messages_received, 1);
    }

    #[test]
    fn buffered_bytes_gauge_tracks_partial_line() {
        let metrics = Arc::new(AtomicMetrics::new());
        let mut codec = JsonLineCodec::new().with_metrics(Arc::clone(&metrics));
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"partial"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"a\":1}"]);
        assert_eq!(metrics.snapshot().buffered_bytes, 9);

        buf.extend_from_slice(b"\":2}\n");
        assert_eq!(decode_all(&mut codec, &mut buf).len(), 1);
        assert_eq!(metrics.snapshot().buffered_bytes, 0);
    }

    #[test]
    fn oversized_line_is_discarded_up_to_next_newline() {
        let mut codec = JsonLineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"still too long\n{\"a\":1}\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["{\"a\":1}"]);
    }

    #[test]
    fn complete_oversized_line_is_dropped() {
        let mut codec = JsonLineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"123456\n1234\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["1234"]);
    }

    #[test]
    fn crlf_frame_at_the_limit_survives_a_split_delimiter() {
        let mut codec = JsonLineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"12345678\r\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["12345678"]);

        let mut buf = BytesMut::from(&b"12345678\r"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 9);
        buf.extend_from_slice(b"\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec!["12345678"]);

        let mut buf = BytesMut::from(&b"123456789"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn trailing_line_is_emitted_at_eof() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn encoder_appends_newline_and_rejects_line_breaks() {
        let mut codec = JsonLineCodec::new();
        let mut dst = BytesMut::new();
        codec.encode("{\"a\":1}".to_string(), &mut dst).unwrap();
        assert_eq!(&dst[..], b"{\"a\":1}\n");

        let err = codec
            .encode("{\"a\":\n1}".to_string(), &mut dst)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn encoder_rejects_oversized_frames() {
        let mut codec = JsonLineCodec::with_max_length(3);
        let mut dst = BytesMut::new();
        assert!(codec.encode("1234".to_string(), &mut dst).is_err());
        assert!(dst.is_empty());
    }

    mod chunking {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunk_boundaries_do_not_change_frames(
                frames in proptest::collection::vec("[a-zA-Z0-9 {}:\",é€]{1,24}", 1..8),
                cut in 1usize..7,
            ) {
                let expected: Vec<String> = frames
                    .iter()
                    .filter(|f| !f.trim().is_empty())
                    .cloned()
                    .collect();
                let wire: Vec<u8> = frames
                    .iter()
                    .flat_map(|f| f.bytes().chain(std::iter::once(b'\n')))
                    .collect();

                let mut codec = JsonLineCodec::new();
                let mut buf = BytesMut::new();
                let mut decoded = Vec::new();
                for chunk in wire.chunks(cut) {
                    buf.extend_from_slice(chunk);
                    while let Some(frame) = codec.decode(&mut buf).unwrap() {
                        decoded.push(frame);
                    }
                }
                prop_assert_eq!(decoded, expected);
            }
        }
    }
}
