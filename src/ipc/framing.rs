//! Newline-delimited frame decoding
//!
//! The wire carries one JSON object per line. [`FrameCodec`] is the
//! `tokio_util` decoder the receive loop drives through `FramedRead`; it
//! yields complete frames with the delimiter stripped.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Frame delimiter on the wire
pub const DELIMITER: u8 = b'\n';

/// Default cap on buffered bytes without a delimiter (1 MiB)
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// Line decoder with a length cap that never fails the stream
///
/// `LinesCodec` reports an oversized line as an error, which ends a
/// `FramedRead`. Here the buffered bytes are dropped instead, along with the
/// rest of that frame up to the next delimiter, and decoding carries on.
/// Empty lines are skipped.
#[derive(Debug)]
pub struct FrameCodec {
    max_len: usize,
    /// Bytes at the front of the buffer already known to contain no delimiter
    next_index: usize,
    /// Dropping the tail of an oversized frame
    discarding: bool,
    overflows: u64,
}

impl FrameCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            next_index: 0,
            discarding: false,
            overflows: 0,
        }
    }

    /// How many frames were dropped for exceeding the cap
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER)
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Vec<u8>>> {
        loop {
            let read_to = buf.len().min(self.max_len.saturating_add(1));
            let found = buf[self.next_index..read_to]
                .iter()
                .position(|&b| b == DELIMITER)
                .map(|offset| self.next_index + offset);

            match (self.discarding, found) {
                (true, Some(end)) => {
                    buf.advance(end + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(end)) => {
                    let line = buf.split_to(end + 1);
                    self.next_index = 0;
                    if end > 0 {
                        return Ok(Some(line[..end].to_vec()));
                    }
                }
                (false, None) if buf.len() > self.max_len => {
                    tracing::warn!(
                        buffered = buf.len(),
                        cap = self.max_len,
                        "Receive buffer exceeded cap without a delimiter, clearing"
                    );
                    self.discarding = true;
                    self.overflows += 1;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Vec<u8>>> {
        let frame = self.decode(buf)?;
        if frame.is_none() && !buf.is_empty() {
            tracing::debug!(bytes = buf.len(), "Dropping partial frame at end of stream");
            buf.clear();
            self.next_index = 0;
            self.discarding = false;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frames: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            out.extend_from_slice(frame.as_bytes());
            out.push(DELIMITER);
        }
        out
    }

    /// Append a chunk and decode every frame it completes
    fn push(codec: &mut FrameCodec, buf: &mut BytesMut, chunk: &[u8]) -> Vec<Vec<u8>> {
        buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_single_chunk_many_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frames = push(
            &mut codec,
            &mut buf,
            &wire(&[r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]),
        );
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], br#"{"a":1}"#.to_vec());
        assert_eq!(frames[2], br#"{"c":3}"#.to_vec());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_every_split_point_yields_same_frames() {
        let expected = [r#"{"id":"1","text":"hello"}"#, r#"{"id":"2"}"#, r#"{"id":"3","n":[1,2]}"#];
        let bytes = wire(&expected);

        for split in 0..=bytes.len() {
            let mut codec = FrameCodec::default();
            let mut buf = BytesMut::new();
            let mut frames = push(&mut codec, &mut buf, &bytes[..split]);
            frames.extend(push(&mut codec, &mut buf, &bytes[split..]));

            let frames: Vec<String> = frames
                .into_iter()
                .map(|f| String::from_utf8(f).unwrap())
                .collect();
            assert_eq!(frames, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        // Escaped newline inside a string value is not a delimiter
        let bytes = wire(&[r#"{"x":"a\nb"}"#, "{}"]);
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let mut count = 0;
        for byte in &bytes {
            count += push(&mut codec, &mut buf, std::slice::from_ref(byte)).len();
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frames = push(&mut codec, &mut buf, b"\n\n{\"a\":1}\n\n");
        assert_eq!(frames, vec![b"{\"a\":1}".to_vec()]);
    }

    #[test]
    fn test_overflow_clears_buffer() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        let frames = push(&mut codec, &mut buf, &[b'x'; 100]);
        assert!(frames.is_empty());
        assert!(buf.is_empty());
        assert_eq!(codec.overflow_count(), 1);
    }

    #[test]
    fn test_usable_after_overflow() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        push(&mut codec, &mut buf, &[b'x'; 100]);

        // Tail of the oversized frame is dropped, the next frame survives
        let frames = push(&mut codec, &mut buf, b"xxxx\n{\"ok\":true}\n");
        assert_eq!(frames, vec![b"{\"ok\":true}".to_vec()]);
    }

    #[test]
    fn test_oversized_frame_in_one_chunk() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        let frames = push(&mut codec, &mut buf, b"0123456789abcdef\n{}\n");
        assert_eq!(frames, vec![b"{}".to_vec()]);
        assert_eq!(codec.overflow_count(), 1);
    }

    #[test]
    fn test_frame_at_cap_is_kept() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        let frames = push(&mut codec, &mut buf, b"01234567\n");
        assert_eq!(frames, vec![b"01234567".to_vec()]);
        assert_eq!(codec.overflow_count(), 0);
    }

    #[test]
    fn test_growth_below_cap_is_kept() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        push(&mut codec, &mut buf, b"{\"partial\":");
        assert_eq!(buf.len(), 11);
        let frames = push(&mut codec, &mut buf, b"1}\n");
        assert_eq!(frames, vec![b"{\"partial\":1}".to_vec()]);
    }

    #[test]
    fn test_partial_frame_dropped_at_eof() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"trunc"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }
}
