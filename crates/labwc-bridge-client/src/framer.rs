//! Newline framing for the labwc byte stream
//!
//! The socket delivers arbitrary chunks; records are separated by `\n`.
//! [`Framer`] buffers bytes (not text) so that a multi-byte UTF-8 character
//! split across two reads is reassembled before decoding.

/// Accumulates raw bytes and hands out complete newline-terminated frames
#[derive(Debug, Default)]
pub struct Framer {
    buffer: Vec<u8>,
    /// Offset of the first byte not yet handed out as part of a frame
    start: usize,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over every complete frame now buffered
    ///
    /// Frames are produced lazily. Any frame the caller does not pull from
    /// the iterator stays buffered and is yielded first next time.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.compact();
        self.buffer.extend_from_slice(bytes);
        Frames { framer: self }
    }

    /// Resume iteration over already buffered frames without new input
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { framer: self }
    }

    /// Bytes received but not yet handed out
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.start..]
    }

    /// Drop everything buffered, e.g. when the stream is replaced
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start = 0;
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }

    fn next_frame(&mut self) -> Option<String> {
        let rest = &self.buffer[self.start..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        let frame = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.start += end + 1;
        Some(frame)
    }
}

/// Lazy sequence of complete frames borrowed from a [`Framer`]
#[derive(Debug)]
pub struct Frames<'a> {
    framer: &'a mut Framer,
}

impl Iterator for Frames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_frame()
    }
}
