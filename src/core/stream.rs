use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};
use std::sync::Arc;

/// In-memory byte reader over the document buffer.
///
/// The buffer is shared through an `Arc`, so sub-streams made for object
/// parsing never copy the document. `Stream` is `Send + Sync` which lets page
/// workers on other threads open their own readers over the same bytes.
#[derive(Debug, Clone)]
pub struct Stream {
    /// The underlying byte buffer (shared via Arc)
    bytes: Arc<[u8]>,
    /// Current read position
    pos: usize,
    /// Starting offset in the buffer
    start: usize,
    /// Length of accessible data from start
    length: usize,
}

impl Stream {
    /// Creates a stream over a window of a shared buffer.
    ///
    /// The window is clamped to the buffer.
    pub fn from_arc(bytes: Arc<[u8]>, start: usize, length: usize) -> Self {
        let start = start.min(bytes.len());
        let length = length.min(bytes.len() - start);
        Stream {
            bytes,
            pos: start,
            start,
            length,
        }
    }

    /// Creates a new Stream from a byte vector.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len();
        Self::from_arc(Arc::from(bytes), 0, length)
    }

    /// Returns the readable window as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.length]
    }

    /// Returns the shared buffer.
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.bytes
    }
}

impl BaseStream for Stream {
    fn length(&self) -> usize {
        self.length
    }

    fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) -> PDFResult<()> {
        if pos < self.start || pos > self.end() {
            return Err(PDFError::InvalidPosition {
                pos,
                length: self.length,
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn get_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.end() {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>> {
        let end_pos = self.pos + length;
        if end_pos > self.end() {
            return Err(PDFError::UnexpectedEndOfStream);
        }

        let bytes = self.bytes[self.pos..end_pos].to_vec();
        self.pos = end_pos;
        Ok(bytes)
    }

    fn get_byte_range(&self, begin: usize, end: usize) -> PDFResult<Vec<u8>> {
        if begin > end || begin < self.start || end > self.end() {
            return Err(PDFError::InvalidByteRange { begin, end });
        }

        Ok(self.bytes[begin..end].to_vec())
    }

    fn reset(&mut self) -> PDFResult<()> {
        self.pos = self.start;
        Ok(())
    }

    fn end(&self) -> usize {
        self.start + self.length
    }

    fn make_sub_stream(&self, start: usize, length: usize) -> PDFResult<Box<dyn BaseStream>> {
        if start < self.start || start + length > self.end() {
            return Err(PDFError::InvalidByteRange {
                begin: start,
                end: start + length,
            });
        }

        Ok(Box::new(Stream::from_arc(
            Arc::clone(&self.bytes),
            start,
            length,
        )))
    }

    fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        if needle.is_empty() || from < self.start || from >= self.end() {
            return None;
        }
        self.bytes[from..self.end()]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|offset| from + offset)
    }
}
