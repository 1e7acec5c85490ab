use super::error::PDFResult;

/// Byte reader interface shared by every parsing component.
///
/// Positions are absolute offsets into the underlying buffer, so a sub-stream
/// created at offset N reports `pos() == N` before its first read. This keeps
/// xref offsets and inline-image scans in file coordinates.
pub trait BaseStream {
    // ============================================================================
    // Required methods
    // ============================================================================

    /// Returns the total length of the stream in bytes.
    fn length(&self) -> usize;

    /// Returns true if the stream contains no data.
    fn is_empty(&self) -> bool;

    /// Returns the current position in the stream.
    fn pos(&self) -> usize;

    /// Sets the current position in the stream.
    fn set_pos(&mut self, pos: usize) -> PDFResult<()>;

    /// Reads and returns a single byte from the stream, advancing the position.
    fn get_byte(&mut self) -> PDFResult<u8>;

    /// Reads the specified number of bytes from the stream, advancing the position.
    fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>>;

    /// Returns a range of bytes from the stream without changing the current position.
    ///
    /// # Arguments
    /// * `begin` - Starting byte offset (inclusive)
    /// * `end` - Ending byte offset (exclusive)
    fn get_byte_range(&self, begin: usize, end: usize) -> PDFResult<Vec<u8>>;

    /// Resets the stream to its initial state.
    fn reset(&mut self) -> PDFResult<()>;

    /// Returns the absolute offset one past the last readable byte.
    fn end(&self) -> usize;

    /// Creates a sub-stream from this stream.
    ///
    /// # Arguments
    /// * `start` - Absolute starting offset for the sub-stream
    /// * `length` - Length of the sub-stream
    fn make_sub_stream(&self, start: usize, length: usize) -> PDFResult<Box<dyn BaseStream>>;

    // ============================================================================
    // Provided methods
    // ============================================================================

    /// Reads a single byte without advancing the position.
    fn peek_byte(&mut self) -> PDFResult<u8> {
        let current_pos = self.pos();
        let byte = self.get_byte()?;
        self.set_pos(current_pos)?;
        Ok(byte)
    }

    /// Reads a 16-bit unsigned integer (big-endian) from the stream.
    fn get_uint16(&mut self) -> PDFResult<u16> {
        let b0 = self.get_byte()?;
        let b1 = self.get_byte()?;
        Ok(((b0 as u16) << 8) | (b1 as u16))
    }

    /// Skips `n` bytes in the stream by advancing the position.
    fn skip(&mut self, n: usize) -> PDFResult<()> {
        self.set_pos(self.pos() + n)
    }

    /// Finds the first occurrence of `needle` at or after `from`.
    ///
    /// Returns the absolute offset of the match.
    fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        if needle.is_empty() || from >= self.end() {
            return None;
        }
        let haystack = self.get_byte_range(from, self.end()).ok()?;
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|offset| from + offset)
    }
}
