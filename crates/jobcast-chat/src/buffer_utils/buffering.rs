use std::collections::VecDeque;

/// Circular buffer for line-based SSE parsing
///
/// Byte chunks arrive with no alignment to event boundaries; this buffer
/// accumulates them and hands back complete, trimmed lines. Invalid UTF-8
/// is replaced rather than rejected; a garbled line then fails JSON
/// parsing downstream and is skipped like any other malformed line.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    /// Create a new buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Add bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract the next complete line (up to `\n`), trimmed
    ///
    /// Returns None until a full line is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(String::from_utf8_lossy(&line_bytes).trim().to_string())
    }

    /// Bytes currently buffered without a terminating newline
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_complete_lines() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\n");

        assert_eq!(buffer.next_line().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_holds_partial_line_until_complete() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"data: par");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.len(), 9);

        buffer.extend(b"tial\n");
        assert_eq!(buffer.next_line().unwrap(), "data: partial");
    }

    #[test]
    fn test_trims_carriage_returns() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"data: x\r\n");
        assert_eq!(buffer.next_line().unwrap(), "data: x");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(&[0xff, 0xfe, b'\n']);
        let line = buffer.next_line().unwrap();
        assert!(!line.is_empty());
    }
}
