//! Incremental CRLF line framing over a byte stream

/// Accumulates received bytes and hands out complete lines.
///
/// Each call to [`LineBuffer::next_line`] resumes scanning where the previous
/// unsuccessful scan stopped, minus one byte so a terminator split across two
/// reads is still found.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete line without its CRLF.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let start = self.scanned.saturating_sub(1);
        match self.buffer[start..]
            .windows(2)
            .position(|pair| pair == b"\r\n")
        {
            Some(offset) => {
                let end = start + offset;
                let line = self.buffer[..end].to_vec();
                self.buffer.drain(..end + 2);
                self.scanned = 0;
                Some(line)
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// True when [`LineBuffer::next_line`] would return a line.
    pub fn has_line(&self) -> bool {
        self.buffer[self.scanned.saturating_sub(1)..]
            .windows(2)
            .any(|pair| pair == b"\r\n")
    }

    /// True when nothing at all is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut lines = LineBuffer::new();
        lines.extend(b"HELLO abc\r\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"HELLO abc"[..]));
        assert_eq!(lines.next_line(), None);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_multiple_lines_and_tail() {
        let mut lines = LineBuffer::new();
        lines.extend(b"PUT 1 2\r\nPUT 3 4\r\nPUT 5");
        assert_eq!(lines.next_line().as_deref(), Some(&b"PUT 1 2"[..]));
        assert_eq!(lines.next_line().as_deref(), Some(&b"PUT 3 4"[..]));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.len(), 5);

        lines.extend(b" 6\r\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"PUT 5 6"[..]));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_terminator_split_across_reads() {
        let mut lines = LineBuffer::new();
        lines.extend(b"PUT 0 1\r");
        assert_eq!(lines.next_line(), None);
        lines.extend(b"\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"PUT 0 1"[..]));
    }

    #[test]
    fn test_byte_by_byte_delivery() {
        let mut lines = LineBuffer::new();
        let mut received = Vec::new();
        for byte in b"A\r\nBC\r\n\r\n" {
            lines.extend(&[*byte]);
            while let Some(line) = lines.next_line() {
                received.push(line);
            }
        }
        assert_eq!(received, vec![b"A".to_vec(), b"BC".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_has_line_tracks_complete_lines() {
        let mut lines = LineBuffer::new();
        lines.extend(b"PUT 1 2\r");
        assert!(!lines.has_line());
        assert_eq!(lines.next_line(), None);
        lines.extend(b"\nPUT 3 4\r\nPUT");
        assert!(lines.has_line());

        lines.next_line();
        assert!(lines.has_line());
        lines.next_line();
        assert!(!lines.has_line());
        assert!(!lines.is_empty());
    }

    #[test]
    fn test_bare_newline_is_not_a_terminator() {
        let mut lines = LineBuffer::new();
        lines.extend(b"PUT 1 2\nPUT");
        assert_eq!(lines.next_line(), None);
        lines.extend(b"\r\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"PUT 1 2\nPUT"[..]));
    }
}
