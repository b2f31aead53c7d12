//! Stream helpers that never read ahead of what they return.
//!
//! A transport may carry several messages one after another, so readers in
//! this crate must not pull bytes belonging to the next message into a buffer.
use std::io::{ErrorKind, Read};

pub(crate) const IO_BUFFER_LENGTH: usize = 4096;

pub trait LogicalPosition {
    /// Number of bytes consumed so far.
    fn logical_position(&self) -> u64;
}

/// Reader that counts the bytes read through it.
#[derive(Debug)]
pub struct PositionReader<R: Read> {
    reader: R,
    logical_position: u64,
}

impl<R: Read> PositionReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            logical_position: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for PositionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read_len = self.reader.read(buf)?;
        self.logical_position += read_len as u64;
        Ok(read_len)
    }
}

impl<R: Read> LogicalPosition for PositionReader<R> {
    fn logical_position(&self) -> u64 {
        self.logical_position
    }
}

/// How a call to [`read_line`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// The line, including its `\n`, was appended.
    Complete,
    /// The stream ended before any byte was read.
    Eof,
    /// The stream ended in the middle of a line.
    Truncated,
    /// The limit was reached before a `\n` was found.
    TooLong,
}

/// Reads a single byte, retrying on interruption.
pub fn read_byte<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Option<u8>> {
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

/// Appends bytes up to and including the next `\n` to `buf`.
///
/// Reads one byte at a time so nothing after the line is consumed.
pub fn read_line<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineEnd> {
    let start = buf.len();

    loop {
        if buf.len() - start >= limit {
            return Ok(LineEnd::TooLong);
        }

        match read_byte(reader)? {
            Some(byte) => {
                buf.push(byte);

                if byte == b'\n' {
                    return Ok(LineEnd::Complete);
                }
            }
            None if buf.len() == start => return Ok(LineEnd::Eof),
            None => return Ok(LineEnd::Truncated),
        }
    }
}

/// Returns whether the line ends with `\n` but not `\r\n`.
pub fn is_bare_newline(line: &[u8]) -> bool {
    line.ends_with(b"\n") && !line.ends_with(b"\r\n")
}

/// Returns whether the line holds nothing but its terminator.
pub fn is_empty_line(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

/// Returns the line without its `\r\n` or `\n` terminator.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_line_does_not_read_ahead() {
        let mut input = Cursor::new(b"abc\r\ndef\nrest".to_vec());
        let mut buf = Vec::new();

        assert_eq!(read_line(&mut input, &mut buf, 100).unwrap(), LineEnd::Complete);
        assert_eq!(buf, b"abc\r\n");
        assert_eq!(input.position(), 5);

        buf.clear();
        assert_eq!(read_line(&mut input, &mut buf, 100).unwrap(), LineEnd::Complete);
        assert_eq!(buf, b"def\n");
        assert!(is_bare_newline(&buf));

        buf.clear();
        assert_eq!(read_line(&mut input, &mut buf, 100).unwrap(), LineEnd::Truncated);
        assert_eq!(buf, b"rest");

        buf.clear();
        assert_eq!(read_line(&mut input, &mut buf, 100).unwrap(), LineEnd::Eof);
    }

    #[test]
    fn test_read_line_limit() {
        let mut input = Cursor::new(b"0123456789\r\n".to_vec());
        let mut buf = Vec::new();

        assert_eq!(read_line(&mut input, &mut buf, 4).unwrap(), LineEnd::TooLong);
        assert_eq!(buf, b"0123");
    }

    #[test]
    fn test_position_reader() {
        let mut reader = PositionReader::new(Cursor::new(vec![0u8; 10000]));
        let mut buf = vec![0u8; IO_BUFFER_LENGTH];

        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.logical_position(), IO_BUFFER_LENGTH as u64);

        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        assert_eq!(reader.logical_position(), 10000);
    }

    #[test]
    fn test_line_helpers() {
        assert!(is_empty_line(b"\r\n"));
        assert!(is_empty_line(b"\n"));
        assert!(!is_empty_line(b"a\r\n"));
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
    }
}
