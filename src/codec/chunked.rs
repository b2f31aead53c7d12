//! The "chunked" transfer coding
//! ([RFC 7230 section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1)).
use std::io::{ErrorKind, Read, Write};

use crate::{
    error::{ProtocolError, ProtocolErrorKind},
    header::HeaderTable,
    io::{LineEnd, LogicalPosition, PositionReader},
    parser::ParserConfig,
};

/// Writes one chunk holding `data`.
///
/// An empty `data` writes nothing since a zero-size chunk ends the body.
pub fn write_chunk<W: Write>(data: &[u8], mut output: W) -> std::io::Result<()> {
    if !data.is_empty() {
        write!(output, "{:x}\r\n", data.len())?;
        output.write_all(data)?;
        output.write_all(b"\r\n")?;
    }

    Ok(())
}

/// Writes the terminal chunk without trailer fields.
pub fn write_last_chunk<W: Write>(mut output: W) -> std::io::Result<()> {
    output.write_all(b"0\r\n\r\n")
}

/// Encodes the contents of an un-encoded stream with the chunked coding.
///
/// Each read of the source produces one complete chunk. The source is read
/// lazily, one chunk at a time, as the encoder itself is read.
#[derive(Debug)]
pub struct ChunkedEncoder<R: Read> {
    source: R,
    chunk: Vec<u8>,
    output: Vec<u8>,
    output_position: usize,
    chunk_count: u64,
    terminated: bool,
}

impl<R: Read> ChunkedEncoder<R> {
    /// Creates an encoder that reads at most `chunk_size` bytes per chunk.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunk: vec![0; chunk_size.max(1)],
            output: Vec::new(),
            output_position: 0,
            chunk_count: 0,
            terminated: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    /// Number of non-terminal chunks produced so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Returns whether the terminal chunk has been produced.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn next_chunk(&mut self) -> std::io::Result<()> {
        let read_len = loop {
            match self.source.read(&mut self.chunk) {
                Ok(len) => break len,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        };

        self.output.clear();
        self.output_position = 0;

        if read_len == 0 {
            tracing::trace!(chunk_count = self.chunk_count, "last chunk");
            self.terminated = true;
            write_last_chunk(&mut self.output)?;
        } else {
            tracing::trace!(read_len, "encode chunk");
            self.chunk_count += 1;
            write_chunk(&self.chunk[..read_len], &mut self.output)?;
        }

        Ok(())
    }
}

impl<R: Read> Read for ChunkedEncoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.output_position >= self.output.len() {
            if self.terminated {
                return Ok(0);
            }

            self.next_chunk()?;
        }

        let pending = &self.output[self.output_position..];
        let len = pending.len().min(buf.len());
        buf[..len].copy_from_slice(&pending[..len]);
        self.output_position += len;

        Ok(len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedDecoderState {
    SizeLine,
    ChunkData,
    Boundary,
    Trailer,
    Done,
}

/// Decodes a chunked body from a transport stream.
///
/// Reading stops exactly after the final empty line, so the transport can be
/// reused for another message afterwards.
#[derive(Debug)]
pub struct ChunkedDecoder<R: Read> {
    input: PositionReader<R>,
    state: ChunkedDecoderState,
    chunk_index: u64,
    chunk_len: u64,
    chunk_position: u64,
    line: Vec<u8>,
    trailer_buf: Vec<u8>,
    trailer: Option<HeaderTable>,
    allow_newline_without_return: bool,
    max_line_length: usize,
}

impl<R: Read> ChunkedDecoder<R> {
    pub fn new(input: R) -> Self {
        Self::with_config(input, &ParserConfig::default())
    }

    pub fn with_config(input: R, config: &ParserConfig) -> Self {
        Self {
            input: PositionReader::new(input),
            state: ChunkedDecoderState::SizeLine,
            chunk_index: 0,
            chunk_len: 0,
            chunk_position: 0,
            line: Vec::new(),
            trailer_buf: Vec::new(),
            trailer: None,
            allow_newline_without_return: config.allow_newline_without_return,
            max_line_length: config.max_header_length,
        }
    }

    /// Returns whether the terminal chunk and trailer have been read.
    pub fn is_done(&self) -> bool {
        self.state == ChunkedDecoderState::Done
    }

    /// Trailer fields sent after the terminal chunk, if any.
    pub fn trailer(&self) -> Option<&HeaderTable> {
        self.trailer.as_ref()
    }

    pub fn take_trailer(&mut self) -> Option<HeaderTable> {
        self.trailer.take()
    }

    /// Number of non-terminal chunks decoded so far.
    pub fn chunk_count(&self) -> u64 {
        self.chunk_index
    }

    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }

    fn error(&self, kind: ProtocolErrorKind) -> ProtocolError {
        ProtocolError::new(kind)
            .with_chunk(self.chunk_index)
            .with_position(self.input.logical_position())
    }

    fn read_line(&mut self, limit: usize) -> std::io::Result<LineEnd> {
        self.line.clear();
        crate::io::read_line(&mut self.input, &mut self.line, limit)
    }

    fn check_line_ending(&self) -> Result<(), ProtocolError> {
        if !self.allow_newline_without_return && crate::io::is_bare_newline(&self.line) {
            Err(self
                .error(ProtocolErrorKind::InvalidChunkedEncoding)
                .with_snippet(self.line.escape_ascii().to_string()))
        } else {
            Ok(())
        }
    }

    fn process_size_line(&mut self) -> std::io::Result<()> {
        match self.read_line(self.max_line_length)? {
            LineEnd::Complete => {}
            LineEnd::Eof | LineEnd::Truncated => {
                return Err(self.error(ProtocolErrorKind::UnexpectedEof).into_io_error());
            }
            LineEnd::TooLong => {
                return Err(self
                    .error(ProtocolErrorKind::InvalidChunkedEncoding)
                    .with_snippet("chunk size line too long")
                    .into_io_error());
            }
        }

        self.check_line_ending().map_err(ProtocolError::into_io_error)?;

        let len = match parse::chunk_size_line(&self.line) {
            Ok((_remain, len)) => len,
            Err(_) => {
                return Err(self
                    .error(ProtocolErrorKind::InvalidChunkedEncoding)
                    .with_snippet(self.line[..self.line.len().min(16)].escape_ascii().to_string())
                    .into_io_error());
            }
        };

        tracing::trace!(len, chunk_index = self.chunk_index, "parsed chunk line");

        if len == 0 {
            tracing::trace!("SizeLine -> Trailer");
            self.state = ChunkedDecoderState::Trailer;
        } else {
            tracing::trace!("SizeLine -> ChunkData");
            self.chunk_len = len;
            self.chunk_position = 0;
            self.state = ChunkedDecoderState::ChunkData;
        }

        Ok(())
    }

    fn process_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        debug_assert!(self.chunk_position < self.chunk_len);

        let remain_len = self.chunk_len - self.chunk_position;
        let buf_upper = buf
            .len()
            .min(usize::try_from(remain_len).unwrap_or(usize::MAX));

        let read_len = self.input.read(&mut buf[..buf_upper])?;

        if read_len == 0 {
            return Err(self
                .error(ProtocolErrorKind::TruncatedChunk)
                .with_missing(remain_len)
                .into_io_error());
        }

        self.chunk_position += read_len as u64;

        tracing::trace!(self.chunk_position, self.chunk_len, "process chunk data");

        if self.chunk_position == self.chunk_len {
            tracing::trace!("ChunkData -> Boundary");
            self.state = ChunkedDecoderState::Boundary;
        }

        Ok(read_len)
    }

    fn process_boundary(&mut self) -> std::io::Result<()> {
        match self.read_line(2)? {
            LineEnd::Complete => {}
            LineEnd::Eof | LineEnd::Truncated => {
                let missing = 2 - self.line.len() as u64;
                return Err(self
                    .error(ProtocolErrorKind::TruncatedChunk)
                    .with_missing(missing)
                    .into_io_error());
            }
            LineEnd::TooLong => {
                return Err(self
                    .error(ProtocolErrorKind::InvalidChunkedEncoding)
                    .with_snippet(self.line.escape_ascii().to_string())
                    .into_io_error());
            }
        }

        if !crate::io::is_empty_line(&self.line) {
            return Err(self
                .error(ProtocolErrorKind::InvalidChunkedEncoding)
                .with_snippet(self.line.escape_ascii().to_string())
                .into_io_error());
        }

        self.check_line_ending().map_err(ProtocolError::into_io_error)?;

        tracing::trace!("Boundary -> SizeLine");
        self.chunk_index += 1;
        self.state = ChunkedDecoderState::SizeLine;

        Ok(())
    }

    fn process_trailer(&mut self) -> std::io::Result<()> {
        let limit = self.max_line_length.saturating_sub(self.trailer_buf.len());

        match self.read_line(limit)? {
            LineEnd::Complete => {}
            LineEnd::Eof | LineEnd::Truncated => {
                return Err(self.error(ProtocolErrorKind::UnexpectedEof).into_io_error());
            }
            LineEnd::TooLong => {
                return Err(self
                    .error(ProtocolErrorKind::InvalidChunkedEncoding)
                    .with_snippet("trailer too long")
                    .into_io_error());
            }
        }

        self.check_line_ending().map_err(ProtocolError::into_io_error)?;

        if !crate::io::is_empty_line(&self.line) {
            self.trailer_buf.extend_from_slice(&self.line);
            return Ok(());
        }

        if !self.trailer_buf.is_empty() {
            let trailer = HeaderTable::parse(&self.trailer_buf).map_err(|error| {
                self.error(ProtocolErrorKind::InvalidChunkedEncoding)
                    .with_source(error)
                    .into_io_error()
            })?;

            tracing::trace!(len = trailer.len(), "trailer");
            self.trailer = Some(trailer);
            self.trailer_buf.clear();
        }

        tracing::trace!(chunk_count = self.chunk_index, "Trailer -> Done");
        self.state = ChunkedDecoderState::Done;

        Ok(())
    }
}

impl<R: Read> Read for ChunkedDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.state {
                ChunkedDecoderState::SizeLine => self.process_size_line()?,
                ChunkedDecoderState::ChunkData => return self.process_chunk(buf),
                ChunkedDecoderState::Boundary => self.process_boundary()?,
                ChunkedDecoderState::Trailer => self.process_trailer()?,
                ChunkedDecoderState::Done => return Ok(0),
            }
        }
    }
}

mod parse {
    use nom::{
        IResult, Parser,
        bytes::complete::take_while,
        character::complete::{hex_digit1, line_ending},
        combinator::{all_consuming, map, map_opt},
        sequence::{pair, terminated},
    };

    pub fn chunk_size_line(input: &[u8]) -> IResult<&[u8], u64> {
        all_consuming(terminated(
            map(pair(chunk_size, chunk_ext), |p: (u64, &[u8])| p.0),
            line_ending,
        ))
        .parse(input)
    }

    fn chunk_size(input: &[u8]) -> IResult<&[u8], u64> {
        map_opt(hex_digit1, crate::parse::parse_hex_u64_strict).parse(input)
    }

    fn chunk_ext(input: &[u8]) -> IResult<&[u8], &[u8]> {
        take_while(|b: u8| b.is_ascii_graphic() || b == b' ' || b == b'\t').parse(input)
    }
}
