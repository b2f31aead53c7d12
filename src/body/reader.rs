use std::{
    borrow::Cow,
    fmt::Debug,
    io::{ErrorKind, Read},
};

use crate::{
    codec::{ChunkedDecoder, ChunkedEncoder},
    error::{GeneralError, ProtocolError, ProtocolErrorKind},
    header::HeaderTable,
    parser::ParserConfig,
};

use super::{BodyType, Framing};

type BoxedRead = Box<dyn Read + Send>;

/// Reader limited to a declared number of bytes.
///
/// Unlike [`Read::take`], running out of input before the declared length is
/// an error.
#[derive(Debug)]
pub struct LengthReader<R: Read> {
    input: R,
    length: u64,
    read: u64,
}

impl<R: Read> LengthReader<R> {
    pub fn new(input: R, length: u64) -> Self {
        Self {
            input,
            length,
            read: 0,
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn remaining(&self) -> u64 {
        self.length - self.read
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read> Read for LengthReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        assert!(self.length >= self.read);
        let remain_length = self.length - self.read;

        if remain_length == 0 || buf.is_empty() {
            return Ok(0);
        }

        let buf_upper = buf
            .len()
            .min(usize::try_from(remain_length).unwrap_or(usize::MAX));
        let read_length = self.input.read(&mut buf[..buf_upper])?;

        if read_length == 0 {
            return Err(ProtocolError::new(ProtocolErrorKind::TruncatedBody)
                .with_position(self.read)
                .with_missing(remain_length)
                .into_io_error());
        }

        self.read += read_length as u64;
        tracing::trace!(read_length, remain_length, "read body");

        Ok(read_length)
    }
}

enum Source {
    Raw(BoxedRead),
    Length(LengthReader<BoxedRead>),
    ChunkedDecode(ChunkedDecoder<BoxedRead>),
    ChunkedEncode(ChunkedEncoder<BoxedRead>),
}

impl Source {
    fn as_read(&mut self) -> &mut dyn Read {
        match self {
            Self::Raw(reader) => reader,
            Self::Length(reader) => reader,
            Self::ChunkedDecode(reader) => reader,
            Self::ChunkedEncode(reader) => reader,
        }
    }
}

/// Body read on demand from its underlying stream.
///
/// The body is forward-only and can be consumed once. Reading past the end of
/// the body returns end-of-stream, never bytes of a following message.
///
/// The underlying stream, typically a connection, must stay open while the
/// body is read. Use [`Self::eager`] to keep the body after closing it.
pub struct LazyBodyReader {
    kind: BodyType,
    content_length: Option<u64>,
    source: Source,
    finished: bool,
}

impl LazyBodyReader {
    /// Body of exactly `length` bytes.
    pub fn fixed_length<R: Read + Send + 'static>(input: R, length: u64) -> Self {
        Self {
            kind: BodyType::FixedLength,
            content_length: Some(length),
            source: Source::Length(LengthReader::new(Box::new(input), length)),
            finished: false,
        }
    }

    /// Body decoded from the chunked coding.
    pub fn chunked<R: Read + Send + 'static>(input: R, config: &ParserConfig) -> Self {
        Self {
            kind: BodyType::Chunked,
            content_length: None,
            source: Source::ChunkedDecode(ChunkedDecoder::with_config(Box::new(input), config)),
            finished: false,
        }
    }

    /// Body lasting until the input ends.
    pub fn close_delimited<R: Read + Send + 'static>(input: R) -> Self {
        Self {
            kind: BodyType::CloseDelimited,
            content_length: None,
            source: Source::Raw(Box::new(input)),
            finished: false,
        }
    }

    /// Reader producing the wire representation of an un-encoded source.
    pub(crate) fn for_sending(framing: Framing, source: BoxedRead) -> Self {
        let (content_length, source) = match framing {
            Framing::FixedLength(length) => {
                (Some(length), Source::Length(LengthReader::new(source, length)))
            }
            Framing::Chunked(chunk_size) => (
                None,
                Source::ChunkedEncode(ChunkedEncoder::new(source, chunk_size as usize)),
            ),
            Framing::CloseDelimited => (None, Source::Raw(source)),
        };

        Self {
            kind: framing.body_type(),
            content_length,
            source,
            finished: false,
        }
    }

    pub fn kind(&self) -> BodyType {
        self.kind
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns whether the end of the body has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Trailer fields of a chunked body.
    ///
    /// Only available once the body has been read to the end.
    pub fn trailer(&self) -> Option<&HeaderTable> {
        match &self.source {
            Source::ChunkedDecode(decoder) => decoder.trailer(),
            _ => None,
        }
    }

    /// Reads the next byte, or `None` at the end of the body.
    pub fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.finished {
            return Ok(None);
        }

        let byte = crate::io::read_byte(self)?;
        Ok(byte)
    }

    /// Reads the rest of the body into memory.
    pub fn eager(mut self) -> Result<EagerBody, GeneralError> {
        let mut bytes = Vec::with_capacity(
            self.content_length
                .and_then(|len| usize::try_from(len).ok())
                .unwrap_or(0)
                .min(1 << 20),
        );

        self.read_to_end(&mut bytes)?;

        let trailer = match &mut self.source {
            Source::ChunkedDecode(decoder) => decoder.take_trailer(),
            _ => None,
        };

        tracing::trace!(kind = ?self.kind, len = bytes.len(), "eager body");

        Ok(EagerBody {
            kind: self.kind,
            bytes,
            trailer,
        })
    }
}

impl Read for LazyBodyReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        let read_len = loop {
            match self.source.as_read().read(buf) {
                Ok(len) => break len,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        };

        if read_len == 0 {
            self.finished = true;
        }

        Ok(read_len)
    }
}

impl Debug for LazyBodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyBodyReader")
            .field("kind", &self.kind)
            .field("content_length", &self.content_length)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Body fully read into memory.
///
/// Safe to use after the connection it came from has been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerBody {
    kind: BodyType,
    bytes: Vec<u8>,
    trailer: Option<HeaderTable>,
}

impl EagerBody {
    pub fn new(kind: BodyType, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            bytes,
            trailer: None,
        }
    }

    pub fn kind(&self) -> BodyType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a new reader over the bytes, starting from the beginning.
    pub fn reader(&self) -> &[u8] {
        &self.bytes
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn trailer(&self) -> Option<&HeaderTable> {
        self.trailer.as_ref()
    }

    pub(crate) fn take_trailer(&mut self) -> Option<HeaderTable> {
        self.trailer.take()
    }
}

/// Body of a received message, either still streaming or in memory.
#[derive(Debug)]
pub enum MessageBody {
    Lazy(LazyBodyReader),
    Eager(EagerBody),
}

impl MessageBody {
    pub fn kind(&self) -> BodyType {
        match self {
            Self::Lazy(reader) => reader.kind(),
            Self::Eager(body) => body.kind(),
        }
    }

    pub fn is_eager(&self) -> bool {
        matches!(self, Self::Eager(..))
    }

    pub fn as_lazy_mut(&mut self) -> Option<&mut LazyBodyReader> {
        if let Self::Lazy(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_eager(&self) -> Option<&EagerBody> {
        if let Self::Eager(v) = self {
            Some(v)
        } else {
            None
        }
    }

    /// Reads the body into memory if it is not already.
    pub fn eager(self) -> Result<EagerBody, GeneralError> {
        match self {
            Self::Lazy(reader) => reader.eager(),
            Self::Eager(body) => Ok(body),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, GeneralError> {
        Ok(self.eager()?.into_bytes())
    }
}

impl From<LazyBodyReader> for MessageBody {
    fn from(value: LazyBodyReader) -> Self {
        Self::Lazy(value)
    }
}

impl From<EagerBody> for MessageBody {
    fn from(value: EagerBody) -> Self {
        Self::Eager(value)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tracing_test::traced_test]
    #[test]
    fn test_fixed_length_stops_at_boundary() {
        let mut reader = LazyBodyReader::fixed_length(Cursor::new(b"Hello world!NEXT".to_vec()), 12);
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();

        assert_eq!(output, b"Hello world!");
        assert!(reader.is_finished());
        assert_eq!(reader.read_byte().unwrap(), None);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_fixed_length_truncated() {
        let reader = LazyBodyReader::fixed_length(Cursor::new(b"short".to_vec()), 8);
        let error = reader.eager().unwrap_err().try_into_protocol().unwrap();

        assert_eq!(error.kind(), ProtocolErrorKind::TruncatedBody);
        assert_eq!(error.position(), Some(5));
        assert_eq!(error.missing(), Some(3));
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_close_delimited_reads_to_eof() {
        let mut reader = LazyBodyReader::close_delimited(Cursor::new(b"all of it".to_vec()));

        assert_eq!(reader.read_byte().unwrap(), Some(b'a'));

        let body = reader.eager().unwrap();
        assert_eq!(body.as_bytes(), b"ll of it");
        assert_eq!(body.kind(), BodyType::CloseDelimited);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_chunked_eager_keeps_trailer() {
        let input = Cursor::new(b"5\r\nhello\r\n0\r\nExpires: never\r\n\r\n".to_vec());
        let body = LazyBodyReader::chunked(input, &ParserConfig::default())
            .eager()
            .unwrap();

        assert_eq!(body.to_text(), "hello");
        assert_eq!(body.trailer().unwrap().get("expires"), ["never"]);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_eager_body_rereadable() {
        let body = LazyBodyReader::fixed_length(Cursor::new(b"abc".to_vec()), 3)
            .eager()
            .unwrap();

        for _ in 0..2 {
            let mut output = Vec::new();
            body.reader().read_to_end(&mut output).unwrap();
            assert_eq!(output, b"abc");
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_sending_fixed_length_short_source() {
        let mut reader =
            LazyBodyReader::for_sending(Framing::FixedLength(10), Box::new(Cursor::new(b"abc".to_vec())));
        let mut output = Vec::new();

        assert!(reader.read_to_end(&mut output).is_err());
    }
}
