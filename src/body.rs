//! HTTP message bodies
//!
//! A [`Body`] is a body to be sent. It pairs a source stream with the way the
//! body is delimited on the wire and adapts the message headers to match.
use std::{
    fmt::Debug,
    fs::File,
    io::{Cursor, Read},
    path::Path,
};

use crate::header::HeaderTable;

mod reader;

pub use reader::{EagerBody, LazyBodyReader, LengthReader, MessageBody};

/// How the extent of a body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyType {
    /// `Content-Length` bytes follow the header.
    FixedLength,
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// The body ends when the connection is closed.
    CloseDelimited,
}

/// Framing of an outgoing body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// Body of the given length.
    FixedLength(u64),
    /// Body encoded in chunks of at most the given size.
    Chunked(u32),
    /// Body sent until the connection is closed. Only valid for responses.
    CloseDelimited,
}

impl Framing {
    pub fn body_type(&self) -> BodyType {
        match self {
            Self::FixedLength(_) => BodyType::FixedLength,
            Self::Chunked(_) => BodyType::Chunked,
            Self::CloseDelimited => BodyType::CloseDelimited,
        }
    }

    /// Returns the headers adjusted for this framing.
    ///
    /// Selecting one framing removes or overrides the headers implied by the
    /// others, except that `Transfer-Encoding` is left as is for
    /// [`Framing::FixedLength`].
    pub fn headers_from(&self, content_type: Option<&str>, headers: &HeaderTable) -> HeaderTable {
        let mut builder = headers.to_builder();

        if let Some(content_type) = content_type {
            builder.overwrite("Content-Type", content_type);
        }

        match self {
            Self::FixedLength(length) => {
                builder.overwrite("Content-Length", length.to_string());
            }
            Self::Chunked(_) => {
                builder.overwrite("Transfer-Encoding", "chunked");
                builder.remove("Content-Length");
            }
            Self::CloseDelimited => {}
        }

        builder.build()
    }
}

/// Body of a message to be sent.
///
/// The source is read lazily, so it must not be closed until the body has
/// been written.
pub struct Body {
    content_type: Option<String>,
    framing: Framing,
    source: Box<dyn Read + Send>,
}

impl Body {
    /// Body of exactly `length` bytes read from the source.
    pub fn fixed_length<R>(content_type: Option<String>, source: R, length: u64) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            content_type,
            framing: Framing::FixedLength(length),
            source: Box::new(source),
        }
    }

    /// Body holding the given bytes.
    pub fn bytes<B: Into<Vec<u8>>>(content_type: Option<String>, bytes: B) -> Self {
        let bytes = bytes.into();
        let length = bytes.len() as u64;

        Self::fixed_length(content_type, Cursor::new(bytes), length)
    }

    /// Body holding the given text.
    pub fn text<S: Into<String>>(content_type: Option<String>, text: S) -> Self {
        Self::bytes(content_type, text.into().into_bytes())
    }

    /// Body with the contents of a file.
    ///
    /// The length is taken from the file metadata when the body is created.
    pub fn file<P: AsRef<Path>>(content_type: Option<String>, path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();

        Ok(Self::fixed_length(content_type, file, length))
    }

    /// Body that encodes the un-encoded source with the chunked coding.
    pub fn chunked<R>(content_type: Option<String>, source: R, chunk_size: u32) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            content_type,
            framing: Framing::Chunked(chunk_size),
            source: Box::new(source),
        }
    }

    /// Body ending at the end of the source, delimited by closing the
    /// connection.
    ///
    /// Only responses can be framed this way. [`Request::with_body`] rejects
    /// such a body.
    ///
    /// [`Request::with_body`]: crate::message::Request::with_body
    pub fn close_delimited<R>(content_type: Option<String>, source: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            content_type,
            framing: Framing::CloseDelimited,
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> BodyType {
        self.framing.body_type()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The content length, if known.
    pub fn content_length(&self) -> Option<u64> {
        match self.framing {
            Framing::FixedLength(length) => Some(length),
            Framing::Chunked(_) | Framing::CloseDelimited => None,
        }
    }

    /// Returns the headers adjusted to include this body.
    pub fn headers_from(&self, headers: &HeaderTable) -> HeaderTable {
        self.framing.headers_from(self.content_type(), headers)
    }

    /// Returns a reader of the body as it appears on the wire.
    pub fn into_reader(self) -> LazyBodyReader {
        LazyBodyReader::for_sending(self.framing, self.source)
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("content_type", &self.content_type)
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::header::HeaderTableBuilder;

    use super::*;

    fn base_headers() -> HeaderTable {
        HeaderTableBuilder::new()
            .with("Host", "example.com")
            .with("Content-Length", "999")
            .with("Transfer-Encoding", "gzip")
            .with("content-type", "text/plain")
            .build()
    }

    #[test]
    fn test_fixed_length_headers() {
        let body = Body::text(Some("application/json".to_string()), "{}");
        let headers = body.headers_from(&base_headers());

        assert_eq!(headers.get("Content-Length"), ["2"]);
        assert_eq!(headers.get("Content-Type"), ["application/json"]);
        assert_eq!(headers.get("Transfer-Encoding"), ["gzip"]);
        assert_eq!(body.content_length(), Some(2));
        assert_eq!(body.kind(), BodyType::FixedLength);
    }

    #[test]
    fn test_chunked_headers() {
        let body = Body::chunked(None, Cursor::new(Vec::new()), 16);
        let headers = body.headers_from(&base_headers());

        assert!(!headers.contains("Content-Length"));
        assert_eq!(headers.get("Transfer-Encoding"), ["chunked"]);
        assert_eq!(headers.get("Content-Type"), ["text/plain"]);
        assert_eq!(body.content_length(), None);
    }

    #[test]
    fn test_close_delimited_headers() {
        let body = Body::close_delimited(Some("image/png".to_string()), Cursor::new(Vec::new()));
        let headers = body.headers_from(&base_headers());

        assert_eq!(headers.get("Content-Length"), ["999"]);
        assert_eq!(headers.get("Content-Type"), ["image/png"]);
        assert_eq!(body.kind(), BodyType::CloseDelimited);

        let headers = body.headers_from(&HeaderTable::empty());
        assert_eq!(headers.unique_header_names().collect::<Vec<_>>(), vec!["CONTENT-TYPE"]);
    }

    #[test]
    fn test_chunked_reader_is_encoded() {
        let body = Body::chunked(None, Cursor::new(b"abcde".to_vec()), 2);
        let mut reader = body.into_reader();
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();

        assert_eq!(output, b"2\r\nab\r\n2\r\ncd\r\n1\r\ne\r\n0\r\n\r\n");
        assert_eq!(reader.kind(), BodyType::Chunked);
    }

    #[test]
    fn test_file_body() {
        let path = std::env::temp_dir().join(format!("rawhttp-body-{}.txt", std::process::id()));
        File::create(&path).unwrap().write_all(b"file contents").unwrap();

        let body = Body::file(None, &path).unwrap();
        assert_eq!(body.content_length(), Some(13));

        let mut output = Vec::new();
        body.into_reader().read_to_end(&mut output).unwrap();
        assert_eq!(output, b"file contents");

        std::fs::remove_file(&path).unwrap();
    }
}
