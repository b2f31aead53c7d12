//! HTTP requests and responses
use std::{
    fmt::Display,
    io::{BufWriter, Write},
};

use url::Url;

use crate::{
    body::{Body, BodyType, MessageBody},
    error::{ConfigError, GeneralError},
    header::HeaderTable,
    io::IO_BUFFER_LENGTH,
};

/// HTTP protocol version such as `HTTP/1.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpVersion {
    major: u8,
    minor: u8,
}

impl HttpVersion {
    pub const HTTP_1_0: Self = Self::new(1, 0);
    pub const HTTP_1_1: Self = Self::new(1, 1);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    pub fn is_older_than(&self, other: Self) -> bool {
        *self < other
    }
}

impl Default for HttpVersion {
    fn default() -> Self {
        Self::HTTP_1_1
    }
}

impl Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl From<(u8, u8)> for HttpVersion {
    fn from(value: (u8, u8)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// First line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Request target exactly as written on the wire.
    pub target: String,
    /// Absolute URI the request is sent to.
    pub uri: Url,
    pub version: HttpVersion,
}

impl RequestLine {
    /// Creates a request line in origin-form for the URI.
    pub fn new<S: Into<String>>(method: S, uri: Url) -> Self {
        Self {
            method: method.into(),
            target: origin_form(&uri),
            uri,
            version: HttpVersion::HTTP_1_1,
        }
    }

    pub fn write_to<W: Write>(&self, mut buf: W) -> std::io::Result<()> {
        write!(buf, "{}\r\n", self)
    }
}

impl Display for RequestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.version)
    }
}

fn origin_form(uri: &Url) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_string(),
    }
}

/// Value of the `Host` header for the URI.
pub fn host_header_value(uri: &Url) -> Option<String> {
    let host = uri.host_str()?;

    match uri.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

/// First line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: HttpVersion,
    pub status_code: u16,
    pub reason_phrase: String,
}

impl StatusLine {
    pub fn new<S: Into<String>>(status_code: u16, reason_phrase: S) -> Self {
        Self {
            version: HttpVersion::HTTP_1_1,
            status_code,
            reason_phrase: reason_phrase.into(),
        }
    }

    pub fn write_to<W: Write>(&self, mut buf: W) -> std::io::Result<()> {
        write!(buf, "{}\r\n", self)
    }
}

impl Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:03} {}", self.version, self.status_code, self.reason_phrase)
    }
}

/// Request line, headers and an optional body.
///
/// Requests to be sent carry a [`Body`]. Requests read by
/// [`MessageParser::parse_request`](crate::parser::MessageParser::parse_request)
/// carry a [`MessageBody`].
#[derive(Debug)]
pub struct Request<B = Body> {
    request_line: RequestLine,
    headers: HeaderTable,
    body: Option<B>,
}

impl<B> Request<B> {
    /// Creates a request from its parts as they are.
    pub fn from_parts(request_line: RequestLine, headers: HeaderTable, body: Option<B>) -> Self {
        Self {
            request_line,
            headers,
            body,
        }
    }

    pub fn request_line(&self) -> &RequestLine {
        &self.request_line
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn uri(&self) -> &Url {
        &self.request_line.uri
    }

    pub fn version(&self) -> HttpVersion {
        self.request_line.version
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    pub fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut B> {
        self.body.as_mut()
    }

    pub fn into_parts(self) -> (RequestLine, HeaderTable, Option<B>) {
        (self.request_line, self.headers, self.body)
    }
}

impl Request<Body> {
    /// Creates a `HTTP/1.1` request without a body.
    ///
    /// A `Host` header is added for the URI.
    pub fn new<S: Into<String>>(method: S, uri: Url) -> Self {
        let mut headers = HeaderTable::empty().to_builder();

        if let Some(host) = host_header_value(&uri) {
            headers.with("Host", host);
        }

        Self {
            request_line: RequestLine::new(method, uri),
            headers: headers.build(),
            body: None,
        }
    }

    /// Replaces the headers, keeping the `Host` header if the given ones
    /// lack one.
    pub fn with_headers(mut self, headers: HeaderTable) -> Self {
        let mut builder = headers.to_builder();

        if !headers.contains("Host") {
            if let Some(host) = self.headers.get_first("Host") {
                builder.with("Host", host);
            }
        }

        let headers = builder.build();

        self.headers = match &self.body {
            Some(body) => body.headers_from(&headers),
            None => headers,
        };
        self
    }

    /// Sets the body and adjusts the framing headers for it.
    ///
    /// A close-delimited body is rejected since the server could not tell
    /// where it ends.
    pub fn with_body(mut self, body: Body) -> Result<Self, ConfigError> {
        if body.kind() == BodyType::CloseDelimited {
            return Err(ConfigError::CloseDelimitedRequest);
        }

        self.headers = body.headers_from(&self.headers);
        self.body = Some(body);
        Ok(self)
    }

    /// Writes the request line, headers and body.
    ///
    /// The body is streamed from its source in its wire framing.
    pub fn write_to<W: Write>(self, output: W) -> Result<(), GeneralError> {
        let mut output = BufWriter::with_capacity(IO_BUFFER_LENGTH, output);

        self.request_line.write_to(&mut output)?;
        self.headers.write_to(&mut output)?;

        if let Some(body) = self.body {
            let mut reader = body.into_reader();
            let len = std::io::copy(&mut reader, &mut output)?;
            tracing::trace!(len, kind = ?reader.kind(), "wrote body");
        }

        output.flush()?;

        Ok(())
    }
}

impl Request<MessageBody> {
    /// Reads the body into memory, merging any trailer into the headers.
    pub fn eagerly(self) -> Result<Self, GeneralError> {
        let (headers, body) = eager_parts(self.headers, self.body)?;

        Ok(Self {
            request_line: self.request_line,
            headers,
            body,
        })
    }
}

fn eager_parts(
    headers: HeaderTable,
    body: Option<MessageBody>,
) -> Result<(HeaderTable, Option<MessageBody>), GeneralError> {
    let Some(body) = body else {
        return Ok((headers, None));
    };

    let mut body = body.eager()?;

    let headers = match body.take_trailer() {
        Some(trailer) => headers.to_builder().merge(&trailer).build(),
        None => headers,
    };

    Ok((headers, Some(MessageBody::Eager(body))))
}

/// Response received from a server.
#[derive(Debug)]
pub struct Response {
    status_line: StatusLine,
    headers: HeaderTable,
    body: Option<MessageBody>,
}

impl Response {
    pub fn new(status_line: StatusLine, headers: HeaderTable, body: Option<MessageBody>) -> Self {
        Self {
            status_line,
            headers,
            body,
        }
    }

    pub fn status_line(&self) -> &StatusLine {
        &self.status_line
    }

    pub fn status_code(&self) -> u16 {
        self.status_line.status_code
    }

    pub fn version(&self) -> HttpVersion {
        self.status_line.version
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    pub fn body(&self) -> Option<&MessageBody> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut MessageBody> {
        self.body.as_mut()
    }

    pub fn into_body(self) -> Option<MessageBody> {
        self.body
    }

    pub fn into_parts(self) -> (StatusLine, HeaderTable, Option<MessageBody>) {
        (self.status_line, self.headers, self.body)
    }

    /// Reads the body into memory so the response no longer depends on the
    /// connection.
    ///
    /// Trailer fields of a chunked body are merged into the headers.
    pub fn eagerly(self) -> Result<Self, GeneralError> {
        let (headers, body) = eager_parts(self.headers, self.body)?;

        Ok(Self {
            status_line: self.status_line,
            headers,
            body,
        })
    }
}

impl Display for Response {
    /// Status line and headers.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\r\n{}", self.status_line, self.headers)
    }
}
