//! Reading HTTP/1.x messages from a stream
//!
//! The start line and header block are read one byte at a time so the stream
//! is left positioned at the first byte of the body. The body is then exposed
//! as a [`LazyBodyReader`] framed according to the headers.
use std::io::{ErrorKind, Read};

use url::Url;

use crate::{
    body::{BodyType, LazyBodyReader, MessageBody},
    error::{GeneralError, ParseError, ParseErrorKind, ProtocolError, ProtocolErrorKind},
    header::HeaderTable,
    io::LineEnd,
    message::{Request, RequestLine, Response, StatusLine},
    parse::start_line,
};

pub const DEFAULT_MAX_HEADER_LENGTH: usize = 32768;

/// Options for reading messages.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Accept lines ending in `\n` instead of `\r\n`.
    pub allow_newline_without_return: bool,
    /// Maximum number of bytes in the start line and header block, and in a
    /// chunk size line or chunk trailer.
    pub max_header_length: usize,
}

impl ParserConfig {
    /// Configuration rejecting bare `\n` line endings.
    pub fn strict() -> Self {
        Self {
            allow_newline_without_return: false,
            ..Default::default()
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            allow_newline_without_return: true,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
        }
    }
}

/// Reads requests and responses from streams.
#[derive(Debug, Clone, Default)]
pub struct MessageParser {
    config: ParserConfig,
}

impl MessageParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Reads a request.
    ///
    /// A request has a body only if it declares `Transfer-Encoding: chunked`
    /// or a `Content-Length`.
    pub fn parse_request<R>(&self, mut input: R) -> Result<Request<MessageBody>, GeneralError>
    where
        R: Read + Send + 'static,
    {
        let head = self.read_head(&mut input)?;
        let (line, fields) = split_start_line(&head);

        let (_remain, output) = start_line::request_line(line).map_err(ParseError::from)?;
        let method = std::str::from_utf8(output.method).map_err(ParseError::from)?;
        let target = std::str::from_utf8(output.request_target).map_err(ParseError::from)?;
        let headers = HeaderTable::parse(fields)?;
        let uri = request_uri(target, &headers)?;

        tracing::debug!(method, target, "parsed request header");

        let request_line = RequestLine {
            method: method.to_string(),
            target: target.to_string(),
            uri,
            version: output.http_version.into(),
        };

        let body = if is_chunked(&headers) {
            Some(LazyBodyReader::chunked(input, &self.config))
        } else {
            content_length(&headers)?.map(|length| LazyBodyReader::fixed_length(input, length))
        };

        Ok(Request::from_parts(
            request_line,
            headers,
            body.map(MessageBody::Lazy),
        ))
    }

    /// Reads a response to a request with an unknown method.
    pub fn parse_response<R>(&self, input: R) -> Result<Response, GeneralError>
    where
        R: Read + Send + 'static,
    {
        self.parse_response_to(input, "")
    }

    /// Reads a response to a request with the given method.
    ///
    /// Responses to `HEAD` have no body regardless of their headers.
    pub fn parse_response_to<R>(
        &self,
        mut input: R,
        request_method: &str,
    ) -> Result<Response, GeneralError>
    where
        R: Read + Send + 'static,
    {
        let head = self.read_head(&mut input)?;
        let (line, fields) = split_start_line(&head);

        let (_remain, output) = start_line::status_line(line).map_err(ParseError::from)?;
        let reason_phrase = String::from_utf8_lossy(output.reason_phrase).into_owned();
        let headers = HeaderTable::parse(fields)?;

        let status_line = StatusLine {
            version: output.http_version.into(),
            status_code: output.status_code,
            reason_phrase,
        };

        let body_type = response_body_type(status_line.status_code, request_method, &headers)?;

        tracing::debug!(
            status_code = status_line.status_code,
            version = %status_line.version,
            ?body_type,
            "parsed response header"
        );

        let body = match body_type {
            Some(BodyType::Chunked) => Some(LazyBodyReader::chunked(input, &self.config)),
            Some(BodyType::FixedLength) => content_length(&headers)?
                .map(|length| LazyBodyReader::fixed_length(input, length)),
            Some(BodyType::CloseDelimited) => Some(LazyBodyReader::close_delimited(input)),
            None => None,
        };

        Ok(Response::new(
            status_line,
            headers,
            body.map(MessageBody::Lazy),
        ))
    }

    /// Reads the start line and header block including the empty line.
    ///
    /// Empty lines before the start line are skipped.
    fn read_head<R: Read>(&self, input: &mut R) -> Result<Vec<u8>, GeneralError> {
        let limit = self.config.max_header_length;
        let mut buf = Vec::new();
        let mut skipped = 0usize;

        loop {
            let line_start = buf.len();
            let consumed = skipped + line_start;
            let remaining = limit.saturating_sub(consumed);

            match crate::io::read_line(input, &mut buf, remaining)? {
                LineEnd::Complete => {}
                LineEnd::Eof if consumed == 0 => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream ended before a message",
                    )
                    .into());
                }
                LineEnd::Eof | LineEnd::Truncated => {
                    return Err(ProtocolError::new(ProtocolErrorKind::UnexpectedEof)
                        .with_position((skipped + buf.len()) as u64)
                        .into());
                }
                LineEnd::TooLong => {
                    return Err(ParseError::new(ParseErrorKind::HeaderTooBig)
                        .with_position(limit as u64)
                        .into());
                }
            }

            let line = &buf[line_start..];

            if !self.config.allow_newline_without_return && crate::io::is_bare_newline(line) {
                return Err(ParseError::new(ParseErrorKind::NewlineWithoutReturn)
                    .with_position((skipped + buf.len() - 1) as u64)
                    .into());
            }

            if crate::io::is_empty_line(line) {
                if line_start == 0 {
                    skipped += buf.len();
                    buf.clear();
                    continue;
                }

                break;
            }
        }

        tracing::trace!(len = buf.len(), skipped, "read message head");

        Ok(buf)
    }
}

fn split_start_line(head: &[u8]) -> (&[u8], &[u8]) {
    match head.iter().position(|&b| b == b'\n') {
        Some(index) => head.split_at(index + 1),
        None => (head, &[]),
    }
}

fn request_uri(target: &str, headers: &HeaderTable) -> Result<Url, ParseError> {
    if target.starts_with('/') || target == "*" {
        let host = headers
            .get_first("Host")
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingHost))?;
        let path = if target == "*" { "/" } else { target };

        return Ok(Url::parse(&format!("http://{}{}", host, path))?);
    }

    match Url::parse(target) {
        Ok(uri) if uri.has_host() => Ok(uri),
        // authority-form, as used by CONNECT
        _ => Ok(Url::parse(&format!("http://{}/", target))?),
    }
}

fn is_chunked(headers: &HeaderTable) -> bool {
    headers
        .get_comma_list("Transfer-Encoding")
        .iter()
        .any(|coding| coding == "chunked")
}

/// Value of `Content-Length`, which must be the same across repeated values.
fn content_length(headers: &HeaderTable) -> Result<Option<u64>, ProtocolError> {
    let mut length = None;

    for value in headers.get("Content-Length") {
        for item in value.split(',') {
            let item = item.trim();
            let current = crate::parse::parse_u64_strict(item).map_err(|error| {
                ProtocolError::new(ProtocolErrorKind::InvalidContentLength)
                    .with_snippet(item)
                    .with_source(error)
            })?;

            match length {
                Some(previous) if previous != current => {
                    return Err(ProtocolError::new(ProtocolErrorKind::InvalidContentLength)
                        .with_snippet(value.as_str()));
                }
                _ => length = Some(current),
            }
        }
    }

    Ok(length)
}

fn response_body_type(
    status_code: u16,
    request_method: &str,
    headers: &HeaderTable,
) -> Result<Option<BodyType>, ProtocolError> {
    if request_method.eq_ignore_ascii_case("HEAD")
        || (100..200).contains(&status_code)
        || status_code == 204
        || status_code == 304
    {
        return Ok(None);
    }

    if is_chunked(headers) {
        Ok(Some(BodyType::Chunked))
    } else if content_length(headers)?.is_some() {
        Ok(Some(BodyType::FixedLength))
    } else {
        Ok(Some(BodyType::CloseDelimited))
    }
}
