//! Error representations
use std::{backtrace::Backtrace, fmt::Display, str::Utf8Error, string::FromUtf8Error};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GeneralError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(std::io::Error),
}

impl GeneralError {
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(..))
    }

    pub fn as_parse(&self) -> Option<&ParseError> {
        if let Self::Parse(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(..))
    }

    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        if let Self::Protocol(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn try_into_protocol(self) -> Result<ProtocolError, Self> {
        if let Self::Protocol(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(..))
    }

    pub fn as_config(&self) -> Option<&ConfigError> {
        if let Self::Config(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(..))
    }

    pub fn as_io(&self) -> Option<&std::io::Error> {
        if let Self::Io(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn try_into_io(self) -> Result<std::io::Error, Self> {
        if let Self::Io(v) = self {
            Ok(v)
        } else {
            Err(self)
        }
    }
}

/// Body readers report decoding problems through [`std::io::Error`]; this
/// conversion unwraps them back into [`GeneralError::Protocol`].
impl From<std::io::Error> for GeneralError {
    fn from(value: std::io::Error) -> Self {
        if !value
            .get_ref()
            .is_some_and(|inner| inner.is::<ProtocolError>())
        {
            return Self::Io(value);
        }

        let kind = value.kind();

        match value.into_inner().map(|inner| inner.downcast::<ProtocolError>()) {
            Some(Ok(error)) => Self::Protocol(*error),
            Some(Err(inner)) => Self::Io(std::io::Error::new(kind, inner)),
            None => Self::Io(std::io::Error::from(kind)),
        }
    }
}

/// Error for parsing start-lines and header blocks.
#[derive(Debug, thiserror::Error)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Box<ParseContext>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            context: Default::default(),
            source: None,
        }
    }

    pub fn with_position(mut self, value: u64) -> Self {
        self.context.position = Some(value);
        self
    }

    pub fn with_snippet<S: Into<String>>(mut self, value: S) -> Self {
        self.context.snippet = Some(value.into());
        self
    }

    pub fn with_source<T: Into<Box<dyn std::error::Error + Send + Sync>>>(
        mut self,
        source: T,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn position(&self) -> Option<u64> {
        self.context.position
    }

    pub fn snippet(&self) -> Option<&String> {
        self.context.snippet.as_ref()
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}{}", self.kind, self.context)
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for ParseError {
    fn from(value: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_needed) => ParseError::new(ParseErrorKind::IncompleteInput),
            nom::Err::Error(error) | nom::Err::Failure(error) => {
                ParseError::new(ParseErrorKind::Syntax)
                    .with_snippet(
                        error.input[0..error.input.len().min(16)]
                            .escape_ascii()
                            .to_string(),
                    )
                    .with_source(nom::error::Error::new(error.input.len(), error.code))
            }
        }
    }
}

impl From<FromUtf8Error> for ParseError {
    fn from(value: FromUtf8Error) -> Self {
        ParseError::new(ParseErrorKind::InvalidUtf8)
            .with_position(value.utf8_error().valid_up_to() as u64)
    }
}

impl From<Utf8Error> for ParseError {
    fn from(value: Utf8Error) -> Self {
        ParseError::new(ParseErrorKind::InvalidUtf8).with_position(value.valid_up_to() as u64)
    }
}

impl From<url::ParseError> for ParseError {
    fn from(value: url::ParseError) -> Self {
        ParseError::new(ParseErrorKind::Syntax).with_source(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ParseErrorKind {
    IncompleteInput,
    Syntax,
    InvalidUtf8,
    HeaderTooBig,
    NewlineWithoutReturn,
    MissingHost,
    Other,
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::IncompleteInput => "incomplete input",
            Self::Syntax => "syntax error",
            Self::InvalidUtf8 => "invalid UTF-8",
            Self::HeaderTooBig => "header too big",
            Self::NewlineWithoutReturn => "newline without carriage return",
            Self::MissingHost => "missing host",
            Self::Other => "other",
        };

        f.write_str(value)
    }
}

#[derive(Debug, Default)]
struct ParseContext {
    position: Option<u64>,
    chunk: Option<u64>,
    missing: Option<u64>,
    snippet: Option<String>,
}

impl Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(chunk) = self.chunk {
            write!(f, " chunk {}", chunk)?;
        }

        if let Some(position) = self.position {
            write!(f, " position {}", position)?;
        }

        if let Some(missing) = self.missing {
            write!(f, " ({} bytes short)", missing)?;
        }

        if let Some(snippet) = &self.snippet {
            write!(f, " near '{}'", snippet)?;
        }

        Ok(())
    }
}

/// Error for message framing on the wire.
#[derive(Debug, thiserror::Error)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    backtrace: Option<Box<Backtrace>>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    context: Box<ParseContext>,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Box::new(std::backtrace::Backtrace::capture())),
            source: None,
            context: Box::new(ParseContext::default()),
        }
    }

    pub fn other(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::new(ProtocolErrorKind::Other).with_source(error)
    }

    pub fn with_source<T: Into<Box<dyn std::error::Error + Send + Sync>>>(
        mut self,
        source: T,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Byte offset within the message body.
    pub fn with_position(mut self, value: u64) -> Self {
        self.context.position = Some(value);
        self
    }

    /// Zero-based index of the offending chunk.
    pub fn with_chunk(mut self, value: u64) -> Self {
        self.context.chunk = Some(value);
        self
    }

    /// Number of bytes the input was short of.
    pub fn with_missing(mut self, value: u64) -> Self {
        self.context.missing = Some(value);
        self
    }

    pub fn with_snippet<S: Into<String>>(mut self, value: S) -> Self {
        self.context.snippet = Some(value.into());
        self
    }

    pub fn kind(&self) -> ProtocolErrorKind {
        self.kind
    }

    pub fn position(&self) -> Option<u64> {
        self.context.position
    }

    pub fn chunk(&self) -> Option<u64> {
        self.context.chunk
    }

    pub fn missing(&self) -> Option<u64> {
        self.context.missing
    }

    pub fn snippet(&self) -> Option<&String> {
        self.context.snippet.as_ref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Wraps the error so it can travel through [`std::io::Read`].
    pub fn into_io_error(self) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, self)
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol error: {}{}", self.kind, self.context)
    }
}

impl From<ProtocolErrorKind> for ProtocolError {
    fn from(value: ProtocolErrorKind) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProtocolErrorKind {
    InvalidChunkedEncoding,
    TruncatedChunk,
    TruncatedBody,
    InvalidContentLength,
    UnexpectedEof,
    Other,
}

impl Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::InvalidChunkedEncoding => "invalid chunked encoding",
            Self::TruncatedChunk => "truncated chunk",
            Self::TruncatedBody => "truncated body",
            Self::InvalidContentLength => "invalid content length",
            Self::UnexpectedEof => "unexpected end of stream",
            Self::Other => "other",
        };

        f.write_str(value)
    }
}

/// Error for a request that cannot be sent as configured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("host is not available in the URI")]
    MissingHost,

    #[error("unsupported URI scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("a request body cannot be delimited by closing the connection")]
    CloseDelimitedRequest,
}

/// Errors collected while closing several connections.
///
/// Closing does not stop at the first failure.
#[derive(Debug, thiserror::Error)]
pub struct CloseError {
    errors: Vec<(String, std::io::Error)>,
}

impl CloseError {
    pub fn new(errors: Vec<(String, std::io::Error)>) -> Self {
        Self { errors }
    }

    /// Address (`host:port`) and error for each connection that failed to
    /// close.
    pub fn errors(&self) -> &[(String, std::io::Error)] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<(String, std::io::Error)> {
        self.errors
    }
}

impl Display for CloseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to close {} connection(s)", self.errors.len())?;

        for (host, error) in &self.errors {
            write!(f, "; {}: {}", host, error)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_unwraps_protocol_error() {
        let error = ProtocolError::new(ProtocolErrorKind::TruncatedBody)
            .with_position(10)
            .with_missing(5)
            .into_io_error();

        let error = GeneralError::from(error);
        let error = error.try_into_protocol().unwrap();

        assert_eq!(error.kind(), ProtocolErrorKind::TruncatedBody);
        assert_eq!(error.position(), Some(10));
        assert_eq!(error.missing(), Some(5));
    }

    #[test]
    fn test_io_error_stays_io() {
        let error = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let error = GeneralError::from(error);

        assert_eq!(
            error.as_io().map(|e| e.kind()),
            Some(std::io::ErrorKind::ConnectionReset)
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let error = ProtocolError::new(ProtocolErrorKind::TruncatedChunk)
            .with_chunk(2)
            .with_position(7)
            .with_missing(3);

        assert_eq!(
            error.to_string(),
            "protocol error: truncated chunk chunk 2 position 7 (3 bytes short)"
        );
    }
}
